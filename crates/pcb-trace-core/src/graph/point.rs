use kurbo::Point as Position;

use super::{ComponentId, LinkId, PointId};
use crate::layer::Side;

/// What a point is, beyond being a place links can attach to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointKind {
    /// A free connection point placed by hand.
    Free,
    /// A contact owned by a component.
    Pad(PadInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadInfo {
    pub component: ComponentId,
    pub number: i32,
    pub name: String,
}

/// How a point is shown when the pointer is not over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    /// Always drawn at full strength.
    Persistent,
    /// Drawn only while hovered.
    FadeOnHoverOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub(crate) id: PointId,
    pub(crate) position: Position,
    pub(crate) side: Side,
    pub(crate) links: Vec<LinkId>,
    pub(crate) size: Option<u32>,
    pub(crate) kind: PointKind,
    pub(crate) emphasis: Emphasis,
}

impl Point {
    pub(crate) fn new(id: PointId, position: Position, side: Side) -> Self {
        Self {
            id,
            position,
            side,
            links: Vec::new(),
            size: None,
            kind: PointKind::Free,
            emphasis: Emphasis::FadeOnHoverOut,
        }
    }

    /// A transient anchor that is never registered with a board and never
    /// saved.
    pub fn phantom(position: Position) -> Self {
        Self {
            emphasis: Emphasis::Persistent,
            ..Self::new(PointId::PHANTOM, position, Side::Point)
        }
    }

    pub fn id(&self) -> PointId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Attached links in attachment order.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn degree(&self) -> usize {
        self.links.len()
    }

    pub fn size(&self) -> Option<u32> {
        self.size
    }

    pub fn kind(&self) -> &PointKind {
        &self.kind
    }

    pub fn emphasis(&self) -> Emphasis {
        self.emphasis
    }

    pub fn is_pad(&self) -> bool {
        matches!(self.kind, PointKind::Pad(_))
    }

    pub fn is_phantom(&self) -> bool {
        self.id == PointId::PHANTOM
    }

    pub fn pad(&self) -> Option<&PadInfo> {
        match &self.kind {
            PointKind::Pad(info) => Some(info),
            PointKind::Free => None,
        }
    }

    /// Returns false if `link` was already attached.
    pub(crate) fn attach(&mut self, link: LinkId) -> bool {
        if self.links.contains(&link) {
            return false;
        }
        self.links.push(link);
        true
    }

    pub(crate) fn detach(&mut self, link: LinkId) -> bool {
        let before = self.links.len();
        self.links.retain(|&l| l != link);
        self.links.len() != before
    }
}
