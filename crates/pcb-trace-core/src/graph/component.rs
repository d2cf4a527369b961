use std::fmt;

use kurbo::{Point as Position, Rect};

use super::{ComponentId, PointId};

/// Margin around the pads when computing a component outline.
pub const OUTLINE_MARGIN: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub(crate) id: ComponentId,
    pub(crate) name: String,
    pub(crate) position: Position,
    pub(crate) pads: Vec<PointId>,
}

impl Component {
    pub(crate) fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: Position::ORIGIN,
            pads: Vec::new(),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Pads in the order they were added.
    pub fn pads(&self) -> &[PointId] {
        &self.pads
    }

    pub fn pad_count(&self) -> usize {
        self.pads.len()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Component {} (ID: {}, Pads: {})",
            self.name,
            self.id,
            self.pads.len()
        )
    }
}

/// Bounding box of `positions` grown by [`OUTLINE_MARGIN`], or `None` when
/// there are no positions.
pub fn outline(positions: impl IntoIterator<Item = Position>) -> Option<Rect> {
    let mut positions = positions.into_iter();
    let first = positions.next()?;
    let bounds = positions.fold(Rect::from_points(first, first), |rect, p| rect.union_pt(p));
    Some(bounds.inflate(OUTLINE_MARGIN, OUTLINE_MARGIN))
}
