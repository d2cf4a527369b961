use kurbo::{Line, Point as Position};

use super::{LinkId, PointId, TrackGraphId};
use crate::layer::Side;

/// Which end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum End {
    From,
    To,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub(crate) id: LinkId,
    pub(crate) graph_id: Option<TrackGraphId>,
    pub(crate) from: Option<PointId>,
    pub(crate) to: Option<PointId>,
    pub(crate) side: Side,
    pub(crate) width: Option<u32>,
    pub(crate) line: Line,
    pub(crate) highlighted: bool,
}

impl Link {
    pub(crate) fn new(id: LinkId, side: Side) -> Self {
        Self {
            id,
            graph_id: None,
            from: None,
            to: None,
            side,
            width: None,
            line: Line::new(Position::ORIGIN, Position::ORIGIN),
            highlighted: false,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Track graph this link was last assigned to, if any.
    pub fn graph_id(&self) -> Option<TrackGraphId> {
        self.graph_id
    }

    pub fn from(&self) -> Option<PointId> {
        self.from
    }

    pub fn to(&self) -> Option<PointId> {
        self.to
    }

    pub fn endpoint(&self, end: End) -> Option<PointId> {
        match end {
            End::From => self.from,
            End::To => self.to,
        }
    }

    /// Both endpoints, skipping unset ones and not repeating a self-loop.
    pub fn endpoints(&self) -> impl Iterator<Item = PointId> {
        let to = self.to.filter(|&to| Some(to) != self.from);
        self.from.into_iter().chain(to)
    }

    pub fn touches(&self, point: PointId) -> bool {
        self.from == Some(point) || self.to == Some(point)
    }

    pub fn is_connected(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    /// Segment between the endpoints. Zero-length at the origin until both
    /// endpoints are set.
    pub fn line(&self) -> Line {
        self.line
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub(crate) fn set_endpoint(&mut self, end: End, point: Option<PointId>) -> Option<PointId> {
        match end {
            End::From => std::mem::replace(&mut self.from, point),
            End::To => std::mem::replace(&mut self.to, point),
        }
    }
}
