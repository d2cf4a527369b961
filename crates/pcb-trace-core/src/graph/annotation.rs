use std::path::PathBuf;

use kurbo::{Point as Position, Rect};

use super::NoteId;
use crate::layer::Side;

/// A free-text annotation. Notes are created on the NOTES layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub(crate) id: NoteId,
    pub(crate) rect: Rect,
    pub(crate) text: String,
}

impl Note {
    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A background photo of one board side. Only the reference is kept; the
/// image itself is never opened here.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayer {
    pub side: Side,
    pub image_path: PathBuf,
    pub position: Position,
    pub opacity: f64,
}

impl ImageLayer {
    pub fn new(side: Side, image_path: impl Into<PathBuf>) -> Self {
        Self {
            side,
            image_path: image_path.into(),
            position: Position::ORIGIN,
            opacity: 1.0,
        }
    }
}
