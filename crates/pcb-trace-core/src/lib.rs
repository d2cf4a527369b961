//! Connectivity model for reverse-engineering circuit boards.
//!
//! A [`Board`] holds points, the links drawn between them, components that
//! own pads, and free-text notes. Every point and link sits on one [`Side`].
//! Links that share points form track graphs, computed on demand by
//! [`analysis`]. Boards round-trip through two file formats in [`codec`].

pub mod analysis;
pub mod bus;
pub mod codec;
pub mod config;
pub mod graph;
pub mod layer;
pub mod registry;
pub mod scene;

// Re-export commonly used types
pub use analysis::{partition, Connectivity, TrackGraph};
pub use bus::{EventKind, NotificationBus, Subject};
pub use codec::{Format, LoadError, SaveError};
pub use config::{AppearanceConfig, ConfigError, Palette};
pub use graph::{
    Board, Component, ComponentId, Emphasis, End, GraphError, ImageLayer, Link, LinkId, Note,
    NoteId, PadInfo, Point, PointId, PointKind, RemovedComponent, RemovedPoint, TrackGraphId,
};
pub use layer::{ItemRef, LayerStack, Side};
pub use registry::{IdKind, IdRegistry, LastIds, RegistryError};
pub use scene::Scene;

pub use kurbo::{Line, Point as Position, Rect};
