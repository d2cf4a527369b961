//! Per-kind id counters.
//!
//! Every tracked entity draws its id from one of four independent counters.
//! Generating pre-increments, so the first id handed out is `1` and `0` is
//! never a live id. Counters are restored from persisted state after a load
//! rather than recomputed, which keeps freshly generated ids clear of
//! everything that was just read back.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The entity kinds that own a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdKind {
    Point,
    Link,
    TrackGraph,
    Component,
}

impl IdKind {
    pub const ALL: [IdKind; 4] = [
        IdKind::Point,
        IdKind::Link,
        IdKind::TrackGraph,
        IdKind::Component,
    ];

    fn index(self) -> usize {
        match self {
            IdKind::Point => 0,
            IdKind::Link => 1,
            IdKind::TrackGraph => 2,
            IdKind::Component => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IdKind::Point => "point",
            IdKind::Link => "link",
            IdKind::TrackGraph => "track graph",
            IdKind::Component => "component",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} counter must be a non-negative integer, got {value}")]
    NegativeCount { kind: IdKind, value: i32 },
}

/// Last-issued value of every counter, as persisted by the binary format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastIds {
    pub point: i32,
    pub link: i32,
    pub track_graph: i32,
    pub component: i32,
}

impl LastIds {
    pub fn get(&self, kind: IdKind) -> i32 {
        match kind {
            IdKind::Point => self.point,
            IdKind::Link => self.link,
            IdKind::TrackGraph => self.track_graph,
            IdKind::Component => self.component,
        }
    }

    pub fn set(&mut self, kind: IdKind, value: i32) {
        match kind {
            IdKind::Point => self.point = value,
            IdKind::Link => self.link = value,
            IdKind::TrackGraph => self.track_graph = value,
            IdKind::Component => self.component = value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRegistry {
    counters: [i32; 4],
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently issued id for `kind` (`0` if none yet).
    pub fn last(&self, kind: IdKind) -> i32 {
        self.counters[kind.index()]
    }

    pub fn generate(&mut self, kind: IdKind) -> i32 {
        let slot = &mut self.counters[kind.index()];
        *slot += 1;
        *slot
    }

    /// Replace the counter for `kind`. Negative values are rejected and leave
    /// the counter untouched.
    pub fn force_set(&mut self, kind: IdKind, value: i32) -> Result<(), RegistryError> {
        if value < 0 {
            log::warn!("Rejected {kind} counter value {value}");
            return Err(RegistryError::NegativeCount { kind, value });
        }
        self.counters[kind.index()] = value;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.counters = [0; 4];
    }

    pub fn last_ids(&self) -> LastIds {
        let mut ids = LastIds::default();
        for kind in IdKind::ALL {
            ids.set(kind, self.last(kind));
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_one_based() {
        let mut registry = IdRegistry::new();
        assert_eq!(registry.last(IdKind::Point), 0);
        assert_eq!(registry.generate(IdKind::Point), 1);
        assert_eq!(registry.generate(IdKind::Point), 2);
        assert_eq!(registry.last(IdKind::Point), 2);
    }

    #[test]
    fn test_counters_are_independent() {
        let mut registry = IdRegistry::new();
        registry.generate(IdKind::Link);
        registry.generate(IdKind::Link);
        assert_eq!(registry.generate(IdKind::Component), 1);
        assert_eq!(registry.generate(IdKind::TrackGraph), 1);
        assert_eq!(registry.last(IdKind::Link), 2);
        assert_eq!(registry.last(IdKind::Point), 0);
    }

    #[test]
    fn test_force_set_rejects_negative() {
        let mut registry = IdRegistry::new();
        registry.force_set(IdKind::Point, 7).unwrap();

        let err = registry.force_set(IdKind::Point, -1).unwrap_err();
        assert_eq!(
            err,
            RegistryError::NegativeCount {
                kind: IdKind::Point,
                value: -1
            }
        );
        assert_eq!(registry.last(IdKind::Point), 7);
        assert_eq!(registry.generate(IdKind::Point), 8);
    }

    #[test]
    fn test_force_set_can_lower_counter() {
        let mut registry = IdRegistry::new();
        registry.force_set(IdKind::Component, 40).unwrap();
        registry.force_set(IdKind::Component, 3).unwrap();
        assert_eq!(registry.generate(IdKind::Component), 4);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut registry = IdRegistry::new();
        for kind in IdKind::ALL {
            registry.generate(kind);
        }
        registry.reset();
        assert_eq!(registry.last_ids(), LastIds::default());
    }

    #[test]
    fn test_last_ids_snapshot() {
        let mut registry = IdRegistry::new();
        registry.force_set(IdKind::TrackGraph, 5).unwrap();
        registry.generate(IdKind::Point);
        let ids = registry.last_ids();
        assert_eq!(ids.point, 1);
        assert_eq!(ids.track_graph, 5);
        assert_eq!(ids.get(IdKind::Link), 0);
    }
}
