//! Synchronous publish/subscribe channel between the board and its listeners.
//!
//! Listeners are invoked in subscription order on the publishing thread.
//! Nothing is buffered: an event with no listener is simply dropped.

use std::collections::HashMap;
use std::fmt;

use crate::graph::{ComponentId, NoteId, PointId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointMadeSingleLink,
    PointMadeMultipleLinks,
    PointDeleted,
    ComponentCreated,
    ComponentDeleted,
    NoteCreated,
    NoteDeleted,
    SceneCleared,
}

/// The entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Point(PointId),
    Component(ComponentId),
    Note(NoteId),
    Scene,
}

pub type Listener = Box<dyn FnMut(EventKind, &Subject)>;

#[derive(Default)]
pub struct NotificationBus {
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(EventKind, &Subject) + 'static,
    {
        self.listeners
            .entry(kind)
            .or_default()
            .push(Box::new(listener));
    }

    pub fn publish(&mut self, kind: EventKind, subject: Subject) {
        if let Some(listeners) = self.listeners.get_mut(&kind) {
            for listener in listeners.iter_mut() {
                listener(kind, &subject);
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .listeners
            .iter()
            .map(|(kind, listeners)| (*kind, listeners.len()))
            .collect();
        counts.sort_by_key(|(kind, _)| format!("{kind:?}"));
        f.debug_struct("NotificationBus")
            .field("listeners", &counts)
            .finish()
    }
}
