//! Cover change notifications
//!
//! Published whenever a target's recorded cover against an observer changes.
//! Consumers (UI, combat resolution) subscribe and react; the cover core
//! never calls into them directly.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::types::{CoverSeverity, EntityId};

/// Default buffer of undelivered notifications per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverChanged {
    pub observer: EntityId,
    pub target: EntityId,
    pub severity: CoverSeverity,
}

#[derive(Debug, Clone)]
pub struct CoverEvents {
    sender: broadcast::Sender<CoverChanged>,
}

impl Default for CoverEvents {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl CoverEvents {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoverChanged> {
        self.sender.subscribe()
    }

    /// Publish a change; having no subscribers is not an error
    pub fn publish(&self, event: CoverChanged) {
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(
            observer = %event.observer,
            target = %event.target,
            severity = %event.severity,
            delivered,
            "cover change published"
        );
    }
}
