//! Per-target serialization of aggregate mutations
//!
//! Each target gets its own FIFO queue. Tasks for the same target run one
//! at a time in arrival order; tasks for different targets never wait on
//! each other. A task that fails (or panics) releases its slot like any
//! other, so the queue keeps draining.

use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use ahash::AHashMap;
use tokio::sync::Mutex;

use crate::core::types::EntityId;

type Queue = Arc<Mutex<()>>;

#[derive(Debug, Default)]
pub struct TargetLock {
    queues: StdMutex<AHashMap<EntityId, Queue>>,
}

/// Holds a reference to a target's queue and drops the queue from the map
/// once nobody else is waiting on it
struct QueueTicket<'a> {
    lock: &'a TargetLock,
    target: EntityId,
    queue: Queue,
}

impl Drop for QueueTicket<'_> {
    fn drop(&mut self) {
        let mut queues = self.lock.queues.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in this ticket
        if Arc::strong_count(&self.queue) <= 2 {
            queues.remove(&self.target);
        }
    }
}

impl TargetLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn ticket(&self, target: EntityId) -> QueueTicket<'_> {
        let queue = self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(target)
            .or_default()
            .clone();
        QueueTicket {
            lock: self,
            target,
            queue,
        }
    }

    /// Run `task` once every earlier task for `target` has finished
    ///
    /// `tokio::sync::Mutex` hands the lock out in FIFO order, which gives the
    /// per-target queue its ordering.
    pub async fn run_exclusive<F, T>(&self, target: EntityId, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let ticket = self.ticket(target);
        let _guard = ticket.queue.lock().await;
        task.await
    }

    /// Number of targets with a live queue
    pub fn active_targets(&self) -> usize {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
