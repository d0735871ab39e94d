//! Attack contexts: the cover resolved for one declared attack
//!
//! A context lives from the attack declaration until the attack completes or
//! its time-to-live runs out, whichever comes first. The registry is owned by
//! whoever resolves attacks; there is no process-wide table.

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::types::{CoverSeverity, EntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackId(pub Uuid);

impl AttackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackContext {
    pub id: AttackId,
    pub attacker: EntityId,
    pub target: EntityId,
    pub severity: CoverSeverity,
    pub opened_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct AttackContexts {
    open: Arc<StdMutex<AHashMap<AttackId, AttackContext>>>,
}

impl AttackContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a context that expires after `ttl` unless completed first
    ///
    /// Expiry needs a tokio runtime; outside one the context stays until
    /// [`AttackContexts::complete`] is called.
    pub fn open(
        &self,
        attacker: EntityId,
        target: EntityId,
        severity: CoverSeverity,
        ttl: Duration,
    ) -> AttackContext {
        let context = AttackContext {
            id: AttackId::new(),
            attacker,
            target,
            severity,
            opened_at: Instant::now(),
        };
        self.lock().insert(context.id, context.clone());

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let open = Arc::clone(&self.open);
                let id = context.id;
                handle.spawn(async move {
                    tokio::time::sleep(ttl).await;
                    let expired = open
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&id);
                    if expired.is_some() {
                        tracing::debug!(attack = %id, "attack context expired");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(attack = %context.id, "no runtime, attack context will not expire");
            }
        }
        context
    }

    pub fn get(&self, id: AttackId) -> Option<AttackContext> {
        self.lock().get(&id).cloned()
    }

    /// Close a context; `None` if it already completed or expired
    pub fn complete(&self, id: AttackId) -> Option<AttackContext> {
        self.lock().remove(&id)
    }

    /// Drop every open context involving `entity`
    pub fn forget_entity(&self, entity: EntityId) -> usize {
        let mut open = self.lock();
        let before = open.len();
        open.retain(|_, c| c.attacker != entity && c.target != entity);
        before - open.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AHashMap<AttackId, AttackContext>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
