//! Cover service: the surface hosts call
//!
//! Wires the resolver, state store, aggregate engine, change notifications
//! and attack contexts to one scene and one configuration.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use ahash::AHashSet;
use tokio::sync::broadcast;

use crate::core::config::CoverConfig;
use crate::core::error::{CoverError, Result};
use crate::core::types::{ActorSignature, CoverSeverity, EntityId};
use crate::cover::aggregate::CoverAggregate;
use crate::cover::context::{AttackContext, AttackContexts, AttackId};
use crate::cover::engine::AggregateEngine;
use crate::cover::events::{CoverChanged, CoverEvents};
use crate::cover::resolver;
use crate::cover::store::CoverStateStore;
use crate::scene::{Entity, SceneProvider, VisibilityProvider};

/// Options for [`CoverService::record_cover`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOptions {
    /// Bring the target's aggregates in line after writing the store
    pub update_aggregates: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            update_aggregates: true,
        }
    }
}

impl RecordOptions {
    /// Write the store only
    pub fn store_only() -> Self {
        Self {
            update_aggregates: false,
        }
    }
}

pub struct CoverService {
    scene: Arc<dyn SceneProvider>,
    visibility: Arc<dyn VisibilityProvider>,
    config: CoverConfig,
    store: Arc<CoverStateStore>,
    engine: AggregateEngine,
    events: CoverEvents,
    contexts: AttackContexts,
    /// Every (observer, target) pair ever recorded, including ones now at none
    tracked: StdMutex<AHashSet<(EntityId, EntityId)>>,
}

impl CoverService {
    pub fn new(
        scene: Arc<dyn SceneProvider>,
        visibility: Arc<dyn VisibilityProvider>,
        config: CoverConfig,
    ) -> Self {
        let store = Arc::new(CoverStateStore::new());
        let engine = AggregateEngine::new(store.clone(), scene.clone(), config.bonuses.clone());
        Self {
            scene,
            visibility,
            config,
            store,
            engine,
            events: CoverEvents::default(),
            contexts: AttackContexts::new(),
            tracked: StdMutex::new(AHashSet::new()),
        }
    }

    pub fn config(&self) -> &CoverConfig {
        &self.config
    }

    pub fn store(&self) -> &CoverStateStore {
        &self.store
    }

    pub fn engine(&self) -> &AggregateEngine {
        &self.engine
    }

    pub fn contexts(&self) -> &AttackContexts {
        &self.contexts
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoverChanged> {
        self.events.subscribe()
    }

    fn entity(&self, id: EntityId) -> Result<Entity> {
        self.scene.entity(id).ok_or(CoverError::EntityNotFound(id))
    }

    // === RESOLUTION ===

    /// Cover `target` has against `attacker` on the current scene; writes nothing
    pub fn resolve_cover(&self, attacker: &Entity, target: &Entity) -> CoverSeverity {
        let entities = self.scene.entities();
        resolver::resolve_cover(
            attacker,
            target,
            &entities,
            self.visibility.as_ref(),
            &self.config,
        )
    }

    /// [`CoverService::resolve_cover`] by id
    pub fn resolve_between(&self, attacker: EntityId, target: EntityId) -> Result<CoverSeverity> {
        let attacker = self.entity(attacker)?;
        let target = self.entity(target)?;
        Ok(self.resolve_cover(&attacker, &target))
    }

    // === RECORDING ===

    /// Persist `observer`'s view of `target` and, unless suppressed, update
    /// the target's aggregates before returning
    pub async fn record_cover(
        &self,
        observer: &Entity,
        target: EntityId,
        severity: CoverSeverity,
        options: RecordOptions,
    ) {
        self.tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((observer.id, target));
        let previous = self.store.set(observer.id, target, severity).await;
        if previous != severity {
            tracing::info!(observer = %observer.id, %target, %previous, %severity, "cover changed");
            self.events.publish(CoverChanged {
                observer: observer.id,
                target,
                severity,
            });
        }
        if options.update_aggregates {
            self.engine
                .add_observer_contribution(target, observer, severity)
                .await;
        }
    }

    pub async fn apply_cover_contribution(
        &self,
        target: EntityId,
        observer: &Entity,
        severity: CoverSeverity,
    ) {
        self.engine
            .add_observer_contribution(target, observer, severity)
            .await
    }

    pub async fn remove_cover_contribution(&self, target: EntityId, observer: &Entity) {
        self.engine
            .remove_observer_contribution(target, observer)
            .await
    }

    // === REPAIR ===

    pub async fn reconcile_cover_for_target(&self, target: EntityId) {
        self.engine.reconcile(target).await
    }

    /// Reconcile every target that owns aggregates
    pub async fn reconcile_all(&self) {
        let targets = self.engine.repository().targets().await;
        tracing::info!(targets = targets.len(), "reconciling all cover aggregates");
        for target in targets {
            self.engine.reconcile(target).await;
        }
    }

    /// Re-resolve every tracked pair after entities moved or changed state
    ///
    /// Pairs whose cover dropped to none stay tracked, so a blocker stepping
    /// back into the line restores cover.
    pub async fn on_scene_changed(&self) {
        let entities = self.scene.entities();
        let pairs: Vec<(EntityId, EntityId)> = self
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();

        let mut changed = 0usize;
        for (observer_id, target_id) in pairs {
            let observer = entities.iter().find(|e| e.id == observer_id);
            let target = entities.iter().find(|e| e.id == target_id);
            let (Some(observer), Some(target)) = (observer, target) else {
                continue;
            };
            let severity = resolver::resolve_cover(
                observer,
                target,
                &entities,
                self.visibility.as_ref(),
                &self.config,
            );
            if severity != self.store.get(observer_id, target_id).await {
                self.record_cover(observer, target_id, severity, RecordOptions::default())
                    .await;
                changed += 1;
            }
        }
        tracing::debug!(changed, "tracked cover refreshed");
    }

    /// Forget an entity that left the scene
    ///
    /// `removed` is the entity as it was before removal; its signature is
    /// needed to find its rules.
    pub async fn on_entity_removed(&self, removed: &Entity) {
        let pairs = self.store.remove_entity(removed.id).await;
        let dropped_contexts = self.contexts.forget_entity(removed.id);
        self.tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(observer, target)| *observer != removed.id && *target != removed.id);
        self.engine.remove_target(removed.id).await;

        for (observer, target) in &pairs {
            self.events.publish(CoverChanged {
                observer: *observer,
                target: *target,
                severity: CoverSeverity::None,
            });
        }

        let observed: Vec<EntityId> = pairs
            .iter()
            .filter(|(observer, _)| *observer == removed.id)
            .map(|(_, target)| *target)
            .collect();
        for target in observed {
            self.engine.remove_observer_contribution(target, removed).await;
            self.engine.reconcile(target).await;
        }

        tracing::info!(
            entity = %removed.id,
            pairs = pairs.len(),
            dropped_contexts,
            "entity removed from cover tracking"
        );
    }

    // === ATTACKS ===

    /// Resolve and record cover for a declared attack and open its context
    pub async fn on_attack_declared(
        &self,
        attacker: EntityId,
        target: EntityId,
    ) -> Result<AttackContext> {
        let attacker = self.entity(attacker)?;
        let target = self.entity(target)?;
        let severity = self.resolve_cover(&attacker, &target);
        self.record_cover(&attacker, target.id, severity, RecordOptions::default())
            .await;

        let ttl = Duration::from_millis(self.config.context_ttl_ms);
        let context = self.contexts.open(attacker.id, target.id, severity, ttl);
        tracing::debug!(attack = %context.id, %severity, "attack context opened");
        Ok(context)
    }

    pub fn complete_attack(&self, attack: AttackId) -> Option<AttackContext> {
        self.contexts.complete(attack)
    }

    // === QUERIES ===

    pub async fn aggregates(&self, target: EntityId) -> Vec<CoverAggregate> {
        self.engine.aggregates(target).await
    }

    /// AC bonus `target` gets when `origin` makes the check
    pub async fn ac_bonus(&self, target: EntityId, origin: &ActorSignature) -> i32 {
        self.engine
            .aggregates(target)
            .await
            .iter()
            .map(|a| a.ac_bonus_against(origin))
            .max()
            .unwrap_or(0)
    }
}
