//! Cover aggregate engine
//!
//! Keeps each target's aggregates in line with the cover state store. Every
//! public entry point runs inside the target's [`TargetLock`] slot, so one
//! read-modify-write cycle never interleaves with another on the same target.
//! The `*_locked` helpers assume the slot is already held and are composed
//! freely inside a single task.
//!
//! Nothing here returns an error. A write aimed at a record that vanished in
//! the meantime counts as done; any other failure is logged and left for the
//! next reconcile pass to repair.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use ahash::{AHashMap, AHashSet};

use crate::core::config::CoverBonuses;
use crate::core::error::Result;
use crate::core::types::{ActorSignature, CoverSeverity, EntityId};
use crate::cover::aggregate::{AggregateId, AggregateRepository, CoverAggregate, CoverRule};
use crate::cover::lock::TargetLock;
use crate::cover::store::CoverStateStore;
use crate::scene::{Entity, SceneProvider};

/// Where a target is in its update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    Clean,
    /// A contribution changed since the last reconcile
    Dirty,
    Reconciling,
}

pub struct AggregateEngine {
    repo: Arc<AggregateRepository>,
    store: Arc<CoverStateStore>,
    scene: Arc<dyn SceneProvider>,
    bonuses: CoverBonuses,
    lock: TargetLock,
    phases: StdMutex<AHashMap<EntityId, TargetPhase>>,
}

impl AggregateEngine {
    pub fn new(
        store: Arc<CoverStateStore>,
        scene: Arc<dyn SceneProvider>,
        bonuses: CoverBonuses,
    ) -> Self {
        Self::with_repository(Arc::new(AggregateRepository::new()), store, scene, bonuses)
    }

    pub fn with_repository(
        repo: Arc<AggregateRepository>,
        store: Arc<CoverStateStore>,
        scene: Arc<dyn SceneProvider>,
        bonuses: CoverBonuses,
    ) -> Self {
        Self {
            repo,
            store,
            scene,
            bonuses,
            lock: TargetLock::new(),
            phases: StdMutex::new(AHashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<AggregateRepository> {
        &self.repo
    }

    /// Current aggregates of `target`, oldest first
    pub async fn aggregates(&self, target: EntityId) -> Vec<CoverAggregate> {
        self.repo.list(target).await
    }

    pub fn phase(&self, target: EntityId) -> TargetPhase {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target)
            .copied()
            .unwrap_or(TargetPhase::Clean)
    }

    fn set_phase(&self, target: EntityId, phase: TargetPhase) {
        let mut phases = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        if phase == TargetPhase::Clean {
            phases.remove(&target);
        } else {
            phases.insert(target, phase);
        }
    }

    // === LOCKED ENTRY POINTS ===

    /// Make `observer` contribute exactly one AC rule to `target`, at `severity`
    ///
    /// `CoverSeverity::None` withdraws the observer's contribution instead.
    pub async fn add_observer_contribution(
        &self,
        target: EntityId,
        observer: &Entity,
        severity: CoverSeverity,
    ) {
        self.lock
            .run_exclusive(target, async {
                self.set_phase(target, TargetPhase::Dirty);
                if severity.is_none() {
                    self.remove_locked(target, observer).await;
                } else {
                    self.add_locked(target, observer, severity).await;
                }
                self.prune_locked(target).await;
            })
            .await
    }

    /// Strip every rule `observer` contributed to `target`
    pub async fn remove_observer_contribution(&self, target: EntityId, observer: &Entity) {
        self.lock
            .run_exclusive(target, async {
                self.set_phase(target, TargetPhase::Dirty);
                self.remove_locked(target, observer).await;
                self.prune_locked(target).await;
            })
            .await
    }

    pub async fn update_secondary_bonuses(&self, target: EntityId) {
        self.lock
            .run_exclusive(target, self.update_secondary_locked(target))
            .await
    }

    pub async fn dedupe(&self, target: EntityId) {
        self.lock.run_exclusive(target, self.dedupe_locked(target)).await
    }

    pub async fn prune(&self, target: EntityId) {
        self.lock.run_exclusive(target, self.prune_locked(target)).await
    }

    /// Repair pass: drop every rule the state store no longer backs
    ///
    /// Idempotent; a second run with no intervening change writes nothing.
    pub async fn reconcile(&self, target: EntityId) {
        self.lock
            .run_exclusive(target, async {
                self.set_phase(target, TargetPhase::Reconciling);
                self.reconcile_locked(target).await;
                self.set_phase(target, TargetPhase::Clean);
            })
            .await
    }

    /// Delete every aggregate owned by a target that left the scene
    pub async fn remove_target(&self, target: EntityId) {
        self.lock
            .run_exclusive(target, async {
                let removed = self.repo.delete_all(target).await;
                self.set_phase(target, TargetPhase::Clean);
                if removed > 0 {
                    tracing::debug!(%target, removed, "dropped aggregates of removed target");
                }
            })
            .await
    }

    // === MUTATION HELPERS ===

    /// Treat a vanished record as success; log anything else
    fn absorb(result: Result<()>, target: EntityId, aggregate: AggregateId, op: &'static str) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_vanished() => {
                tracing::debug!(%target, ?aggregate, op, "aggregate already gone, nothing to do");
            }
            Err(e) => {
                tracing::warn!(%target, ?aggregate, op, error = %e, "aggregate write failed");
            }
        }
    }

    async fn write(&self, aggregate: &CoverAggregate) {
        Self::absorb(
            self.repo.replace(aggregate).await,
            aggregate.target,
            aggregate.id,
            "update",
        );
    }

    async fn delete(&self, target: EntityId, id: AggregateId) {
        Self::absorb(self.repo.delete(target, id).await, target, id, "delete");
    }

    // === UNLOCKED BODIES ===

    async fn add_locked(&self, target: EntityId, observer: &Entity, severity: CoverSeverity) {
        // One rule per signature: the strongest claim among its live tokens
        let (contributor, severity) = match self.surviving_claim(target, observer).await {
            Some((token, claimed)) if claimed > severity => (token, claimed),
            _ => (observer.clone(), severity),
        };

        self.strip_locked(target, observer).await;
        self.place_locked(target, &contributor, severity).await;
        tracing::debug!(%target, observer = %contributor.id, %severity, "cover contribution added");

        self.update_secondary_locked(target).await;
        self.dedupe_locked(target).await;
    }

    async fn remove_locked(&self, target: EntityId, observer: &Entity) {
        self.strip_locked(target, observer).await;
        tracing::debug!(%target, observer = %observer.id, "cover contribution removed");

        // Another token of the same actor may still claim cover here
        if let Some((token, severity)) = self.surviving_claim(target, observer).await {
            self.place_locked(target, &token, severity).await;
            tracing::debug!(
                %target,
                observer = %token.id,
                %severity,
                "contribution restored for token sharing the signature"
            );
        }

        self.update_secondary_locked(target).await;
        self.dedupe_locked(target).await;
    }

    /// Strip every observer-scoped rule of `observer` from `target`
    async fn strip_locked(&self, target: EntityId, observer: &Entity) {
        for mut aggregate in self.repo.list(target).await {
            let before = aggregate.rules.len();
            aggregate
                .rules
                .retain(|r| !Self::contributed_by(r, observer.id, &observer.signature));
            if aggregate.rules.len() != before {
                // Emptied aggregates stay until the prune pass
                self.write(&aggregate).await;
            }
        }
    }

    /// Add `contributor`'s AC rule and marker to the oldest aggregate of `severity`
    async fn place_locked(&self, target: EntityId, contributor: &Entity, severity: CoverSeverity) {
        let existing = self
            .repo
            .list(target)
            .await
            .into_iter()
            .find(|a| a.severity == severity);
        let mut home = match existing {
            Some(aggregate) => aggregate,
            None => self.repo.create(target, severity).await,
        };
        let signature = &contributor.signature;
        home.rules.push(CoverRule::ac(
            signature.clone(),
            contributor.id,
            severity,
            self.bonuses.ac(severity),
        ));
        home.rules.push(CoverRule::marker(signature.clone(), contributor.id, severity));

        if let Err(e) = self.repo.replace(&home).await {
            if e.is_vanished() {
                // Deleted underneath us: recreate so the contribution lands
                tracing::debug!(%target, aggregate = ?home.id, "aggregate vanished, recreating");
                let mut fresh = self.repo.create(target, severity).await;
                fresh.rules = home.rules;
                self.write(&fresh).await;
            } else {
                tracing::warn!(%target, error = %e, "failed to record cover contribution");
            }
        }
    }

    /// Strongest claim on `target` by another live token sharing `observer`'s signature
    async fn surviving_claim(
        &self,
        target: EntityId,
        observer: &Entity,
    ) -> Option<(Entity, CoverSeverity)> {
        let mut best: Option<(Entity, CoverSeverity)> = None;
        for token in self.scene.entities_with_signature(&observer.signature) {
            if token.id == observer.id {
                continue;
            }
            let severity = self.store.get(token.id, target).await;
            if severity.is_none() {
                continue;
            }
            if best.as_ref().map_or(true, |(_, held)| severity > *held) {
                best = Some((token, severity));
            }
        }
        best
    }

    /// Observer-scoped rule written by this entity or its actor
    fn contributed_by(rule: &CoverRule, id: EntityId, signature: &ActorSignature) -> bool {
        if rule.is_secondary() {
            return false;
        }
        rule.belongs_to(signature) || rule.contributor_id == Some(id)
    }

    async fn update_secondary_locked(&self, target: EntityId) {
        let aggregates = self.repo.list(target).await;

        let top = aggregates
            .iter()
            .filter(|a| !a.is_inert())
            .max_by(|a, b| a.severity.cmp(&b.severity).then(b.id.cmp(&a.id)));
        let owner = top
            .filter(|a| a.severity.grants_secondary_bonuses())
            .map(|a| (a.id, a.severity));

        for aggregate in aggregates {
            let mut rules: Vec<CoverRule> = aggregate
                .rules
                .iter()
                .filter(|r| !r.is_secondary())
                .cloned()
                .collect();
            if let Some((id, severity)) = owner {
                if aggregate.id == id {
                    let bonus = self.bonuses.for_severity(severity);
                    rules.push(CoverRule::reflex(severity, bonus.reflex));
                    rules.push(CoverRule::stealth(severity, bonus.stealth));
                }
            }
            if rules != aggregate.rules {
                let updated = CoverAggregate { rules, ..aggregate };
                self.write(&updated).await;
            }
        }
    }

    async fn dedupe_locked(&self, target: EntityId) {
        let aggregates = self.repo.list(target).await;

        let mut groups: AHashMap<CoverSeverity, Vec<CoverAggregate>> = AHashMap::new();
        for aggregate in aggregates {
            groups.entry(aggregate.severity).or_default().push(aggregate);
        }

        for (severity, mut group) in groups {
            if group.len() < 2 {
                continue;
            }
            // Oldest record wins
            group.sort_by_key(|a| a.id);
            let mut duplicates = group.split_off(1);
            let Some(mut primary) = group.pop() else {
                continue;
            };

            for duplicate in &mut duplicates {
                for rule in duplicate.rules.drain(..) {
                    if !primary.rules.contains(&rule) {
                        primary.rules.push(rule);
                    }
                }
            }
            primary.label = severity.label().to_string();
            self.write(&primary).await;
            for duplicate in &duplicates {
                self.delete(target, duplicate.id).await;
            }
            tracing::info!(
                %target,
                %severity,
                primary = ?primary.id,
                merged = duplicates.len(),
                "merged duplicate cover aggregates"
            );
        }

        self.update_secondary_locked(target).await;
    }

    /// Severities live observers still record for `target`
    async fn claimed_severities(&self, target: EntityId) -> AHashSet<CoverSeverity> {
        self.store
            .observers_of(target)
            .await
            .into_iter()
            .filter(|(observer, _)| self.scene.entity(*observer).is_some())
            .map(|(_, severity)| severity)
            .collect()
    }

    async fn prune_locked(&self, target: EntityId) {
        let aggregates = self.repo.list(target).await;
        if !aggregates.iter().any(CoverAggregate::is_inert) {
            return;
        }

        let claimed = self.claimed_severities(target).await;
        for aggregate in aggregates.iter().filter(|a| a.is_inert()) {
            if claimed.contains(&aggregate.severity) {
                tracing::debug!(
                    %target,
                    severity = %aggregate.severity,
                    "keeping empty aggregate the state store still claims"
                );
                continue;
            }
            self.delete(target, aggregate.id).await;
        }
    }

    /// Signatures of live observers mapped to the severities they record
    async fn claims_by_signature(
        &self,
        target: EntityId,
    ) -> AHashMap<ActorSignature, AHashSet<CoverSeverity>> {
        let mut claims: AHashMap<ActorSignature, AHashSet<CoverSeverity>> = AHashMap::new();
        for (observer, severity) in self.store.observers_of(target).await {
            if let Some(entity) = self.scene.entity(observer) {
                claims.entry(entity.signature).or_default().insert(severity);
            }
        }
        claims
    }

    /// Signature a rule belongs to, recovered from its entity id if missing
    fn rule_signature(&self, rule: &CoverRule) -> Option<ActorSignature> {
        rule.contributor_signature.clone().or_else(|| {
            rule.contributor_id
                .and_then(|id| self.scene.entity(id))
                .map(|entity| entity.signature)
        })
    }

    async fn reconcile_locked(&self, target: EntityId) {
        self.dedupe_locked(target).await;

        let claims = self.claims_by_signature(target).await;
        let mut dropped = 0usize;

        for aggregate in self.repo.list(target).await {
            let backed = |signature: &ActorSignature| {
                !aggregate.severity.is_none()
                    && claims
                        .get(signature)
                        .is_some_and(|severities| severities.contains(&aggregate.severity))
            };

            let mut kept_ac: AHashSet<ActorSignature> = AHashSet::new();
            let mut kept_markers: AHashSet<ActorSignature> = AHashSet::new();
            let mut rules = Vec::with_capacity(aggregate.rules.len());

            // AC rules first: markers are only valid next to a kept AC rule
            let mut ac_rules = Vec::new();
            for (index, rule) in aggregate.rules.iter().enumerate() {
                if !rule.is_ac() {
                    continue;
                }
                let Some(signature) = self.rule_signature(rule) else {
                    continue;
                };
                if backed(&signature) && kept_ac.insert(signature.clone()) {
                    ac_rules.push((index, signature));
                }
            }

            for (index, rule) in aggregate.rules.iter().enumerate() {
                if rule.is_secondary() {
                    rules.push(rule.clone());
                } else if rule.is_ac() {
                    if let Some((_, signature)) = ac_rules.iter().find(|(i, _)| *i == index) {
                        rules.push(CoverRule {
                            contributor_signature: Some(signature.clone()),
                            ..rule.clone()
                        });
                    }
                } else if let Some(signature) = self.rule_signature(rule) {
                    if kept_ac.contains(&signature) && kept_markers.insert(signature.clone()) {
                        rules.push(CoverRule {
                            contributor_signature: Some(signature),
                            ..rule.clone()
                        });
                    }
                }
            }

            if rules != aggregate.rules {
                dropped += aggregate.rules.len().saturating_sub(rules.len());
                let repaired = CoverAggregate { rules, ..aggregate };
                self.write(&repaired).await;
            }
        }

        self.update_secondary_locked(target).await;
        self.prune_locked(target).await;

        if dropped > 0 {
            tracing::info!(%target, dropped, "reconcile dropped stale cover rules");
        } else {
            tracing::debug!(%target, "reconcile found aggregates consistent");
        }
    }
}
