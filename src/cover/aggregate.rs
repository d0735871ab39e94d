//! Cover aggregates: per-target, per-severity summaries of the state store
//!
//! A target owns at most one aggregate per severity. Each aggregate carries
//! one AC rule (plus an identity marker) per observer currently imposing that
//! severity, and the aggregate of the highest live severity also carries the
//! reflex/stealth rules.

#[cfg(test)]
use std::sync::atomic::AtomicBool;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::error::{CoverError, Result};
use crate::core::types::{ActorSignature, CoverSeverity, EntityId};

/// Stable identifier of an aggregate record; lower ids are older
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// AC bonus applied only when the contributor originates the check
    AcBonus,
    /// Records which observer the aggregate is tracking; carries no bonus
    ObserverMarker,
    ReflexBonus,
    StealthBonus,
}

/// One atomic contribution to an aggregate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoverRule {
    pub kind: RuleKind,
    /// Observer the rule is scoped to; `None` for secondary bonuses
    pub contributor_signature: Option<ActorSignature>,
    /// Entity id of the observer when the rule was written
    pub contributor_id: Option<EntityId>,
    pub severity: CoverSeverity,
    pub value: i32,
}

impl CoverRule {
    pub fn ac(
        signature: ActorSignature,
        observer: EntityId,
        severity: CoverSeverity,
        bonus: i32,
    ) -> Self {
        Self {
            kind: RuleKind::AcBonus,
            contributor_signature: Some(signature),
            contributor_id: Some(observer),
            severity,
            value: bonus,
        }
    }

    pub fn marker(signature: ActorSignature, observer: EntityId, severity: CoverSeverity) -> Self {
        Self {
            kind: RuleKind::ObserverMarker,
            contributor_signature: Some(signature),
            contributor_id: Some(observer),
            severity,
            value: 0,
        }
    }

    pub fn reflex(severity: CoverSeverity, bonus: i32) -> Self {
        Self {
            kind: RuleKind::ReflexBonus,
            contributor_signature: None,
            contributor_id: None,
            severity,
            value: bonus,
        }
    }

    pub fn stealth(severity: CoverSeverity, bonus: i32) -> Self {
        Self {
            kind: RuleKind::StealthBonus,
            contributor_signature: None,
            contributor_id: None,
            severity,
            value: bonus,
        }
    }

    pub fn is_ac(&self) -> bool {
        self.kind == RuleKind::AcBonus
    }

    pub fn is_marker(&self) -> bool {
        self.kind == RuleKind::ObserverMarker
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self.kind, RuleKind::ReflexBonus | RuleKind::StealthBonus)
    }

    /// Is this an observer-scoped rule contributed by `signature`?
    pub fn belongs_to(&self, signature: &ActorSignature) -> bool {
        self.contributor_signature.as_ref() == Some(signature)
    }
}

/// Derived record owned by the target it modifies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverAggregate {
    pub id: AggregateId,
    pub target: EntityId,
    pub severity: CoverSeverity,
    pub label: String,
    pub rules: Vec<CoverRule>,
}

impl CoverAggregate {
    pub fn ac_rules(&self) -> impl Iterator<Item = &CoverRule> {
        self.rules.iter().filter(|r| r.is_ac())
    }

    pub fn ac_rule_count(&self) -> usize {
        self.ac_rules().count()
    }

    /// No AC rules left: eligible for pruning
    pub fn is_inert(&self) -> bool {
        self.ac_rule_count() == 0
    }

    pub fn has_secondary_bonuses(&self) -> bool {
        self.rules.iter().any(CoverRule::is_secondary)
    }

    pub fn has_contributor(&self, signature: &ActorSignature) -> bool {
        self.ac_rules().any(|r| r.belongs_to(signature))
    }

    /// AC bonus this aggregate grants when `origin` makes the check
    pub fn ac_bonus_against(&self, origin: &ActorSignature) -> i32 {
        self.ac_rules()
            .filter(|r| r.belongs_to(origin))
            .map(|r| r.value)
            .max()
            .unwrap_or(0)
    }

    pub fn secondary_bonus(&self, kind: RuleKind) -> i32 {
        self.rules
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.value)
            .max()
            .unwrap_or(0)
    }
}

/// The persisted aggregate collections of every target
///
/// Every operation is an async boundary. Writes aimed at a record that no
/// longer exists fail with [`CoverError::AggregateNotFound`].
#[derive(Debug)]
pub struct AggregateRepository {
    records: RwLock<AHashMap<EntityId, Vec<CoverAggregate>>>,
    next_id: AtomicU64,
    /// Delete the record the next `replace` aims at just before writing
    #[cfg(test)]
    vanish_next_write: AtomicBool,
}

impl Default for AggregateRepository {
    fn default() -> Self {
        Self {
            records: RwLock::new(AHashMap::new()),
            next_id: AtomicU64::new(1),
            #[cfg(test)]
            vanish_next_write: AtomicBool::new(false),
        }
    }
}

impl AggregateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `replace` find its record deleted, as if another task
    /// removed it between the caller's read and write
    #[cfg(test)]
    pub(crate) fn vanish_on_next_write(&self) {
        self.vanish_next_write.store(true, Ordering::SeqCst);
    }

    fn allocate_id(&self) -> AggregateId {
        AggregateId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// All aggregates of `target`, oldest first
    pub async fn list(&self, target: EntityId) -> Vec<CoverAggregate> {
        let mut aggregates = self
            .records
            .read()
            .await
            .get(&target)
            .cloned()
            .unwrap_or_default();
        aggregates.sort_by_key(|a| a.id);
        aggregates
    }

    pub async fn get(&self, target: EntityId, id: AggregateId) -> Option<CoverAggregate> {
        self.records
            .read()
            .await
            .get(&target)
            .and_then(|aggs| aggs.iter().find(|a| a.id == id))
            .cloned()
    }

    /// Targets that currently own at least one aggregate
    pub async fn targets(&self) -> Vec<EntityId> {
        self.records
            .read()
            .await
            .iter()
            .filter(|(_, aggs)| !aggs.is_empty())
            .map(|(target, _)| *target)
            .collect()
    }

    /// Create an empty aggregate for `(target, severity)`
    pub async fn create(&self, target: EntityId, severity: CoverSeverity) -> CoverAggregate {
        self.import(target, severity, severity.label().to_string(), Vec::new())
            .await
    }

    /// Insert a pre-existing record verbatim under a fresh id
    ///
    /// No uniqueness check is made, so legacy data may produce several
    /// records for one severity; dedupe merges them.
    pub async fn import(
        &self,
        target: EntityId,
        severity: CoverSeverity,
        label: String,
        rules: Vec<CoverRule>,
    ) -> CoverAggregate {
        let aggregate = CoverAggregate {
            id: self.allocate_id(),
            target,
            severity,
            label,
            rules,
        };
        self.records
            .write()
            .await
            .entry(target)
            .or_default()
            .push(aggregate.clone());
        aggregate
    }

    /// Write back a modified record
    pub async fn replace(&self, aggregate: &CoverAggregate) -> Result<()> {
        let mut records = self.records.write().await;
        #[cfg(test)]
        if self.vanish_next_write.swap(false, Ordering::SeqCst) {
            if let Some(aggs) = records.get_mut(&aggregate.target) {
                aggs.retain(|a| a.id != aggregate.id);
            }
        }
        let slot = records
            .get_mut(&aggregate.target)
            .and_then(|aggs| aggs.iter_mut().find(|a| a.id == aggregate.id))
            .ok_or(CoverError::AggregateNotFound {
                target: aggregate.target,
                aggregate: aggregate.id,
            })?;
        *slot = aggregate.clone();
        Ok(())
    }

    pub async fn delete(&self, target: EntityId, id: AggregateId) -> Result<()> {
        let mut records = self.records.write().await;
        let aggs = records
            .get_mut(&target)
            .ok_or(CoverError::AggregateNotFound { target, aggregate: id })?;
        let before = aggs.len();
        aggs.retain(|a| a.id != id);
        if aggs.len() == before {
            return Err(CoverError::AggregateNotFound { target, aggregate: id });
        }
        if aggs.is_empty() {
            records.remove(&target);
        }
        Ok(())
    }

    /// Delete every aggregate owned by `target`, returning how many went
    pub async fn delete_all(&self, target: EntityId) -> usize {
        self.records
            .write()
            .await
            .remove(&target)
            .map(|aggs| aggs.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(s: &str) -> ActorSignature {
        ActorSignature::new(s)
    }

    #[test]
    fn test_rule_classification() {
        let observer = EntityId::new();
        let ac = CoverRule::ac(sig("a"), observer, CoverSeverity::Lesser, 1);
        let marker = CoverRule::marker(sig("a"), observer, CoverSeverity::Lesser);
        let reflex = CoverRule::reflex(CoverSeverity::Standard, 2);

        assert!(ac.is_ac() && !ac.is_secondary());
        assert!(marker.is_marker() && !marker.is_ac());
        assert!(reflex.is_secondary());
        assert!(ac.belongs_to(&sig("a")));
        assert!(!ac.belongs_to(&sig("b")));
        assert!(!reflex.belongs_to(&sig("a")));
    }

    #[test]
    fn test_ac_bonus_scoped_to_origin() {
        let aggregate = CoverAggregate {
            id: AggregateId(1),
            target: EntityId::new(),
            severity: CoverSeverity::Standard,
            label: "Standard Cover".into(),
            rules: vec![
                CoverRule::ac(sig("giant"), EntityId::new(), CoverSeverity::Standard, 2),
                CoverRule::reflex(CoverSeverity::Standard, 2),
            ],
        };
        assert_eq!(aggregate.ac_bonus_against(&sig("giant")), 2);
        assert_eq!(aggregate.ac_bonus_against(&sig("archer")), 0);
        assert_eq!(aggregate.secondary_bonus(RuleKind::ReflexBonus), 2);
        assert_eq!(aggregate.secondary_bonus(RuleKind::StealthBonus), 0);
        assert!(!aggregate.is_inert());
        assert!(aggregate.has_contributor(&sig("giant")));
    }

    #[test]
    fn test_secondary_only_aggregate_is_inert() {
        let aggregate = CoverAggregate {
            id: AggregateId(1),
            target: EntityId::new(),
            severity: CoverSeverity::Standard,
            label: "Standard Cover".into(),
            rules: vec![CoverRule::reflex(CoverSeverity::Standard, 2)],
        };
        assert!(aggregate.is_inert());
        assert!(aggregate.has_secondary_bonuses());
    }

    #[tokio::test]
    async fn test_create_list_replace_delete() {
        let repo = AggregateRepository::new();
        let target = EntityId::new();

        let mut created = repo.create(target, CoverSeverity::Lesser).await;
        assert_eq!(created.label, "Lesser Cover");
        assert_eq!(repo.list(target).await.len(), 1);
        assert_eq!(repo.targets().await, vec![target]);

        created
            .rules
            .push(CoverRule::ac(sig("a"), EntityId::new(), CoverSeverity::Lesser, 1));
        repo.replace(&created).await.unwrap();
        assert_eq!(repo.get(target, created.id).await.unwrap().ac_rule_count(), 1);

        repo.delete(target, created.id).await.unwrap();
        assert!(repo.list(target).await.is_empty());
        assert!(repo.targets().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_to_vanished_record_fails() {
        let repo = AggregateRepository::new();
        let target = EntityId::new();
        let created = repo.create(target, CoverSeverity::Standard).await;
        repo.delete(target, created.id).await.unwrap();

        let err = repo.replace(&created).await.unwrap_err();
        assert!(err.is_vanished());
        let err = repo.delete(target, created.id).await.unwrap_err();
        assert!(err.is_vanished());
    }

    #[tokio::test]
    async fn test_list_is_oldest_first() {
        let repo = AggregateRepository::new();
        let target = EntityId::new();
        let first = repo.create(target, CoverSeverity::Standard).await;
        let second = repo
            .import(target, CoverSeverity::Standard, "Cover (legacy)".into(), Vec::new())
            .await;
        let ids: Vec<AggregateId> = repo.list(target).await.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert!(first.id < second.id);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let repo = AggregateRepository::new();
        let target = EntityId::new();
        repo.create(target, CoverSeverity::Lesser).await;
        repo.create(target, CoverSeverity::Standard).await;
        assert_eq!(repo.delete_all(target).await, 2);
        assert_eq!(repo.delete_all(target).await, 0);
    }
}
