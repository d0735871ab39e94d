//! Cover state store: each observer's view of the cover its targets have
//!
//! A flat observer -> target -> severity map and the single source of truth
//! the aggregates are derived from. An absent entry means no cover. The
//! store never triggers side effects; writers call the aggregate engine.

use ahash::AHashMap;
use tokio::sync::RwLock;

use crate::core::types::{CoverSeverity, EntityId};

#[derive(Debug, Default)]
pub struct CoverStateStore {
    rows: RwLock<AHashMap<EntityId, AHashMap<EntityId, CoverSeverity>>>,
}

impl CoverStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cover `target` has from `observer`'s point of view
    pub async fn get(&self, observer: EntityId, target: EntityId) -> CoverSeverity {
        self.rows
            .read()
            .await
            .get(&observer)
            .and_then(|row| row.get(&target))
            .copied()
            .unwrap_or_default()
    }

    /// Persist a severity and return the one it replaced
    ///
    /// Writing `None` removes the entry.
    pub async fn set(
        &self,
        observer: EntityId,
        target: EntityId,
        severity: CoverSeverity,
    ) -> CoverSeverity {
        let mut rows = self.rows.write().await;
        let previous = if severity.is_none() {
            let previous = rows
                .get_mut(&observer)
                .and_then(|row| row.remove(&target))
                .unwrap_or_default();
            if rows.get(&observer).is_some_and(|row| row.is_empty()) {
                rows.remove(&observer);
            }
            previous
        } else {
            rows.entry(observer)
                .or_default()
                .insert(target, severity)
                .unwrap_or_default()
        };
        if previous != severity {
            tracing::debug!(%observer, %target, %previous, %severity, "cover state changed");
        }
        previous
    }

    /// Every observer's recorded severity for `target`
    pub async fn observers_of(&self, target: EntityId) -> Vec<(EntityId, CoverSeverity)> {
        self.rows
            .read()
            .await
            .iter()
            .filter_map(|(observer, row)| row.get(&target).map(|s| (*observer, *s)))
            .collect()
    }

    /// Targets `observer` currently records cover for
    pub async fn targets_of(&self, observer: EntityId) -> Vec<(EntityId, CoverSeverity)> {
        self.rows
            .read()
            .await
            .get(&observer)
            .map(|row| row.iter().map(|(t, s)| (*t, *s)).collect())
            .unwrap_or_default()
    }

    /// Drop every entry where `entity` is observer or target
    ///
    /// Returns the removed `(observer, target)` pairs.
    pub async fn remove_entity(&self, entity: EntityId) -> Vec<(EntityId, EntityId)> {
        let mut rows = self.rows.write().await;
        let mut removed: Vec<(EntityId, EntityId)> = rows
            .remove(&entity)
            .map(|row| row.into_keys().map(|target| (entity, target)).collect())
            .unwrap_or_default();

        for (observer, row) in rows.iter_mut() {
            if row.remove(&entity).is_some() {
                removed.push((*observer, entity));
            }
        }
        rows.retain(|_, row| !row.is_empty());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_entry_is_none() {
        let store = CoverStateStore::new();
        assert_eq!(
            store.get(EntityId::new(), EntityId::new()).await,
            CoverSeverity::None
        );
    }

    #[tokio::test]
    async fn test_set_returns_previous() {
        let store = CoverStateStore::new();
        let (observer, target) = (EntityId::new(), EntityId::new());

        assert_eq!(
            store.set(observer, target, CoverSeverity::Lesser).await,
            CoverSeverity::None
        );
        assert_eq!(
            store.set(observer, target, CoverSeverity::Standard).await,
            CoverSeverity::Lesser
        );
        assert_eq!(store.get(observer, target).await, CoverSeverity::Standard);
    }

    #[tokio::test]
    async fn test_setting_none_removes_entry() {
        let store = CoverStateStore::new();
        let (observer, target) = (EntityId::new(), EntityId::new());
        store.set(observer, target, CoverSeverity::Standard).await;
        store.set(observer, target, CoverSeverity::None).await;

        assert_eq!(store.get(observer, target).await, CoverSeverity::None);
        assert!(store.targets_of(observer).await.is_empty());
        assert!(store.observers_of(target).await.is_empty());
    }

    #[tokio::test]
    async fn test_observers_of_target() {
        let store = CoverStateStore::new();
        let target = EntityId::new();
        let (a, b) = (EntityId::new(), EntityId::new());
        store.set(a, target, CoverSeverity::Lesser).await;
        store.set(b, target, CoverSeverity::Standard).await;
        store.set(a, EntityId::new(), CoverSeverity::Standard).await;

        let mut observers = store.observers_of(target).await;
        observers.sort();
        let mut expected = vec![(a, CoverSeverity::Lesser), (b, CoverSeverity::Standard)];
        expected.sort();
        assert_eq!(observers, expected);
    }

    #[tokio::test]
    async fn test_remove_entity_clears_both_roles() {
        let store = CoverStateStore::new();
        let (gone, other, third) = (EntityId::new(), EntityId::new(), EntityId::new());
        store.set(gone, other, CoverSeverity::Lesser).await;
        store.set(other, gone, CoverSeverity::Standard).await;
        store.set(other, third, CoverSeverity::Lesser).await;

        let mut removed = store.remove_entity(gone).await;
        removed.sort();
        let mut expected = vec![(gone, other), (other, gone)];
        expected.sort();
        assert_eq!(removed, expected);

        assert_eq!(store.get(gone, other).await, CoverSeverity::None);
        assert_eq!(store.get(other, gone).await, CoverSeverity::None);
        assert_eq!(store.get(other, third).await, CoverSeverity::Lesser);
    }
}
