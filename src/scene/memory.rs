//! In-memory scene and visibility table

use std::sync::{PoisonError, RwLock};

use ahash::AHashMap;

use crate::core::types::EntityId;
use crate::scene::entity::Entity;
use crate::scene::provider::{SceneProvider, Visibility, VisibilityProvider};

/// Storage for all placed entities
#[derive(Debug, Default)]
pub struct Scene {
    entities: RwLock<AHashMap<EntityId, Entity>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let scene = Self::new();
        for entity in entities {
            scene.insert(entity);
        }
        scene
    }

    /// Place an entity, replacing any previous one with the same id
    pub fn insert(&self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, entity);
        id
    }

    pub fn remove(&self, id: EntityId) -> Option<Entity> {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Mutate an entity in place; returns false if it is not on the scene
    pub fn update(&self, id: EntityId, f: impl FnOnce(&mut Entity)) -> bool {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        match entities.get_mut(&id) {
            Some(entity) => {
                f(entity);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SceneProvider for Scene {
    fn entities(&self) -> Vec<Entity> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

/// Explicit visibility overrides; unlisted pairs are observed
#[derive(Debug, Default)]
pub struct VisibilityTable {
    overrides: RwLock<AHashMap<(EntityId, EntityId), Visibility>>,
}

impl VisibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, observer: EntityId, subject: EntityId, visibility: Visibility) {
        let mut overrides = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        if visibility == Visibility::Observed {
            overrides.remove(&(observer, subject));
        } else {
            overrides.insert((observer, subject), visibility);
        }
    }

    pub fn get(&self, observer: EntityId, subject: EntityId) -> Visibility {
        self.overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(observer, subject))
            .copied()
            .unwrap_or_default()
    }
}

impl VisibilityProvider for VisibilityTable {
    fn visibility(&self, observer: &Entity, subject: &Entity) -> Visibility {
        self.get(observer.id, subject.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_insert_and_lookup() {
        let scene = Scene::new();
        let id = scene.insert(Entity::creature("Valeros", Vec2::ZERO));
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.entity(id).map(|e| e.name), Some("Valeros".to_string()));
    }

    #[test]
    fn test_update_and_remove() {
        let scene = Scene::new();
        let id = scene.insert(Entity::creature("Kyra", Vec2::ZERO));
        assert!(scene.update(id, |e| e.flags.prone = true));
        assert!(scene.entity(id).unwrap().flags.prone);

        assert!(scene.remove(id).is_some());
        assert!(scene.is_empty());
        assert!(!scene.update(id, |e| e.flags.prone = false));
    }

    #[test]
    fn test_entities_with_signature() {
        let first = Entity::creature("Wolf", Vec2::ZERO).with_signature("wolf-pack");
        let second = Entity::creature("Wolf", Vec2::new(100.0, 0.0)).with_signature("wolf-pack");
        let other = Entity::creature("Bear", Vec2::new(200.0, 0.0));
        let scene = Scene::from_entities([first, second, other]);

        let wolves = scene.entities_with_signature(&"wolf-pack".into());
        assert_eq!(wolves.len(), 2);
    }

    #[test]
    fn test_visibility_defaults_to_observed() {
        let table = VisibilityTable::new();
        let a = EntityId::new();
        let b = EntityId::new();
        assert_eq!(table.get(a, b), Visibility::Observed);

        table.set(a, b, Visibility::Undetected);
        assert_eq!(table.get(a, b), Visibility::Undetected);
        assert_eq!(table.get(b, a), Visibility::Observed);

        table.set(a, b, Visibility::Observed);
        assert_eq!(table.get(a, b), Visibility::Observed);
    }
}
