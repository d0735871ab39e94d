//! Collaborator seams: where entities and visibility come from

use serde::{Deserialize, Serialize};

use crate::core::types::{ActorSignature, EntityId};
use crate::scene::entity::Entity;

/// How well an observer perceives another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Observed,
    Concealed,
    Hidden,
    Undetected,
}

/// Supplies the live set of placed entities
pub trait SceneProvider: Send + Sync {
    /// Snapshot of every placed entity, in no particular order
    fn entities(&self) -> Vec<Entity>;

    fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities().into_iter().find(|e| e.id == id)
    }

    /// Live entities whose actor carries `signature`
    fn entities_with_signature(&self, signature: &ActorSignature) -> Vec<Entity> {
        self.entities()
            .into_iter()
            .filter(|e| &e.signature == signature)
            .collect()
    }
}

/// Answers "how does `observer` perceive `subject`?"
pub trait VisibilityProvider: Send + Sync {
    fn visibility(&self, observer: &Entity, subject: &Entity) -> Visibility;
}
