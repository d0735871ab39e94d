//! Load a scene from a JSON placement file
//!
//! ```json
//! { "entities": [
//!     { "name": "Valeros", "position": [0, 0], "size": "medium", "alliance": "party" },
//!     { "name": "Hill Giant", "position": [140, -20], "width": 0.2, "height": 0.4, "size": "huge" }
//! ] }
//! ```

use std::path::Path;

use glam::Vec2;
use serde::Deserialize;

use crate::core::error::Result;
use crate::core::types::{ActorSignature, ActorType, Alliance, EntityId, SizeClass};
use crate::scene::entity::{Entity, StatusFlags};
use crate::scene::memory::Scene;

#[derive(Debug, Deserialize)]
struct SceneFile {
    entities: Vec<EntityRecord>,
}

fn one() -> f32 {
    1.0
}

fn creature() -> ActorType {
    ActorType::Creature
}

fn alive() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct EntityRecord {
    #[serde(default)]
    id: Option<EntityId>,
    #[serde(default)]
    signature: Option<String>,
    name: String,
    position: [f32; 2],
    #[serde(default = "one")]
    width: f32,
    #[serde(default = "one")]
    height: f32,
    /// Free-form size key; unknown keys resolve as medium
    #[serde(default)]
    size: Option<String>,
    #[serde(default = "creature")]
    actor_type: ActorType,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    prone: bool,
    #[serde(default = "alive")]
    hit_points: i32,
    #[serde(default)]
    alliance: Alliance,
    #[serde(default)]
    ignores_cover: bool,
    #[serde(default)]
    controlled: bool,
}

impl From<EntityRecord> for Entity {
    fn from(record: EntityRecord) -> Self {
        let signature = record
            .signature
            .unwrap_or_else(|| record.name.to_lowercase());
        Entity {
            id: record.id.unwrap_or_default(),
            signature: ActorSignature::new(signature),
            name: record.name,
            position: Vec2::from(record.position),
            width: record.width,
            height: record.height,
            size: record.size.as_deref().and_then(SizeClass::from_key),
            actor_type: record.actor_type,
            flags: StatusFlags {
                hidden: record.hidden,
                prone: record.prone,
                hit_points: record.hit_points,
                alliance: record.alliance,
                ignores_cover: record.ignores_cover,
                controlled: record.controlled,
            },
        }
    }
}

/// Parse a scene from a JSON string
pub fn load_scene_from_json(json: &str) -> Result<Scene> {
    let file: SceneFile = serde_json::from_str(json)?;
    Ok(Scene::from_entities(file.entities.into_iter().map(Entity::from)))
}

/// Parse a scene from a JSON file on disk
pub fn load_scene(path: &Path) -> Result<Scene> {
    let content = std::fs::read_to_string(path)?;
    load_scene_from_json(&content)
}
