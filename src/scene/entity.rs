//! Typed view of a placed scene actor
//!
//! Only the fields the cover core reads are modelled here; the host keeps
//! the rest of its object model to itself.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{ActorSignature, ActorType, Alliance, EntityId, SizeClass};
use crate::spatial::Rect;

/// Mutable status of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusFlags {
    /// Hidden from the scene entirely (GM-only token)
    pub hidden: bool,
    pub prone: bool,
    /// Effective hit points; zero or less counts as dead
    pub hit_points: i32,
    pub alliance: Alliance,
    /// Explicitly exempt from ever granting cover
    pub ignores_cover: bool,
    /// Currently selected or controlled by the acting user
    pub controlled: bool,
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self {
            hidden: false,
            prone: false,
            hit_points: 1,
            alliance: Alliance::Neutral,
            ignores_cover: false,
            controlled: false,
        }
    }
}

/// A placed, rectangular scene actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub signature: ActorSignature,
    pub name: String,
    /// Top-left corner in world units
    pub position: Vec2,
    /// Footprint width in grid units
    pub width: f32,
    /// Footprint height in grid units
    pub height: f32,
    /// `None` when the host reported a size this core does not know
    pub size: Option<SizeClass>,
    pub actor_type: ActorType,
    pub flags: StatusFlags,
}

impl Entity {
    /// A one-square medium creature at `position`
    pub fn creature(name: impl Into<String>, position: Vec2) -> Self {
        let name = name.into();
        Self {
            id: EntityId::new(),
            signature: ActorSignature::new(name.to_lowercase()),
            name,
            position,
            width: 1.0,
            height: 1.0,
            size: Some(SizeClass::Medium),
            actor_type: ActorType::Creature,
            flags: StatusFlags::default(),
        }
    }

    pub fn with_size(mut self, size: SizeClass) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_footprint(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = ActorSignature::new(signature);
        self
    }

    pub fn with_actor_type(mut self, actor_type: ActorType) -> Self {
        self.actor_type = actor_type;
        self
    }

    pub fn with_alliance(mut self, alliance: Alliance) -> Self {
        self.flags.alliance = alliance;
        self
    }

    /// World-space rectangle, or `None` if the geometry is malformed
    pub fn world_rect(&self, grid_size: f32) -> Option<Rect> {
        Rect::from_origin_size(self.position, self.width * grid_size, self.height * grid_size)
    }

    pub fn center(&self, grid_size: f32) -> Option<Vec2> {
        self.world_rect(grid_size).map(|rect| rect.center())
    }

    /// Size rank with unknown sizes treated as medium
    pub fn size_rank(&self) -> i32 {
        SizeClass::rank_or_medium(self.size)
    }

    pub fn is_dead(&self) -> bool {
        self.flags.hit_points <= 0
    }
}
