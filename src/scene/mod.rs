//! Scene model: the entities cover is computed between
//!
//! The host owns the real scene. This module defines the narrow typed view
//! the cover core needs, the provider traits the host implements, and an
//! in-memory scene for tools and tests.

pub mod entity;
pub mod loader;
pub mod memory;
pub mod provider;

pub use entity::{Entity, StatusFlags};
pub use loader::{load_scene, load_scene_from_json};
pub use memory::{Scene, VisibilityTable};
pub use provider::{SceneProvider, Visibility, VisibilityProvider};
