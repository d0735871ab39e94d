pub mod config;
pub mod error;
pub mod types;

pub use config::{BlockerFilterConfig, CoverBonuses, CoverConfig, SeverityBonus, VisibilityPerspective};
pub use error::{CoverError, Result};
pub use types::{ActorSignature, ActorType, Alliance, CoverSeverity, EntityId, SizeClass};
