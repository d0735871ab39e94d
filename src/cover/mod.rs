//! Cover: resolution, per-observer state and the derived aggregates

pub mod aggregate;
pub mod context;
pub mod eligibility;
pub mod engine;
pub mod events;
pub mod lock;
pub mod resolver;
pub mod service;
pub mod store;

pub use aggregate::{AggregateId, AggregateRepository, CoverAggregate, CoverRule, RuleKind};
pub use context::{AttackContext, AttackContexts, AttackId};
pub use eligibility::{eligible_blockers, exclusion_reason, Exclusion};
pub use engine::{AggregateEngine, TargetPhase};
pub use events::{CoverChanged, CoverEvents};
pub use lock::TargetLock;
pub use resolver::resolve_cover;
pub use service::{CoverService, RecordOptions};
pub use store::CoverStateStore;
