use thiserror::Error;

use crate::cover::aggregate::AggregateId;
use crate::core::types::EntityId;

#[derive(Error, Debug)]
pub enum CoverError {
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("No entity matches '{0}'")]
    UnknownEntity(String),

    #[error("Aggregate {aggregate:?} not found on target {target}")]
    AggregateNotFound {
        target: EntityId,
        aggregate: AggregateId,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl CoverError {
    /// The record a write was aimed at is already gone
    pub fn is_vanished(&self) -> bool {
        matches!(self, CoverError::AggregateNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoverError>;
