//! Core type definitions used throughout the codebase

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a placed entity (a token on the scene)
///
/// This id is transient: the same actor may be placed, removed and placed
/// again under a new id. Use [`ActorSignature`] to follow an actor across
/// that churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of the actor behind an entity
///
/// Cover rules are keyed on this rather than on [`EntityId`] so they survive
/// an observer being re-placed on the scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorSignature(pub String);

impl ActorSignature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActorSignature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ActorSignature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ActorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creature size class, ordered from smallest to largest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SizeClass {
    Tiny = 0,
    Small = 1,
    Medium = 2,
    Large = 3,
    Huge = 4,
    Gargantuan = 5,
}

impl SizeClass {
    /// Position in the size ordering (tiny = 0)
    pub fn rank(self) -> i32 {
        self as i32
    }

    /// Parse a size key such as `"huge"` or the short forms `"sm"`, `"med"`, `"lg"`, `"grg"`
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "tiny" => Some(SizeClass::Tiny),
            "small" | "sm" => Some(SizeClass::Small),
            "medium" | "med" => Some(SizeClass::Medium),
            "large" | "lg" => Some(SizeClass::Large),
            "huge" => Some(SizeClass::Huge),
            "gargantuan" | "grg" => Some(SizeClass::Gargantuan),
            _ => None,
        }
    }

    /// Rank of an optional size, treating an unknown size as medium
    pub fn rank_or_medium(size: Option<SizeClass>) -> i32 {
        size.unwrap_or(SizeClass::Medium).rank()
    }
}

/// What kind of actor an entity represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Creature,
    Vehicle,
    Loot,
    Hazard,
    /// Furniture, statues and other props that never grant creature cover
    InertObject,
    /// Hazards with no physical body (auras, haunts)
    IncorporealHazard,
}

impl ActorType {
    /// Inert props and bodiless hazards never stand between combatants
    pub fn can_block(self) -> bool {
        !matches!(self, ActorType::InertObject | ActorType::IncorporealHazard)
    }
}

/// Side an entity fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alliance {
    Party,
    Opposition,
    #[default]
    Neutral,
}

impl Alliance {
    /// Two entities are allies when they share a non-neutral alliance
    pub fn is_allied_with(self, other: Alliance) -> bool {
        self == other && self != Alliance::Neutral
    }
}

/// How much a target is shielded from an observer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CoverSeverity {
    #[default]
    None,
    Lesser,
    Standard,
    /// Explicitly declared full cover; the geometric resolver never yields this
    Greater,
}

impl CoverSeverity {
    /// Severities that produce an aggregate, in ascending order
    pub const GRANTING: [CoverSeverity; 3] = [
        CoverSeverity::Lesser,
        CoverSeverity::Standard,
        CoverSeverity::Greater,
    ];

    /// Parse a severity key; anything unrecognised is `None`
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "lesser" => CoverSeverity::Lesser,
            "standard" => CoverSeverity::Standard,
            "greater" => CoverSeverity::Greater,
            _ => CoverSeverity::None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            CoverSeverity::None => "none",
            CoverSeverity::Lesser => "lesser",
            CoverSeverity::Standard => "standard",
            CoverSeverity::Greater => "greater",
        }
    }

    pub fn is_none(self) -> bool {
        self == CoverSeverity::None
    }

    /// Standard and greater cover also improve reflex saves and stealth
    pub fn grants_secondary_bonuses(self) -> bool {
        matches!(self, CoverSeverity::Standard | CoverSeverity::Greater)
    }

    /// Display label for the aggregate record of this severity
    pub fn label(self) -> &'static str {
        match self {
            CoverSeverity::None => "No Cover",
            CoverSeverity::Lesser => "Lesser Cover",
            CoverSeverity::Standard => "Standard Cover",
            CoverSeverity::Greater => "Greater Cover",
        }
    }
}

impl fmt::Display for CoverSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
