//! Cover configuration with documented defaults
//!
//! Every option the cover core recognises lives on [`CoverConfig`]. The host
//! builds one (usually from a TOML file), it is validated once at the
//! boundary, and then passed by reference through the call chain.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{CoverError, Result};
use crate::core::types::{CoverSeverity, EntityId};

/// Whose eyes decide whether a candidate blocker is undetected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityPerspective {
    #[default]
    Attacker,
    Target,
    /// A specific third entity, e.g. the acting user's own token
    Observer(EntityId),
}

/// Options controlling which entities may act as cover blockers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockerFilterConfig {
    /// Honour the per-entity "exempt from cover" flag
    pub respect_ignore_flag: bool,

    /// Skip blockers the perspective entity cannot detect at all
    pub ignore_undetected_blockers: bool,

    /// Skip blockers with zero effective hit points
    pub ignore_dead_blockers: bool,

    /// Let prone creatures still grant cover
    ///
    /// A prone body rarely blocks a shot, so this is off by default.
    pub allow_prone_blockers: bool,

    /// Skip blockers allied with the attacker
    pub ignore_ally_blockers: bool,

    /// Perspective used for the undetected check
    pub visibility_perspective: VisibilityPerspective,
}

impl Default for BlockerFilterConfig {
    fn default() -> Self {
        Self {
            respect_ignore_flag: true,
            ignore_undetected_blockers: false,
            ignore_dead_blockers: true,
            allow_prone_blockers: false,
            ignore_ally_blockers: false,
            visibility_perspective: VisibilityPerspective::Attacker,
        }
    }
}

/// Bonus magnitudes granted by one cover severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBonus {
    pub ac: i32,
    pub reflex: i32,
    pub stealth: i32,
}

impl SeverityBonus {
    pub const fn new(ac: i32, reflex: i32, stealth: i32) -> Self {
        Self { ac, reflex, stealth }
    }
}

/// Per-severity bonus table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverBonuses {
    pub lesser: SeverityBonus,
    pub standard: SeverityBonus,
    pub greater: SeverityBonus,
}

impl Default for CoverBonuses {
    fn default() -> Self {
        Self {
            lesser: SeverityBonus::new(1, 0, 0),
            standard: SeverityBonus::new(2, 2, 2),
            greater: SeverityBonus::new(4, 4, 4),
        }
    }
}

impl CoverBonuses {
    /// Bonuses for a severity; `None` grants nothing
    pub fn for_severity(&self, severity: CoverSeverity) -> SeverityBonus {
        match severity {
            CoverSeverity::None => SeverityBonus::default(),
            CoverSeverity::Lesser => self.lesser,
            CoverSeverity::Standard => self.standard,
            CoverSeverity::Greater => self.greater,
        }
    }

    pub fn ac(&self, severity: CoverSeverity) -> i32 {
        self.for_severity(severity).ac
    }
}

/// Configuration for the cover systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Blocker eligibility options
    pub blockers: BlockerFilterConfig,

    /// World units per grid unit
    ///
    /// Entity footprints are stored in grid units; multiplying by this gives
    /// the rectangle the geometry kernel works with.
    pub grid_size: f32,

    /// Bonus magnitudes per severity
    pub bonuses: CoverBonuses,

    /// How long an attack context survives without being completed (milliseconds)
    pub context_ttl_ms: u64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            blockers: BlockerFilterConfig::default(),
            grid_size: 100.0,
            bonuses: CoverBonuses::default(),
            context_ttl_ms: 5_000,
        }
    }
}

impl CoverConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CoverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !self.grid_size.is_finite() || self.grid_size <= 0.0 {
            return Err(CoverError::InvalidConfig(format!(
                "grid_size ({}) must be a positive number",
                self.grid_size
            )));
        }

        // AC bonus must rise strictly with severity: none(0) < lesser < standard < greater
        let mut previous = (CoverSeverity::None, 0);
        for severity in CoverSeverity::GRANTING {
            let ac = self.bonuses.ac(severity);
            if ac <= previous.1 {
                return Err(CoverError::InvalidConfig(format!(
                    "{} cover AC bonus ({}) must exceed {} cover AC bonus ({})",
                    severity, ac, previous.0, previous.1
                )));
            }
            previous = (severity, ac);
        }

        let negative = CoverSeverity::GRANTING.iter().any(|s| {
            let bonus = self.bonuses.for_severity(*s);
            bonus.reflex < 0 || bonus.stealth < 0
        });
        if negative {
            return Err(CoverError::InvalidConfig(
                "reflex and stealth bonuses must not be negative".into(),
            ));
        }

        Ok(())
    }
}
