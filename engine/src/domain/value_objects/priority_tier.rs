//! PriorityTier value object
//! Ordinal ranking where a lower number means stronger protection from pausing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Service priority (lower = more important)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    /// Top tier: never paused, started first, stopped last
    Critical = 1,
    High = 2,
    Medium = 3,
    #[default]
    Low = 4,
}

impl PriorityTier {
    /// All tiers, most important first
    pub const ALL: [PriorityTier; 4] = [
        PriorityTier::Critical,
        PriorityTier::High,
        PriorityTier::Medium,
        PriorityTier::Low,
    ];

    /// Numeric rank (1 = top tier)
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Whether this is the distinguished top tier
    pub fn is_top(&self) -> bool {
        matches!(self, PriorityTier::Critical)
    }

    /// Upper-case label used in status output
    pub fn label(&self) -> &'static str {
        match self {
            PriorityTier::Critical => "CRITICAL",
            PriorityTier::High => "HIGH",
            PriorityTier::Medium => "MEDIUM",
            PriorityTier::Low => "LOW",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityTier::Critical => write!(f, "critical"),
            PriorityTier::High => write!(f, "high"),
            PriorityTier::Medium => write!(f, "medium"),
            PriorityTier::Low => write!(f, "low"),
        }
    }
}

impl FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" | "1" => Ok(PriorityTier::Critical),
            "high" | "2" => Ok(PriorityTier::High),
            "medium" | "3" => Ok(PriorityTier::Medium),
            "low" | "4" => Ok(PriorityTier::Low),
            other => Err(format!(
                "Invalid priority '{}' (expected critical, high, medium or low)",
                other
            )),
        }
    }
}
