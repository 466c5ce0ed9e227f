//! RAM thresholds and pressure classification

use super::priority_tier::PriorityTier;
use crate::constants::thresholds::{
    DEFAULT_CRITICAL_GB, DEFAULT_LOW_GB, DEFAULT_MEDIUM_GB, DEFAULT_OK_GB,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Four ordered available-RAM thresholds in GB (critical < low < medium < ok)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RamThresholds {
    pub critical_gb: f64,
    pub low_gb: f64,
    pub medium_gb: f64,
    pub ok_gb: f64,
}

impl Default for RamThresholds {
    fn default() -> Self {
        Self {
            critical_gb: DEFAULT_CRITICAL_GB,
            low_gb: DEFAULT_LOW_GB,
            medium_gb: DEFAULT_MEDIUM_GB,
            ok_gb: DEFAULT_OK_GB,
        }
    }
}

impl RamThresholds {
    /// Raise the three pause thresholds by `margin_gb`. The resume threshold
    /// is left alone, so the hold band narrows and may close entirely; pausing
    /// is checked first when the two overlap.
    pub fn relaxed(&self, margin_gb: f64) -> Self {
        Self {
            critical_gb: self.critical_gb + margin_gb,
            low_gb: self.low_gb + margin_gb,
            medium_gb: self.medium_gb + margin_gb,
            ok_gb: self.ok_gb,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let ordered = [self.critical_gb, self.low_gb, self.medium_gb, self.ok_gb];
        if ordered.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("RAM thresholds must be finite and non-negative".to_string());
        }
        if !ordered.windows(2).all(|w| w[0] < w[1]) {
            return Err(format!(
                "RAM thresholds must be strictly increasing (critical {} < low {} < medium {} < ok {})",
                self.critical_gb, self.low_gb, self.medium_gb, self.ok_gb
            ));
        }
        Ok(())
    }

    /// Classify available RAM against the thresholds
    pub fn classify(&self, available_gb: f64) -> PressureLevel {
        if available_gb < self.critical_gb {
            PressureLevel::Critical
        } else if available_gb < self.low_gb {
            PressureLevel::Low
        } else if available_gb < self.medium_gb {
            PressureLevel::Medium
        } else if available_gb < self.ok_gb {
            PressureLevel::Hold
        } else {
            PressureLevel::Ok
        }
    }
}

/// Memory pressure, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    /// Below the critical threshold
    Critical,
    /// Below the low threshold
    Low,
    /// Below the medium threshold
    Medium,
    /// Between medium and ok: nothing changes
    Hold,
    /// At or above the ok threshold: resume
    Ok,
}

impl PressureLevel {
    /// Least important tier that stays running; every tier at or above the
    /// returned floor (numerically) must be paused
    pub fn pause_floor(&self) -> Option<PriorityTier> {
        match self {
            PressureLevel::Critical => Some(PriorityTier::High),
            PressureLevel::Low => Some(PriorityTier::Medium),
            PressureLevel::Medium => Some(PriorityTier::Low),
            PressureLevel::Hold | PressureLevel::Ok => None,
        }
    }

    pub fn should_resume(&self) -> bool {
        matches!(self, PressureLevel::Ok)
    }
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PressureLevel::Critical => write!(f, "critical"),
            PressureLevel::Low => write!(f, "low"),
            PressureLevel::Medium => write!(f, "medium"),
            PressureLevel::Hold => write!(f, "hold"),
            PressureLevel::Ok => write!(f, "ok"),
        }
    }
}
