//! ServiceStatus value object
//! Represents the lifecycle state of a managed service

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The state of a service in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// No tracked process
    #[default]
    Stopped,

    /// Spawned, worker pid not resolved yet
    Starting,

    /// Tracked process alive and scheduled
    Running,

    /// Tracked process suspended with SIGSTOP
    Paused,

    /// Tracked process failed its health check
    Unhealthy,
}

impl ServiceStatus {
    /// Whether a tracked process is expected to exist
    pub fn has_process(&self) -> bool {
        !matches!(self, ServiceStatus::Stopped)
    }

    /// Validate state transition
    pub fn can_transition_to(&self, new_state: ServiceStatus) -> bool {
        use ServiceStatus::*;

        match (self, new_state) {
            (Stopped, Starting) => true,

            (Starting, Running) => true,
            (Starting, Stopped) => true, // Spawn failed or cancelled

            (Running, Paused) => true,
            (Running, Unhealthy) => true,
            (Running, Stopped) => true,

            (Paused, Running) => true,
            (Paused, Unhealthy) => true,
            (Paused, Stopped) => true,

            (Unhealthy, Stopped) => true,

            // Same state is always allowed
            (a, b) if *a == b => true,

            _ => false,
        }
    }

    /// Lenient deserializer for the state file: unknown or missing values read as stopped
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<ServiceStatus, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw
            .and_then(|s| s.parse::<ServiceStatus>().ok())
            .unwrap_or_default())
    }
}

impl std::str::FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stopped" => Ok(ServiceStatus::Stopped),
            "starting" => Ok(ServiceStatus::Starting),
            "running" => Ok(ServiceStatus::Running),
            "paused" => Ok(ServiceStatus::Paused),
            "unhealthy" => Ok(ServiceStatus::Unhealthy),
            other => Err(format!("Unknown service status '{}'", other)),
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Stopped => write!(f, "stopped"),
            ServiceStatus::Starting => write!(f, "starting"),
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::Paused => write!(f, "paused"),
            ServiceStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}
