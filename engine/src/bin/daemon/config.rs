//! Daemon configuration from environment variables
//!
//! All configuration is read from environment variables with sensible defaults.
//! Service definitions live in the YAML services file.

use orchestrator_engine::constants::{cadence, paths};
use orchestrator_engine::infrastructure::config::{default_state_dir, expand_home};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Daemon configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Holds the pid file, state file and log
    pub state_dir: PathBuf,

    /// Services file path
    pub config_file: PathBuf,

    /// Log level
    pub log_level: String,

    pub resource_interval: Duration,

    pub health_interval: Duration,

    /// Notification command line; the message is appended
    pub notify_command: Option<String>,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let state_dir = env::var("ORCH_STATE_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand_home(&s))
            .unwrap_or_else(default_state_dir);
        let config_file = env::var("ORCH_CONFIG_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand_home(&s))
            .unwrap_or_else(|| state_dir.join(paths::CONFIG_FILE));

        Self {
            config_file,
            log_level: Self::parse_log_level(),
            resource_interval: Self::parse_secs(
                "ORCH_RESOURCE_INTERVAL_SEC",
                cadence::RESOURCE_CHECK_INTERVAL_SEC,
            ),
            health_interval: Self::parse_secs(
                "ORCH_HEALTH_INTERVAL_SEC",
                cadence::HEALTH_CHECK_INTERVAL_SEC,
            ),
            notify_command: env::var("ORCH_NOTIFY_COMMAND")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            state_dir,
        }
    }

    fn parse_secs(var_name: &str, default: u64) -> Duration {
        let secs = env::var(var_name)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(default);
        Duration::from_secs(secs)
    }

    fn parse_log_level() -> String {
        // Priority: ORCH_LOG_LEVEL > RUST_LOG > default
        env::var("ORCH_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join(paths::PID_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(paths::STATE_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join(paths::LOG_FILE)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.state_dir.as_os_str().is_empty() {
            return Err("ORCH_STATE_DIR cannot be empty".to_string());
        }
        if !self.config_file.exists() {
            return Err(format!(
                "Services file not found: {} (set ORCH_CONFIG_FILE)",
                self.config_file.display()
            ));
        }
        Ok(())
    }
}
