//! Health probe value objects
//! Liveness/health probing for managed and external services

use crate::constants::probe::{DEFAULT_HEALTH_TIMEOUT_SEC, DEFAULT_HTTP_STATUS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Type of probe to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeType {
    #[default]
    Exec,
    Tcp,
    Http,
}

impl std::fmt::Display for ProbeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exec => write!(f, "exec"),
            Self::Tcp => write!(f, "tcp"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Probe configuration value object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProbe {
    pub probe_type: ProbeType,
    pub timeout: u64, // seconds before the probe counts as failed

    // Exec-specific fields
    pub exec_command: Option<String>,
    pub exec_args: Vec<String>,

    // TCP-specific fields
    pub tcp_host: Option<String>,
    pub tcp_port: Option<u16>,

    // HTTP-specific fields
    pub http_endpoint: Option<String>,
    pub http_expected_status: u16,
}

impl HealthProbe {
    fn empty(probe_type: ProbeType) -> Self {
        Self {
            probe_type,
            timeout: DEFAULT_HEALTH_TIMEOUT_SEC,
            exec_command: None,
            exec_args: Vec::new(),
            tcp_host: None,
            tcp_port: None,
            http_endpoint: None,
            http_expected_status: DEFAULT_HTTP_STATUS,
        }
    }

    /// Create an exec probe (exit code 0 = healthy)
    pub fn exec(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            exec_command: Some(command.into()),
            exec_args: args,
            ..Self::empty(ProbeType::Exec)
        }
    }

    /// Create a TCP connect probe
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            tcp_host: Some(host.into()),
            tcp_port: Some(port),
            ..Self::empty(ProbeType::Tcp)
        }
    }

    /// Create an HTTP status probe
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self {
            http_endpoint: Some(endpoint.into()),
            ..Self::empty(ProbeType::Http)
        }
    }

    /// Builder method to set timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the expected HTTP status
    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.http_expected_status = status;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Short human-readable target, used in logs
    pub fn target(&self) -> String {
        match self.probe_type {
            ProbeType::Exec => {
                let mut parts = vec![self.exec_command.clone().unwrap_or_default()];
                parts.extend(self.exec_args.iter().cloned());
                parts.join(" ")
            }
            ProbeType::Tcp => format!(
                "{}:{}",
                self.tcp_host.as_deref().unwrap_or("?"),
                self.tcp_port.unwrap_or(0)
            ),
            ProbeType::Http => self.http_endpoint.clone().unwrap_or_default(),
        }
    }

    /// Validate probe configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("Probe timeout must be greater than zero".to_string());
        }
        match self.probe_type {
            ProbeType::Exec => {
                if self
                    .exec_command
                    .as_deref()
                    .map_or(true, |c| c.trim().is_empty())
                {
                    return Err("Exec probe requires command".to_string());
                }
            }
            ProbeType::Tcp => {
                if self.tcp_host.is_none() {
                    return Err("TCP probe requires host".to_string());
                }
                if self.tcp_port.is_none() {
                    return Err("TCP probe requires port".to_string());
                }
            }
            ProbeType::Http => {
                if self.http_endpoint.is_none() {
                    return Err("HTTP probe requires endpoint".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Result of running a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Passed,
    Failed { exit_code: Option<i32> },
    TimedOut,
    Error(String),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Passed)
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed {
                exit_code: Some(code),
            } => write!(f, "failed (exit code {})", code),
            Self::Failed { exit_code: None } => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Error(e) => write!(f, "error: {}", e),
        }
    }
}
