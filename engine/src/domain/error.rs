//! Domain-level errors
//! Expected failure paths (dead pid, failed probe) are outcome values, not errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // Registry errors
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    #[error("Service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("Service '{0}' is external and cannot be controlled")]
    ExternalService(String),

    // Lifecycle errors
    #[error("Failed to spawn service '{service}': {reason}")]
    SpawnFailed { service: String, reason: String },

    #[error("Service '{service}' needs {required_gb:.1}GB free RAM, only {available_gb:.1}GB available")]
    InsufficientMemory {
        service: String,
        required_gb: f64,
        available_gb: f64,
    },

    #[error("Service '{0}' is in the top priority tier and cannot be paused")]
    TopTierPause(String),

    #[error("Service '{service}' is not {expected}")]
    NotInState { service: String, expected: String },

    #[error("Invalid state transition for '{service}' from {from} to {to}")]
    InvalidStateTransition {
        service: String,
        from: String,
        to: String,
    },

    #[error("Failed to signal process {pid}: {reason}")]
    SignalFailed { pid: u32, reason: String },

    // Validation errors
    #[error("Invalid service name: {0}")]
    InvalidName(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to sample host resources: {0}")]
    Sampling(String),

    // Persistence errors
    #[error("State file is corrupted: {0}")]
    StateCorrupted(String),

    #[error("Failed to persist state: {0}")]
    Persistence(String),

    // Daemon errors
    #[error("Daemon already running (PID {0})")]
    DaemonAlreadyRunning(u32),
}

pub type Result<T> = std::result::Result<T, DomainError>;
