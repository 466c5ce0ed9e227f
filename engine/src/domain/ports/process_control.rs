//! ProcessControl port
//! Interface for spawning, signalling and inspecting OS processes

use crate::domain::DomainError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Configuration for launching a managed service
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub service: String,
    pub argv: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env_vars: Vec<(String, String)>,
}

/// Signals the supervisor sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
    /// SIGSTOP
    Stop,
    /// SIGCONT
    Continue,
}

impl std::fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminate => write!(f, "SIGTERM"),
            Self::Kill => write!(f, "SIGKILL"),
            Self::Stop => write!(f, "SIGSTOP"),
            Self::Continue => write!(f, "SIGCONT"),
        }
    }
}

/// A row of the host process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub parent: Option<u32>,
    pub name: String,
    pub cmdline: String,
}

/// Port for controlling system processes
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Spawn detached as the leader of a new process group; returns the leader pid
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32, DomainError>;

    /// Signal a single process. `Ok(false)` means it no longer exists
    async fn signal(&self, pid: u32, signal: ProcessSignal) -> Result<bool, DomainError>;

    /// Signal every member of the process group `pid` belongs to.
    /// `Ok(false)` means the group is gone
    async fn signal_group(&self, pid: u32, signal: ProcessSignal) -> Result<bool, DomainError>;

    /// Check if a process is still alive
    async fn is_alive(&self, pid: u32) -> bool;

    /// All live descendants of `pid`, parents before children
    async fn descendants(&self, pid: u32) -> Vec<ProcessEntry>;

    /// Live processes (other than this one) whose command line contains `pattern`
    async fn find_by_signature(&self, pattern: &str) -> Vec<ProcessEntry>;

    async fn write_pid_file(&self, path: &Path, pid: u32) -> Result<(), DomainError>;

    /// `None` when missing or unparsable
    async fn read_pid_file(&self, path: &Path) -> Option<u32>;

    async fn remove_pid_file(&self, path: &Path);
}
