//! Orchestrator Engine
//!
//! A library for running cooperating worker processes on a memory-constrained host:
//! - Priority tiers with a top tier that is never paused
//! - RAM-pressure driven pause/resume cascade (SIGSTOP/SIGCONT)
//! - Health probes with one-shot restart per failed check
//! - Crash recovery by reconciling the persisted state file against live pids

// Module declarations
pub mod constants;

// Core architecture modules
pub mod domain;
pub mod infrastructure;

// Re-export public types
pub use domain::{
    DomainError, HealthProbe, PriorityTier, ProcessSupervisor, ResourceSnapshot, Result,
    SchedulerLoop, ServiceAction, ServiceDescriptor, ServiceRegistry, ServiceStatus,
    StatePersistence, StatusReport,
};
