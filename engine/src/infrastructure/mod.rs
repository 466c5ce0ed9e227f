//! Infrastructure Layer
//!
//! This module contains the adapters that implement the ports defined in the domain layer.
//!
//! ## Adapters
//!
//! - `UnixProcessControl`: process groups and signals via nix, process table via sysinfo
//! - `CommandProbeRunner`: exec, TCP and HTTP probes
//! - `SysinfoSampler`: host RAM and CPU
//! - `JsonStateStore`: the persisted state file
//! - `CommandNotifier` / `LogNotifier`: operator notifications
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orchestrator_engine::infrastructure::{JsonStateStore, UnixProcessControl};
//! use std::sync::Arc;
//!
//! let processes = Arc::new(UnixProcessControl::new());
//! let store = Arc::new(JsonStateStore::new("/tmp/state.json"));
//!
//! // Wire into the supervisor...
//! ```

pub mod command_probe_runner;
pub mod config;
pub mod daemon_lock;
pub mod json_state_store;
pub mod notifier;
pub mod sysinfo_sampler;
pub mod unix_process_control;

pub use command_probe_runner::CommandProbeRunner;
pub use config::{
    default_state_dir, load_services_file, HealthCheckConfig,
    LoadedConfig, ServiceConfig, ServicesFile, ThresholdsConfig,
};
pub use daemon_lock::{read_live_daemon_pid, DaemonLock};
pub use json_state_store::JsonStateStore;
pub use notifier::{CommandNotifier, LogNotifier};
pub use sysinfo_sampler::SysinfoSampler;
pub use unix_process_control::UnixProcessControl;
