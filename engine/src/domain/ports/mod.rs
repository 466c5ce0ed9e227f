//! Ports (hexagonal architecture)
//! Interfaces the domain needs from the outside world

pub mod host_sampler;
pub mod notifier;
pub mod probe_runner;
pub mod process_control;
pub mod state_store;

#[cfg(test)]
pub mod fakes;

pub use host_sampler::{HostSampler, MemoryReading};
pub use notifier::Notifier;
pub use probe_runner::ProbeRunner;
pub use process_control::{LaunchSpec, ProcessControl, ProcessEntry, ProcessSignal};
pub use state_store::StateStore;
