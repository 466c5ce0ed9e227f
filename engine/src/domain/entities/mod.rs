//! Domain Entities

mod persisted_state;
mod service_descriptor;
mod service_runtime_state;

pub use persisted_state::PersistedDaemonState;
pub use service_descriptor::{ServiceDescriptor, ServiceDescriptorBuilder};
pub use service_runtime_state::ServiceRuntimeState;
