//! Domain Services
//! Business logic that orchestrates entities and ports

pub mod external_service_monitor;
pub mod pressure_policy;
pub mod process_supervisor;
pub mod resource_monitor;
pub mod scheduler_loop;
pub mod service_registry;
pub mod state_persistence;

pub use external_service_monitor::ExternalServiceMonitor;
pub use process_supervisor::{
    ActionOutcome, HealthVerdict, ProcessSupervisor, StartOutcome, StopOutcome,
};
pub use resource_monitor::{ResourceMonitor, ResourceSnapshot};
pub use scheduler_loop::{
    Cadence, HealthReport, SchedulerConfig, SchedulerLoop, StartupReport, TickReport,
};
pub use service_registry::ServiceRegistry;
pub use state_persistence::{Reconciliation, StatePersistence};
