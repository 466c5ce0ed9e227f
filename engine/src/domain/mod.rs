pub mod entities;
pub mod error;
pub mod ports;
pub mod queries;
pub mod services;
pub mod value_objects;

pub use entities::{
    PersistedDaemonState, ServiceDescriptor, ServiceDescriptorBuilder, ServiceRuntimeState,
};
pub use error::{DomainError, Result};
pub use queries::{StatusQuery, StatusReport};
pub use services::{
    ActionOutcome, ExternalServiceMonitor, HealthVerdict, ProcessSupervisor,
    ResourceMonitor, ResourceSnapshot, SchedulerConfig, SchedulerLoop, ServiceRegistry,
    StartOutcome, StatePersistence, StopOutcome, TickReport,
};
pub use value_objects::{
    HealthProbe, PressureLevel, PriorityTier, ProbeOutcome, ProbeType, RamThresholds,
    ServiceAction, ServiceStatus,
};
