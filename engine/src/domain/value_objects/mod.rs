//! Value Objects
//! Immutable types defined by their values

mod health_probe;
mod priority_tier;
mod ram_thresholds;
mod service_action;
mod service_status;

pub use health_probe::{HealthProbe, ProbeOutcome, ProbeType};
pub use priority_tier::PriorityTier;
pub use ram_thresholds::{PressureLevel, RamThresholds};
pub use service_action::ServiceAction;
pub use service_status::ServiceStatus;
