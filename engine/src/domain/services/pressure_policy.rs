//! Pressure Policy
//! Decides which services to pause or resume for a given memory pressure level

use crate::domain::entities::PersistedDaemonState;
use crate::domain::services::ServiceRegistry;
use crate::domain::value_objects::{PressureLevel, ServiceAction, ServiceStatus};

/// Actions for one resource tick.
///
/// Pauses shed the least important tier first; resumes restore the most
/// important first. Registry order breaks ties within a tier. The top tier and
/// external services never appear.
pub fn plan(
    level: PressureLevel,
    registry: &ServiceRegistry,
    state: &PersistedDaemonState,
) -> Vec<ServiceAction> {
    if let Some(floor) = level.pause_floor() {
        let mut victims: Vec<_> = registry
            .managed()
            .into_iter()
            .filter(|s| !s.is_top_tier() && s.priority() >= floor)
            .filter(|s| state.service(s.name()).status() == ServiceStatus::Running)
            .collect();
        victims.sort_by(|a, b| b.priority().cmp(&a.priority()));
        return victims
            .into_iter()
            .map(|s| ServiceAction::Pause(s.name().to_string()))
            .collect();
    }

    if level.should_resume() {
        let mut paused: Vec<_> = registry
            .managed()
            .into_iter()
            .filter(|s| state.paused_by_resource.contains(s.name()))
            .filter(|s| state.service(s.name()).status() == ServiceStatus::Paused)
            .collect();
        paused.sort_by_key(|s| s.priority());
        return paused
            .into_iter()
            .map(|s| ServiceAction::Resume(s.name().to_string()))
            .collect();
    }

    Vec::new()
}
