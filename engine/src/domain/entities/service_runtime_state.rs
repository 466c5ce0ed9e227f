//! ServiceRuntimeState entity
//! Mutable per-service record; every mutation is persisted by StatePersistence

use crate::domain::value_objects::ServiceStatus;
use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRuntimeState {
    #[serde(default, deserialize_with = "ServiceStatus::deserialize_lenient")]
    status: ServiceStatus,

    #[serde(default, deserialize_with = "lenient_option")]
    pid: Option<u32>,

    #[serde(default, deserialize_with = "lenient_option")]
    last_health: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

/// A value of the wrong shape reads as absent instead of failing the whole file
pub(super) fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Valid(T),
        Invalid(IgnoredAny),
    }

    Ok(match Option::<Lenient<T>>::deserialize(deserializer)? {
        Some(Lenient::Valid(value)) => Some(value),
        Some(Lenient::Invalid(_)) | None => None,
    })
}

impl ServiceRuntimeState {
    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn last_health(&self) -> Option<DateTime<Utc>> {
        self.last_health
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.status == ServiceStatus::Running
    }

    fn transition(&mut self, service: &str, to: ServiceStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                service: service.to_string(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    // ===== Business Logic: State Transitions =====

    pub fn mark_starting(&mut self, service: &str) -> Result<(), DomainError> {
        self.transition(service, ServiceStatus::Starting)?;
        self.last_error = None;
        Ok(())
    }

    pub fn mark_running(&mut self, service: &str, pid: u32) -> Result<(), DomainError> {
        self.transition(service, ServiceStatus::Running)?;
        self.pid = Some(pid);
        Ok(())
    }

    pub fn mark_paused(&mut self, service: &str) -> Result<(), DomainError> {
        self.transition(service, ServiceStatus::Paused)
    }

    pub fn mark_resumed(&mut self, service: &str) -> Result<(), DomainError> {
        if self.status != ServiceStatus::Paused {
            return Err(DomainError::NotInState {
                service: service.to_string(),
                expected: ServiceStatus::Paused.to_string(),
            });
        }
        self.transition(service, ServiceStatus::Running)
    }

    pub fn mark_unhealthy(&mut self, service: &str, reason: &str) -> Result<(), DomainError> {
        self.transition(service, ServiceStatus::Unhealthy)?;
        self.last_error = Some(reason.to_string());
        Ok(())
    }

    /// Always legal; clears the tracked pid
    pub fn mark_stopped(&mut self) {
        self.status = ServiceStatus::Stopped;
        self.pid = None;
    }

    /// Stopped with a recorded failure
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.mark_stopped();
        self.last_error = Some(reason.into());
    }

    /// Adopt a live process found through the service's pid file
    pub fn adopt(&mut self, service: &str, pid: u32) -> Result<(), DomainError> {
        self.mark_starting(service)?;
        self.mark_running(service, pid)
    }

    pub fn record_health(&mut self, at: DateTime<Utc>) {
        self.last_health = Some(at);
    }

    pub fn record_error(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
    }
}
