//! Status Query
//! One-call view of the daemon, host resources and every service

use crate::constants::memory::bytes_to_gb;
use crate::domain::ports::{ProcessControl, StateStore};
use crate::domain::services::{ResourceMonitor, ServiceRegistry, StatePersistence};
use crate::domain::value_objects::{PriorityTier, ServiceStatus};
use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub ram_total_gb: f64,
    pub ram_available_gb: f64,
    pub cpu_percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatusEntry {
    pub display_name: String,
    pub status: ServiceStatus,
    pub priority: PriorityTier,
    pub pid: Option<u32>,
    pub last_health: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Response of the status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub daemon: DaemonStatus,
    /// Absent when the host could not be sampled
    pub resources: Option<ResourceSummary>,
    /// Managed services, keyed by name
    pub services: BTreeMap<String, ServiceStatusEntry>,
    /// External service liveness
    pub external: BTreeMap<String, bool>,
    pub paused_by_resource: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Query to build a `StatusReport` from the state file and the live host
pub struct StatusQuery<'a> {
    pub registry: &'a ServiceRegistry,
    pub store: &'a dyn StateStore,
    pub processes: &'a dyn ProcessControl,
    pub monitor: &'a ResourceMonitor,
}

impl StatusQuery<'_> {
    /// `daemon_pid` is the pid of a live daemon, if any
    pub async fn execute(&self, daemon_pid: Option<u32>) -> Result<StatusReport, DomainError> {
        let state = StatePersistence::inspect(self.store, self.registry, self.processes).await?;

        let (resources, external) = match self.monitor.sample(self.registry).await {
            Ok(snapshot) => (
                Some(ResourceSummary {
                    ram_total_gb: bytes_to_gb(snapshot.total_bytes),
                    ram_available_gb: bytes_to_gb(snapshot.available_bytes),
                    cpu_percent: snapshot.cpu_percent,
                }),
                snapshot.external,
            ),
            Err(e) => {
                warn!(error = %e, "Status query could not sample resources");
                (None, BTreeMap::new())
            }
        };

        let services = self
            .registry
            .managed()
            .into_iter()
            .map(|descriptor| {
                let record = state.service(descriptor.name());
                (
                    descriptor.name().to_string(),
                    ServiceStatusEntry {
                        display_name: descriptor.display_name().to_string(),
                        status: record.status(),
                        priority: descriptor.priority(),
                        pid: record.pid(),
                        last_health: record.last_health(),
                        last_error: record.last_error().map(str::to_string),
                    },
                )
            })
            .collect();

        Ok(StatusReport {
            daemon: DaemonStatus {
                running: daemon_pid.is_some(),
                pid: daemon_pid,
            },
            resources,
            services,
            external,
            paused_by_resource: state.paused_by_resource.into_iter().collect(),
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{PersistedDaemonState, ServiceDescriptor};
    use crate::domain::ports::fakes::{
        FakeHostSampler, FakeProbeRunner, FakeProcessControl, InMemoryStateStore,
    };
    use crate::domain::value_objects::HealthProbe;
    use std::sync::Arc;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(vec![
            ServiceDescriptor::builder("brain")
                .display_name("Brain")
                .priority(PriorityTier::Critical)
                .command(vec!["/opt/brain/bin".into()])
                .build()
                .unwrap(),
            ServiceDescriptor::builder("y")
                .priority(PriorityTier::Medium)
                .command(vec!["/opt/y/bin".into()])
                .build()
                .unwrap(),
            ServiceDescriptor::builder("plex")
                .external(true)
                .health_probe(HealthProbe::tcp("127.0.0.1", 32400))
                .build()
                .unwrap(),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_dead_running_record_reported_stopped() {
        let processes = FakeProcessControl::new();
        let brain = processes.insert_process(None, "bin", "/opt/brain/bin");

        let mut saved = PersistedDaemonState::default();
        for (name, pid) in [("brain", brain), ("y", 4_000_000)] {
            let r = saved.service_mut(name);
            r.mark_starting(name).unwrap();
            r.mark_running(name, pid).unwrap();
        }
        let store = InMemoryStateStore::with_state(saved);
        let monitor = ResourceMonitor::new(
            Arc::new(FakeHostSampler::with_available_gb(6.0)),
            Arc::new(FakeProbeRunner::new()),
        );
        let registry = registry();

        let report = StatusQuery {
            registry: &registry,
            store: &store,
            processes: &processes,
            monitor: &monitor,
        }
        .execute(Some(42))
        .await
        .unwrap();

        assert_eq!(report.daemon, DaemonStatus { running: true, pid: Some(42) });
        assert_eq!(report.services["brain"].status, ServiceStatus::Running);
        assert_eq!(report.services["brain"].display_name, "Brain");
        assert_eq!(report.services["y"].status, ServiceStatus::Stopped);
        assert_eq!(report.services["y"].pid, None);
        assert!(!report.services.contains_key("plex"));
        assert_eq!(report.external.get("plex"), Some(&true));
        let resources = report.resources.unwrap();
        assert!((resources.ram_available_gb - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let processes = FakeProcessControl::new();
        let store = InMemoryStateStore::new();
        let sampler = Arc::new(FakeHostSampler::with_available_gb(6.0));
        sampler.fail_next(1);
        let monitor = ResourceMonitor::new(sampler, Arc::new(FakeProbeRunner::new()));
        let registry = registry();

        let report = StatusQuery {
            registry: &registry,
            store: &store,
            processes: &processes,
            monitor: &monitor,
        }
        .execute(None)
        .await
        .unwrap();

        assert!(report.resources.is_none());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["daemon"]["running"], false);
        assert_eq!(json["services"]["y"]["status"], "stopped");
        assert_eq!(json["services"]["brain"]["priority"], "critical");

        let back: StatusReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
