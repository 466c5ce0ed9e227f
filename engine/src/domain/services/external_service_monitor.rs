//! External Service Monitor
//! Read-only liveness probing for co-resident processes this daemon does not own

use crate::constants::probe::EXTERNAL_PROBE_TIMEOUT_SEC;
use crate::domain::ports::ProbeRunner;
use crate::domain::services::ServiceRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ExternalServiceMonitor {
    probes: Arc<dyn ProbeRunner>,
    timeout: Duration,
}

impl ExternalServiceMonitor {
    pub fn new(probes: Arc<dyn ProbeRunner>) -> Self {
        Self {
            probes,
            timeout: Duration::from_secs(EXTERNAL_PROBE_TIMEOUT_SEC),
        }
    }

    /// Liveness of every external service; a failed or timed-out probe reads as down
    pub async fn probe_all(&self, registry: &ServiceRegistry) -> BTreeMap<String, bool> {
        let mut liveness = BTreeMap::new();
        for service in registry.external() {
            let alive = match service.health_probe() {
                Some(probe) => {
                    let outcome = self.probes.run(probe, self.timeout).await;
                    debug!(service = %service.name(), outcome = %outcome, "External service probed");
                    outcome.is_success()
                }
                None => false,
            };
            liveness.insert(service.name().to_string(), alive);
        }
        liveness
    }

    /// Whether any alive external service is flagged memory-hungry
    pub fn memory_hungry_alive(
        registry: &ServiceRegistry,
        liveness: &BTreeMap<String, bool>,
    ) -> Vec<String> {
        registry
            .external()
            .into_iter()
            .filter(|s| s.is_memory_hungry() && liveness.get(s.name()).copied().unwrap_or(false))
            .map(|s| s.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ServiceDescriptor;
    use crate::domain::ports::fakes::FakeProbeRunner;
    use crate::domain::value_objects::{HealthProbe, ProbeOutcome};

    fn external(name: &str, hungry: bool) -> ServiceDescriptor {
        ServiceDescriptor::builder(name)
            .external(true)
            .memory_hungry(hungry)
            .health_probe(HealthProbe::exec("pgrep", vec![name.to_string()]))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_probe_failures_read_as_down() {
        let registry = ServiceRegistry::new(vec![
            external("plex", true),
            external("backup", false),
            external("indexer", true),
        ])
        .unwrap();
        let runner = Arc::new(FakeProbeRunner::new());
        runner.set_outcome(
            registry.get("backup").unwrap().health_probe().unwrap(),
            ProbeOutcome::TimedOut,
        );
        runner.set_outcome(
            registry.get("indexer").unwrap().health_probe().unwrap(),
            ProbeOutcome::Failed { exit_code: Some(1) },
        );

        let monitor = ExternalServiceMonitor::new(runner.clone());
        let liveness = monitor.probe_all(&registry).await;

        assert_eq!(liveness.get("plex"), Some(&true));
        assert_eq!(liveness.get("backup"), Some(&false));
        assert_eq!(liveness.get("indexer"), Some(&false));
        assert!(runner
            .calls()
            .iter()
            .all(|(_, timeout)| *timeout == Duration::from_secs(5)));

        assert_eq!(
            ExternalServiceMonitor::memory_hungry_alive(&registry, &liveness),
            vec!["plex".to_string()]
        );
    }
}
