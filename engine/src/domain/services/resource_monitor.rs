//! Resource Monitor
//! Samples host RAM, CPU and external-service liveness into a snapshot

use crate::constants::memory::bytes_to_gb;
use crate::domain::ports::{HostSampler, ProbeRunner};
use crate::domain::services::{ExternalServiceMonitor, ServiceRegistry};
use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Point-in-time host reading; regenerated every tick, never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub cpu_percent: f32,
    pub external: BTreeMap<String, bool>,
}

impl ResourceSnapshot {
    pub fn total_gb(&self) -> f64 {
        bytes_to_gb(self.total_bytes)
    }

    pub fn available_gb(&self) -> f64 {
        bytes_to_gb(self.available_bytes)
    }
}

pub struct ResourceMonitor {
    sampler: Arc<dyn HostSampler>,
    externals: ExternalServiceMonitor,
}

impl ResourceMonitor {
    pub fn new(sampler: Arc<dyn HostSampler>, probes: Arc<dyn ProbeRunner>) -> Self {
        Self {
            sampler,
            externals: ExternalServiceMonitor::new(probes),
        }
    }

    pub async fn sample(&self, registry: &ServiceRegistry) -> Result<ResourceSnapshot, DomainError> {
        let memory = self.sampler.memory().await?;
        let cpu_percent = self.sampler.cpu_percent().await;
        let external = self.externals.probe_all(registry).await;

        Ok(ResourceSnapshot {
            timestamp: Utc::now(),
            total_bytes: memory.total_bytes,
            available_bytes: memory.available_bytes,
            cpu_percent,
            external,
        })
    }

    /// RAM-only re-sample, used between resume steps and for admission checks
    pub async fn available_ram_gb(&self) -> Result<f64, DomainError> {
        Ok(bytes_to_gb(self.sampler.memory().await?.available_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ServiceDescriptor;
    use crate::domain::ports::fakes::{FakeHostSampler, FakeProbeRunner};
    use crate::domain::value_objects::HealthProbe;

    #[tokio::test]
    async fn test_sample_combines_memory_and_externals() {
        let registry = ServiceRegistry::new(vec![ServiceDescriptor::builder("plex")
            .external(true)
            .health_probe(HealthProbe::tcp("127.0.0.1", 32400))
            .build()
            .unwrap()])
        .unwrap();
        let sampler = Arc::new(FakeHostSampler::with_available_gb(3.0));
        let monitor = ResourceMonitor::new(sampler, Arc::new(FakeProbeRunner::new()));

        let snapshot = monitor.sample(&registry).await.unwrap();
        assert!((snapshot.available_gb() - 3.0).abs() < 1e-9);
        assert!((snapshot.total_gb() - 16.0).abs() < 1e-9);
        assert_eq!(snapshot.external.get("plex"), Some(&true));
    }

    #[tokio::test]
    async fn test_sampling_failure_propagates() {
        let sampler = Arc::new(FakeHostSampler::with_available_gb(3.0));
        sampler.fail_next(1);
        let monitor = ResourceMonitor::new(sampler, Arc::new(FakeProbeRunner::new()));

        assert!(matches!(
            monitor.available_ram_gb().await,
            Err(DomainError::Sampling(_))
        ));
        assert!(monitor.available_ram_gb().await.is_ok());
    }
}
