//! Host sampler backed by sysinfo

use crate::domain::ports::{HostSampler, MemoryReading};
use crate::domain::DomainError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sysinfo::System;
use tracing::warn;

pub struct SysinfoSampler {
    system: Arc<Mutex<System>>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostSampler for SysinfoSampler {
    async fn memory(&self) -> Result<MemoryReading, DomainError> {
        let system = Arc::clone(&self.system);
        let reading = tokio::task::spawn_blocking(move || {
            let mut sys = system.lock().unwrap_or_else(|p| p.into_inner());
            sys.refresh_memory();
            MemoryReading {
                total_bytes: sys.total_memory(),
                available_bytes: sys.available_memory(),
            }
        })
        .await
        .map_err(|e| DomainError::Sampling(e.to_string()))?;

        if reading.total_bytes == 0 {
            return Err(DomainError::Sampling(
                "host reported zero total memory".to_string(),
            ));
        }
        Ok(reading)
    }

    async fn cpu_percent(&self) -> f32 {
        let system = Arc::clone(&self.system);
        // Usage is a delta against the previous refresh; the first call reads 0
        let result = tokio::task::spawn_blocking(move || {
            let mut sys = system.lock().unwrap_or_else(|p| p.into_inner());
            sys.refresh_cpu_usage();
            sys.global_cpu_usage()
        })
        .await;

        match result {
            Ok(usage) => usage.clamp(0.0, 100.0),
            Err(e) => {
                warn!(error = %e, "CPU sampling failed");
                0.0
            }
        }
    }
}
