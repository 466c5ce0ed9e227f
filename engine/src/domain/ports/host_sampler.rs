//! HostSampler port

use crate::domain::DomainError;
use async_trait::async_trait;

/// Host memory reading in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[async_trait]
pub trait HostSampler: Send + Sync {
    async fn memory(&self) -> Result<MemoryReading, DomainError>;

    /// Global CPU load in percent (0-100)
    async fn cpu_percent(&self) -> f32;
}
