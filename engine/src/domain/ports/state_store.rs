//! StateStore port
//! Durable replica of the daemon state

use crate::domain::entities::PersistedDaemonState;
use crate::domain::DomainError;
use async_trait::async_trait;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing was persisted yet.
    /// An unreadable file is `Err(DomainError::StateCorrupted)`.
    async fn load(&self) -> Result<Option<PersistedDaemonState>, DomainError>;

    /// Replace the stored state wholesale
    async fn save(&self, state: &PersistedDaemonState) -> Result<(), DomainError>;
}
