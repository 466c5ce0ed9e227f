//! ProbeRunner port
//! Interface for executing health probes

use crate::domain::value_objects::{HealthProbe, ProbeOutcome};
use async_trait::async_trait;
use std::time::Duration;

/// Port for running probes.
/// Never errors: every failure, including a timeout, is an outcome.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, probe: &HealthProbe, timeout: Duration) -> ProbeOutcome;
}
