//! Shared test utilities for E2E tests
//!
//! Every test drives real `/bin/sh` and `sleep` processes through the engine's
//! Unix adapters, with the state file in a private temp directory.
//!
//! ## Test Isolation
//!
//! Tests in one binary run in parallel. Each test gives its processes a unique
//! marker (e.g. `sleep 7301`) so launch-signature sweeps in one test never match
//! processes owned by another.
//!
//! ## Usage Pattern
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn my_test() {
//!     let env = TestEnv::new();
//!     let registry = env.registry(vec![sh_service("svc", "sleep 7301")]);
//!     let mut supervisor = env.supervisor(registry).await;
//!     // ...
//! }
//! ```

use orchestrator_engine::domain::ports::{ProcessControl, StateStore};
use orchestrator_engine::domain::{ProcessSupervisor, ServiceDescriptor, StatePersistence};
use orchestrator_engine::infrastructure::{
    CommandProbeRunner, JsonStateStore, SysinfoSampler, UnixProcessControl,
};
use orchestrator_engine::ServiceRegistry;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Settle time used instead of the production default
pub const TEST_START_SETTLE: Duration = Duration::from_millis(300);

pub struct TestEnv {
    pub dir: TempDir,
    pub processes: Arc<UnixProcessControl>,
    pub probes: Arc<CommandProbeRunner>,
    pub sampler: Arc<SysinfoSampler>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            processes: Arc::new(UnixProcessControl::new()),
            probes: Arc::new(CommandProbeRunner::new()),
            sampler: Arc::new(SysinfoSampler::new()),
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::new(JsonStateStore::new(self.state_file()))
    }

    pub fn registry(&self, services: Vec<ServiceDescriptor>) -> Arc<ServiceRegistry> {
        Arc::new(ServiceRegistry::new(services).expect("Invalid registry"))
    }

    /// Load (and reconcile) the state file, then build a supervisor over it
    pub async fn supervisor(&self, registry: Arc<ServiceRegistry>) -> ProcessSupervisor {
        let mut persistence = StatePersistence::new(self.store());
        persistence
            .load(&registry, self.processes.as_ref())
            .await
            .expect("Failed to load state");

        ProcessSupervisor::new(
            registry,
            persistence,
            self.processes.clone(),
            self.probes.clone(),
            self.sampler.clone(),
        )
        .with_start_settle(TEST_START_SETTLE)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A managed service running `script` under `sh -c`, admitted regardless of host RAM
pub fn sh_service(name: &str, script: &str) -> ServiceDescriptor {
    sh_builder(name, script).build().expect("Invalid descriptor")
}

pub fn sh_builder(
    name: &str,
    script: &str,
) -> orchestrator_engine::domain::ServiceDescriptorBuilder {
    ServiceDescriptor::builder(name)
        .command(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
        .min_ram_gb(0.0)
        .stop_timeout(Duration::from_secs(2))
}

/// Poll `check` every 100 ms until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Scheduler state letter from /proc (`T` when stopped by a signal)
pub fn proc_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // The command name may contain spaces; the state follows the closing paren
    let after = &stat[stat.rfind(')')? + 1..];
    after.trim_start().chars().next()
}

/// Pids of live processes whose command line contains `marker`
pub async fn pids_matching(processes: &UnixProcessControl, marker: &str) -> Vec<u32> {
    processes
        .find_by_signature(marker)
        .await
        .into_iter()
        .map(|e| e.pid)
        .collect()
}

/// Kill anything left behind by a failed test
pub async fn kill_matching(processes: &UnixProcessControl, marker: &str) {
    for pid in pids_matching(processes, marker).await {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGKILL,
        );
    }
}
