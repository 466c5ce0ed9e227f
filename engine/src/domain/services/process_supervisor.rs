//! Process Supervisor
//!
//! Starts, stops, pauses, resumes and health-checks the OS process tracked for
//! each managed service, persisting every resulting state change.
//!
//! - Services are spawned as leaders of their own process group, so the whole
//!   subtree can be terminated as one unit.
//! - The tracked pid is the real worker, resolved after a short settle delay,
//!   not the launcher that was spawned.
//! - Pause and resume signal the tracked pid only (SIGSTOP/SIGCONT). A paused
//!   process keeps its memory: pausing stops scheduling, and only relieves RAM
//!   pressure indirectly through paging.
//! - Outcomes are reported, never retried here. Retry and backoff belong to the
//!   scheduler loop.

use crate::constants::memory::bytes_to_gb;
use crate::constants::process::{EXIT_POLL_MS, ORPHAN_GRACE_SEC, START_SETTLE_MS};
use crate::domain::entities::ServiceDescriptor;
use crate::domain::ports::{HostSampler, LaunchSpec, ProbeRunner, ProcessControl, ProcessSignal};
use crate::domain::services::{ServiceRegistry, StatePersistence};
use crate::domain::value_objects::{HealthProbe, ProbeOutcome, ServiceAction, ServiceStatus};
use crate::domain::DomainError;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32, orphans_killed: usize },
    /// Already Running, Starting or Paused
    AlreadyRunning { pid: Option<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning { orphans_killed: usize },
    Stopped {
        pid: u32,
        /// SIGKILL was needed
        forced: bool,
        orphans_killed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    /// Only Running services are checked
    NotRunning,
    ProcessDead { pid: Option<u32> },
    ProbeFailed(ProbeOutcome),
}

impl HealthVerdict {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            HealthVerdict::ProcessDead { .. } | HealthVerdict::ProbeFailed(_)
        )
    }
}

/// Result of a dispatched `ServiceAction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Started(StartOutcome),
    Stopped(StopOutcome),
    Paused,
    Resumed,
    Health(HealthVerdict),
}

pub struct ProcessSupervisor {
    registry: Arc<ServiceRegistry>,
    persistence: StatePersistence,
    processes: Arc<dyn ProcessControl>,
    probes: Arc<dyn ProbeRunner>,
    sampler: Arc<dyn HostSampler>,
    start_settle: Duration,
}

impl ProcessSupervisor {
    /// `persistence` is expected to be loaded already
    pub fn new(
        registry: Arc<ServiceRegistry>,
        persistence: StatePersistence,
        processes: Arc<dyn ProcessControl>,
        probes: Arc<dyn ProbeRunner>,
        sampler: Arc<dyn HostSampler>,
    ) -> Self {
        Self {
            registry,
            persistence,
            processes,
            probes,
            sampler,
            start_settle: Duration::from_millis(START_SETTLE_MS),
        }
    }

    pub fn with_start_settle(mut self, settle: Duration) -> Self {
        self.start_settle = settle;
        self
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn persistence(&self) -> &StatePersistence {
        &self.persistence
    }

    pub fn status(&self, name: &str) -> ServiceStatus {
        self.persistence.status(name)
    }

    fn managed(&self, name: &str) -> Result<ServiceDescriptor, DomainError> {
        let descriptor = self.registry.get(name)?;
        if descriptor.is_external() {
            return Err(DomainError::ExternalService(name.to_string()));
        }
        Ok(descriptor.clone())
    }

    /// Dispatch an action
    pub async fn execute(&mut self, action: &ServiceAction) -> Result<ActionOutcome, DomainError> {
        match action {
            ServiceAction::Start(name) => self.start(name).await.map(ActionOutcome::Started),
            ServiceAction::Stop(name) => Ok(ActionOutcome::Stopped(self.stop(name).await)),
            ServiceAction::Pause(name) => self.pause(name).await.map(|_| ActionOutcome::Paused),
            ServiceAction::Resume(name) => self.resume(name).await.map(|_| ActionOutcome::Resumed),
            ServiceAction::HealthCheck(name) => {
                self.health_check(name).await.map(ActionOutcome::Health)
            }
        }
    }

    // ===== Start =====

    pub async fn start(&mut self, name: &str) -> Result<StartOutcome, DomainError> {
        let descriptor = self.managed(name)?;
        let record = self.persistence.service(name);

        match record.status() {
            ServiceStatus::Running | ServiceStatus::Starting | ServiceStatus::Paused => {
                debug!(service = %name, status = %record.status(), "Start requested, already active");
                return Ok(StartOutcome::AlreadyRunning { pid: record.pid() });
            }
            ServiceStatus::Unhealthy => {
                return Err(DomainError::InvalidStateTransition {
                    service: name.to_string(),
                    from: ServiceStatus::Unhealthy.to_string(),
                    to: ServiceStatus::Starting.to_string(),
                });
            }
            ServiceStatus::Stopped => {}
        }

        let available = self.sampler.memory().await?.available_bytes;
        if available < descriptor.min_ram_bytes() {
            let err = DomainError::InsufficientMemory {
                service: name.to_string(),
                required_gb: bytes_to_gb(descriptor.min_ram_bytes()),
                available_gb: bytes_to_gb(available),
            };
            warn!(service = %name, error = %err, "Start refused");
            let reason = err.to_string();
            self.persistence
                .update(name, |r| {
                    r.record_error(reason);
                    Ok(())
                })
                .await?;
            return Err(err);
        }

        let orphans_killed = self.sweep_orphans(&descriptor).await;

        self.persistence.update(name, |r| r.mark_starting(name)).await?;
        log_transition(name, ServiceStatus::Stopped, ServiceStatus::Starting, "start requested");

        let spec = LaunchSpec {
            service: name.to_string(),
            argv: descriptor.start_command().to_vec(),
            working_dir: descriptor.working_dir().map(|p| p.to_path_buf()),
            env_vars: descriptor
                .env()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        let leader = match self.processes.spawn(&spec).await {
            Ok(pid) => pid,
            Err(e) => {
                error!(service = %name, error = %e, "Failed to spawn service");
                self.fail_start(name, &e.to_string()).await?;
                return Err(e);
            }
        };
        info!(service = %name, pid = leader, command = ?spec.argv, "Spawned service");

        sleep(self.start_settle).await;

        let pid = self.resolve_worker(leader, &descriptor).await;
        if !self.processes.is_alive(pid).await {
            let reason = format!("process {} exited during startup", pid);
            error!(service = %name, pid = pid, "Service exited during startup");
            self.fail_start(name, &reason).await?;
            return Err(DomainError::SpawnFailed {
                service: name.to_string(),
                reason,
            });
        }

        if let Some(path) = descriptor.pid_file() {
            if let Err(e) = self.processes.write_pid_file(path, pid).await {
                warn!(service = %name, path = %path.display(), error = %e, "Failed to write pid file");
            }
        }

        self.persistence
            .update(name, |r| r.mark_running(name, pid))
            .await?;
        log_transition(name, ServiceStatus::Starting, ServiceStatus::Running, "worker resolved");
        if pid != leader {
            info!(service = %name, launcher = leader, worker = pid, "Tracking worker process");
        }

        Ok(StartOutcome::Started {
            pid,
            orphans_killed,
        })
    }

    async fn fail_start(&mut self, name: &str, reason: &str) -> Result<(), DomainError> {
        self.persistence
            .update(name, |r| {
                r.mark_failed(reason);
                Ok(())
            })
            .await?;
        log_transition(name, ServiceStatus::Starting, ServiceStatus::Stopped, reason);
        Ok(())
    }

    /// The worker hint if it matches a descendant, else the first childless
    /// descendant, else the spawned process itself
    async fn resolve_worker(&self, leader: u32, descriptor: &ServiceDescriptor) -> u32 {
        let descendants = self.processes.descendants(leader).await;
        if descendants.is_empty() {
            return leader;
        }

        if let Some(hint) = descriptor.worker_hint() {
            if let Some(entry) = descendants.iter().find(|e| e.name == hint) {
                return entry.pid;
            }
            debug!(service = %descriptor.name(), hint = %hint, "Worker hint matched no descendant");
        }

        let parents: BTreeSet<u32> = descendants.iter().filter_map(|e| e.parent).collect();
        descendants
            .iter()
            .find(|e| !parents.contains(&e.pid))
            .map(|e| e.pid)
            .unwrap_or(leader)
    }

    // ===== Stop =====

    /// Terminate the tracked subtree, escalating to SIGKILL after the grace
    /// period. Never fails: problems are logged and the record ends Stopped.
    pub async fn stop(&mut self, name: &str) -> StopOutcome {
        let descriptor = match self.managed(name) {
            Ok(d) => d,
            Err(e) => {
                warn!(service = %name, error = %e, "Stop ignored");
                return StopOutcome::NotRunning { orphans_killed: 0 };
            }
        };
        let record = self.persistence.service(name);

        let mut pid = record.pid();
        if pid.is_none() {
            if let Some(path) = descriptor.pid_file() {
                pid = self.processes.read_pid_file(path).await;
            }
        }
        let live_pid = match pid {
            Some(p) if self.processes.is_alive(p).await => Some(p),
            _ => None,
        };

        let mut forced = false;
        if let Some(pid) = live_pid {
            forced = self.terminate_tree(&descriptor, pid, record.status()).await;
        }

        let orphans_killed = self.sweep_orphans(&descriptor).await;

        if let Some(path) = descriptor.pid_file() {
            self.processes.remove_pid_file(path).await;
        }

        let from = record.status();
        let result = self
            .persistence
            .modify(|state| {
                state.service_mut(name).mark_stopped();
                state.paused_by_resource.remove(name);
                Ok(())
            })
            .await;
        if let Err(e) = result {
            error!(service = %name, error = %e, "Failed to persist stop");
        }
        if from != ServiceStatus::Stopped {
            log_transition(name, from, ServiceStatus::Stopped, "stop requested");
        }

        match live_pid {
            Some(pid) => StopOutcome::Stopped {
                pid,
                forced,
                orphans_killed,
            },
            None => StopOutcome::NotRunning { orphans_killed },
        }
    }

    /// Returns whether SIGKILL was needed
    async fn terminate_tree(
        &self,
        descriptor: &ServiceDescriptor,
        pid: u32,
        status: ServiceStatus,
    ) -> bool {
        let name = descriptor.name();

        // A suspended process only acts on SIGTERM once continued
        if status == ServiceStatus::Paused {
            let _ = self.processes.signal(pid, ProcessSignal::Continue).await;
        }

        if let Some(argv) = descriptor.stop_command() {
            if let Some((program, args)) = argv.split_first() {
                let probe = HealthProbe::exec(program.clone(), args.to_vec());
                let outcome = self.probes.run(&probe, descriptor.stop_timeout()).await;
                info!(service = %name, outcome = %outcome, "Ran stop command");
            }
        }

        let mut targets = vec![pid];
        targets.extend(self.processes.descendants(pid).await.iter().map(|e| e.pid));

        if let Err(e) = self.processes.signal_group(pid, ProcessSignal::Terminate).await {
            debug!(service = %name, pid = pid, error = %e, "Group terminate failed");
        }
        for target in &targets {
            let _ = self.processes.signal(*target, ProcessSignal::Terminate).await;
        }

        let survivors = self.wait_for_exit(&targets, descriptor.stop_timeout()).await;
        if survivors.is_empty() {
            info!(service = %name, pid = pid, "Service terminated gracefully");
            return false;
        }

        warn!(
            service = %name,
            pid = pid,
            survivors = ?survivors,
            "Grace period expired, sending SIGKILL"
        );
        let _ = self.processes.signal_group(pid, ProcessSignal::Kill).await;
        for target in &survivors {
            if let Err(e) = self.processes.signal(*target, ProcessSignal::Kill).await {
                error!(service = %name, pid = *target, error = %e, "Failed to kill process");
            }
        }
        true
    }

    /// Poll until every pid is gone or the grace period expires; returns survivors
    async fn wait_for_exit(&self, pids: &[u32], grace: Duration) -> Vec<u32> {
        let deadline = Instant::now() + grace;
        loop {
            let mut survivors = Vec::new();
            for pid in pids {
                if self.processes.is_alive(*pid).await {
                    survivors.push(*pid);
                }
            }
            if survivors.is_empty() || Instant::now() >= deadline {
                return survivors;
            }
            sleep(Duration::from_millis(EXIT_POLL_MS)).await;
        }
    }

    /// Pids tracked by the other registered services, with their subtrees
    async fn tracked_elsewhere(&self, name: &str) -> BTreeSet<u32> {
        let mut tracked = BTreeSet::new();
        for (other, record) in &self.persistence.state().services {
            if other == name || !self.registry.contains(other) {
                continue;
            }
            if let Some(pid) = record.pid() {
                tracked.insert(pid);
                tracked.extend(self.processes.descendants(pid).await.iter().map(|e| e.pid));
            }
        }
        tracked
    }

    /// Kill leftover processes matching the service's launch signature.
    /// Processes belonging to another service, including the launchers above
    /// its tracked worker, are never touched.
    async fn sweep_orphans(&self, descriptor: &ServiceDescriptor) -> usize {
        let tracked = self.tracked_elsewhere(descriptor.name()).await;
        let mut orphans = BTreeSet::new();
        for pattern in descriptor.launch_signature() {
            if pattern.trim().is_empty() {
                continue;
            }
            for entry in self.processes.find_by_signature(pattern).await {
                if tracked.contains(&entry.pid) || orphans.contains(&entry.pid) {
                    continue;
                }
                let subtree = self.processes.descendants(entry.pid).await;
                if subtree.iter().any(|e| tracked.contains(&e.pid)) {
                    debug!(
                        service = %descriptor.name(),
                        pid = entry.pid,
                        "Signature match is a launcher of another service, skipped"
                    );
                    continue;
                }
                orphans.insert(entry.pid);
            }
        }
        if orphans.is_empty() {
            return 0;
        }

        let pids: Vec<u32> = orphans.into_iter().collect();
        for pid in &pids {
            warn!(service = %descriptor.name(), pid = *pid, "Killing orphaned process");
            let _ = self.processes.signal(*pid, ProcessSignal::Terminate).await;
        }
        let survivors = self
            .wait_for_exit(&pids, Duration::from_secs(ORPHAN_GRACE_SEC))
            .await;
        for pid in survivors {
            let _ = self.processes.signal(pid, ProcessSignal::Kill).await;
        }
        pids.len()
    }

    // ===== Pause / Resume =====

    /// Suspend the tracked pid and record it in the resource-paused set
    pub async fn pause(&mut self, name: &str) -> Result<(), DomainError> {
        let descriptor = self.managed(name)?;
        if descriptor.is_top_tier() {
            return Err(DomainError::TopTierPause(name.to_string()));
        }
        let record = self.persistence.service(name);
        let pid = match (record.status(), record.pid()) {
            (ServiceStatus::Running, Some(pid)) => pid,
            _ => {
                return Err(DomainError::NotInState {
                    service: name.to_string(),
                    expected: ServiceStatus::Running.to_string(),
                })
            }
        };

        if !self.processes.signal(pid, ProcessSignal::Stop).await? {
            return Err(self.lost_process(name, pid).await);
        }

        self.persistence
            .modify(|state| {
                state.service_mut(name).mark_paused(name)?;
                state.paused_by_resource.insert(name.to_string());
                Ok(())
            })
            .await?;
        log_transition(name, ServiceStatus::Running, ServiceStatus::Paused, "memory pressure");
        Ok(())
    }

    pub async fn resume(&mut self, name: &str) -> Result<(), DomainError> {
        self.managed(name)?;
        let record = self.persistence.service(name);
        let pid = match (record.status(), record.pid()) {
            (ServiceStatus::Paused, Some(pid)) => pid,
            _ => {
                return Err(DomainError::NotInState {
                    service: name.to_string(),
                    expected: ServiceStatus::Paused.to_string(),
                })
            }
        };

        if !self.processes.signal(pid, ProcessSignal::Continue).await? {
            return Err(self.lost_process(name, pid).await);
        }

        self.persistence
            .modify(|state| {
                state.service_mut(name).mark_resumed(name)?;
                state.paused_by_resource.remove(name);
                Ok(())
            })
            .await?;
        log_transition(name, ServiceStatus::Paused, ServiceStatus::Running, "resumed");
        Ok(())
    }

    /// The tracked process vanished: record it Stopped and build the error
    async fn lost_process(&mut self, name: &str, pid: u32) -> DomainError {
        let reason = format!("process {} no longer exists", pid);
        let from = self.persistence.status(name);
        let persisted = self
            .persistence
            .modify(|state| {
                state.service_mut(name).mark_failed(reason.clone());
                state.paused_by_resource.remove(name);
                Ok(())
            })
            .await;
        log_transition(name, from, ServiceStatus::Stopped, &reason);
        match persisted {
            Err(e) => e,
            Ok(()) => DomainError::SignalFailed { pid, reason },
        }
    }

    // ===== Health =====

    /// Pid liveness plus the registered probe; any failure marks the service Unhealthy
    pub async fn health_check(&mut self, name: &str) -> Result<HealthVerdict, DomainError> {
        let descriptor = self.managed(name)?;
        let record = self.persistence.service(name);
        if record.status() != ServiceStatus::Running {
            return Ok(HealthVerdict::NotRunning);
        }

        let alive = match record.pid() {
            Some(pid) => self.processes.is_alive(pid).await,
            None => false,
        };
        if !alive {
            let reason = format!("process {:?} not running", record.pid());
            self.mark_unhealthy(name, &reason).await?;
            return Ok(HealthVerdict::ProcessDead { pid: record.pid() });
        }

        if let Some(probe) = descriptor.health_probe() {
            let outcome = self.probes.run(probe, probe.timeout_duration()).await;
            if !outcome.is_success() {
                let reason = format!("health probe {}: {}", probe.target(), outcome);
                self.mark_unhealthy(name, &reason).await?;
                return Ok(HealthVerdict::ProbeFailed(outcome));
            }
        }

        let now = Utc::now();
        self.persistence
            .update(name, |r| {
                r.record_health(now);
                Ok(())
            })
            .await?;
        debug!(service = %name, "Health check passed");
        Ok(HealthVerdict::Healthy)
    }

    async fn mark_unhealthy(&mut self, name: &str, reason: &str) -> Result<(), DomainError> {
        self.persistence
            .update(name, |r| r.mark_unhealthy(name, reason))
            .await?;
        warn!(service = %name, reason = %reason, "Health check failed");
        log_transition(name, ServiceStatus::Running, ServiceStatus::Unhealthy, reason);
        Ok(())
    }
}

fn log_transition(service: &str, from: ServiceStatus, to: ServiceStatus, reason: &str) {
    info!(service = %service, from = %from, to = %to, reason = %reason, "Service state changed");
}
