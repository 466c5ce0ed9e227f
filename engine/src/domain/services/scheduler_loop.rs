//! Scheduler Loop
//!
//! The control algorithm. Two independently timed passes share one task:
//! - resource pass (default every 30s): sample RAM and external liveness,
//!   classify pressure, pause or resume services accordingly
//! - health pass (default every 60s): probe every Running service with
//!   auto-restart enabled and run one stop+start cycle per failure
//!
//! The loop owns the supervisor, so all state mutation happens on this task.

use crate::constants::cadence::{
    ERROR_BACKOFF_SEC, HEALTH_CHECK_INTERVAL_SEC, LOOP_POLL_INTERVAL_SEC,
    REPEATED_ERROR_THRESHOLD, RESOURCE_CHECK_INTERVAL_SEC,
};
use crate::constants::process::{RESTART_SETTLE_SEC, STARTUP_SETTLE_SEC};
use crate::constants::thresholds::DEFAULT_EXTERNAL_MARGIN_GB;
use crate::domain::ports::Notifier;
use crate::domain::services::{
    pressure_policy, ExternalServiceMonitor, ProcessSupervisor, ResourceMonitor, ResourceSnapshot,
    ServiceRegistry,
};
use crate::domain::value_objects::{PressureLevel, RamThresholds, ServiceAction};
use crate::domain::DomainError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing and threshold settings of the loop
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub thresholds: RamThresholds,
    /// Added to every threshold while a memory-hungry external service is alive
    pub external_margin_gb: f64,
    pub resource_interval: Duration,
    pub health_interval: Duration,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub startup_settle: Duration,
    pub restart_settle: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thresholds: RamThresholds::default(),
            external_margin_gb: DEFAULT_EXTERNAL_MARGIN_GB,
            resource_interval: Duration::from_secs(RESOURCE_CHECK_INTERVAL_SEC),
            health_interval: Duration::from_secs(HEALTH_CHECK_INTERVAL_SEC),
            poll_interval: Duration::from_secs(LOOP_POLL_INTERVAL_SEC),
            error_backoff: Duration::from_secs(ERROR_BACKOFF_SEC),
            startup_settle: Duration::from_secs(STARTUP_SETTLE_SEC),
            restart_settle: Duration::from_secs(RESTART_SETTLE_SEC),
        }
    }
}

/// Fixed-interval schedule on the monotonic clock; due immediately when created
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval: Duration,
    last_run: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_run = Some(now);
    }
}

/// What one resource pass observed and did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub snapshot: ResourceSnapshot,
    pub level: PressureLevel,
    /// Thresholds actually compared against
    pub thresholds: RamThresholds,
    pub margin_applied: bool,
    /// Alive memory-hungry external services that triggered the margin
    pub hungry_externals: Vec<String>,
    pub paused: Vec<String>,
    pub resumed: Vec<String>,
    pub failures: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
    pub checked: Vec<String>,
    pub restarted: Vec<String>,
    pub failures: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartupReport {
    pub started: Vec<String>,
    pub failures: Vec<(String, String)>,
}

pub struct SchedulerLoop {
    supervisor: ProcessSupervisor,
    monitor: ResourceMonitor,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
    resource_cadence: Cadence,
    health_cadence: Cadence,
    consecutive_errors: u32,
}

impl SchedulerLoop {
    pub fn new(
        supervisor: ProcessSupervisor,
        monitor: ResourceMonitor,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            resource_cadence: Cadence::new(config.resource_interval),
            health_cadence: Cadence::new(config.health_interval),
            supervisor,
            monitor,
            notifier,
            config,
            consecutive_errors: 0,
        }
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut ProcessSupervisor {
        &mut self.supervisor
    }

    fn registry(&self) -> Arc<ServiceRegistry> {
        Arc::clone(self.supervisor.registry())
    }

    /// Start every top-tier service in registry order, then autostart services
    /// in priority order
    pub async fn startup(&mut self) -> StartupReport {
        let registry = self.registry();
        let mut report = StartupReport::default();

        let top: Vec<_> = registry
            .managed()
            .into_iter()
            .filter(|s| s.is_top_tier())
            .collect();
        for (i, service) in top.iter().enumerate() {
            if i > 0 {
                sleep(self.config.startup_settle).await;
            }
            self.start_for_startup(service.name(), &mut report).await;
        }

        let mut rest: Vec<_> = registry
            .managed()
            .into_iter()
            .filter(|s| !s.is_top_tier() && s.autostart())
            .collect();
        rest.sort_by_key(|s| s.priority());
        for service in rest {
            self.start_for_startup(service.name(), &mut report).await;
        }

        info!(
            started = report.started.len(),
            failed = report.failures.len(),
            "Startup complete"
        );
        report
    }

    async fn start_for_startup(&mut self, name: &str, report: &mut StartupReport) {
        match self.supervisor.start(name).await {
            Ok(_) => report.started.push(name.to_string()),
            Err(e) => {
                error!(service = %name, error = %e, "Failed to start service");
                self.notifier
                    .notify("Service failed to start", &format!("{}: {}", name, e))
                    .await;
                report.failures.push((name.to_string(), e.to_string()));
            }
        }
    }

    // ===== Resource pass =====

    pub async fn resource_tick(&mut self) -> Result<TickReport, DomainError> {
        let registry = self.registry();
        let snapshot = self.monitor.sample(&registry).await?;

        let hungry_externals =
            ExternalServiceMonitor::memory_hungry_alive(&registry, &snapshot.external);
        let margin_applied = !hungry_externals.is_empty();
        let thresholds = if margin_applied {
            self.config.thresholds.relaxed(self.config.external_margin_gb)
        } else {
            self.config.thresholds
        };

        let available_gb = snapshot.available_gb();
        let level = thresholds.classify(available_gb);
        let margin_gb = if margin_applied {
            self.config.external_margin_gb
        } else {
            0.0
        };
        info!(
            available_gb = available_gb,
            total_gb = snapshot.total_gb(),
            cpu_percent = snapshot.cpu_percent,
            level = %level,
            margin_applied = margin_applied,
            margin_gb = margin_gb,
            hungry_externals = ?hungry_externals,
            "Resource check"
        );

        let mut report = TickReport {
            snapshot,
            level,
            thresholds,
            margin_applied,
            hungry_externals,
            paused: Vec::new(),
            resumed: Vec::new(),
            failures: Vec::new(),
        };

        let actions = pressure_policy::plan(level, &registry, self.supervisor.persistence().state());
        for (i, action) in actions.iter().enumerate() {
            if let ServiceAction::Resume(_) = action {
                if i > 0 {
                    let now_gb = self.monitor.available_ram_gb().await?;
                    if !thresholds.classify(now_gb).should_resume() {
                        info!(
                            available_gb = now_gb,
                            "RAM dropped below ok threshold, holding remaining resumes"
                        );
                        break;
                    }
                }
            }

            match self.supervisor.execute(action).await {
                Ok(_) => match action {
                    ServiceAction::Pause(name) => report.paused.push(name.clone()),
                    ServiceAction::Resume(name) => report.resumed.push(name.clone()),
                    _ => {}
                },
                Err(e @ DomainError::Persistence(_)) => return Err(e),
                Err(e) => {
                    warn!(action = %action, error = %e, "Scheduler action failed");
                    report.failures.push((action.name().to_string(), e.to_string()));
                }
            }
        }

        if !report.paused.is_empty() {
            let message = format!(
                "Paused {} ({:.1}GB available, level {})",
                report.paused.join(", "),
                available_gb,
                level
            );
            warn!(paused = ?report.paused, level = %level, "Memory pressure");
            self.notifier.notify("Memory pressure", &message).await;
        }
        if !report.resumed.is_empty() {
            info!(resumed = ?report.resumed, "Memory recovered");
        }

        Ok(report)
    }

    // ===== Health pass =====

    pub async fn health_tick(&mut self) -> Result<HealthReport, DomainError> {
        let registry = self.registry();
        let mut report = HealthReport::default();

        let candidates: Vec<String> = registry
            .managed()
            .into_iter()
            .filter(|s| s.auto_restart())
            .filter(|s| self.supervisor.persistence().service(s.name()).is_running())
            .map(|s| s.name().to_string())
            .collect();

        for name in candidates {
            report.checked.push(name.clone());
            let verdict = match self.supervisor.health_check(&name).await {
                Ok(v) => v,
                Err(e @ DomainError::Persistence(_)) => return Err(e),
                Err(e) => {
                    report.failures.push((name.clone(), e.to_string()));
                    continue;
                }
            };
            if !verdict.is_failure() {
                continue;
            }

            warn!(service = %name, verdict = ?verdict, "Restarting unhealthy service");
            self.notifier
                .notify("Service unhealthy", &format!("{} failed its health check, restarting", name))
                .await;

            self.supervisor.stop(&name).await;
            sleep(self.config.restart_settle).await;
            match self.supervisor.start(&name).await {
                Ok(_) => report.restarted.push(name),
                Err(e @ DomainError::Persistence(_)) => return Err(e),
                Err(e) => {
                    error!(service = %name, error = %e, "Restart failed");
                    report.failures.push((name, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    // ===== Loop =====

    /// Run whichever passes are due
    pub async fn run_once(&mut self) -> Result<(), DomainError> {
        let now = Instant::now();
        if self.resource_cadence.is_due(now) {
            self.resource_cadence.mark(now);
            self.resource_tick().await?;
        }
        if self.health_cadence.is_due(now) {
            self.health_cadence.mark(now);
            self.health_tick().await?;
        }
        Ok(())
    }

    /// Drive both passes until `cancel` fires, then stop every managed service.
    /// Cancellation interrupts an in-progress pass.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!("Scheduler loop started");
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.run_once() => outcome,
            };

            let wait = match outcome {
                Ok(()) => {
                    self.consecutive_errors = 0;
                    self.config.poll_interval
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    error!(
                        error = %e,
                        consecutive = self.consecutive_errors,
                        backoff_sec = self.config.error_backoff.as_secs(),
                        "Scheduler pass failed"
                    );
                    if self.consecutive_errors == REPEATED_ERROR_THRESHOLD {
                        self.notifier
                            .notify(
                                "Orchestrator errors",
                                &format!("{} consecutive failures, last: {}", self.consecutive_errors, e),
                            )
                            .await;
                    }
                    self.config.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {}
            }
        }

        info!("Shutdown requested");
        self.shutdown().await;
    }

    /// Stop every managed service, least important first
    pub async fn shutdown(&mut self) -> Vec<String> {
        let registry = self.registry();
        let mut order: Vec<_> = registry
            .managed()
            .into_iter()
            .rev()
            .filter(|s| self.supervisor.status(s.name()).has_process())
            .collect();
        order.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let mut stopped = Vec::new();
        for service in order {
            let outcome = self.supervisor.stop(service.name()).await;
            debug!(service = %service.name(), outcome = ?outcome, "Stopped for shutdown");
            stopped.push(service.name().to_string());
        }
        info!(stopped = stopped.len(), "All services stopped");
        stopped
    }
}
