//! orchestratord: runs the scheduler loop in the foreground

#[path = "daemon/config.rs"]
mod config;

use anyhow::{Context, Result};
use config::DaemonConfig;
use orchestrator_engine::constants::probe::NOTIFY_TIMEOUT_SEC;
use orchestrator_engine::domain::ports::{Notifier, ProcessControl, StateStore};
use orchestrator_engine::domain::{
    ProcessSupervisor, ResourceMonitor, SchedulerConfig, SchedulerLoop, StatePersistence,
};
use orchestrator_engine::infrastructure::{
    load_services_file, CommandNotifier, CommandProbeRunner, DaemonLock, JsonStateStore,
    LogNotifier, SysinfoSampler, UnixProcessControl,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &DaemonConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("Failed to create {}", config.state_dir.display()))?;

    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let file_appender = tracing_appender::rolling::never(
        &config.state_dir,
        orchestrator_engine::constants::paths::LOG_FILE,
    );
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(guard)
}

/// Cancel on SIGTERM or SIGINT
fn spawn_signal_handler(cancel: CancellationToken) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!(signal = "SIGTERM", "Received shutdown signal"),
            _ = sigint.recv() => info!(signal = "SIGINT", "Received shutdown signal"),
        }
        cancel.cancel();
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::from_env();
    let _log_guard = init_tracing(&config)?;

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid daemon configuration");
        anyhow::bail!(e);
    }

    let loaded = load_services_file(&config.config_file)
        .with_context(|| format!("Failed to load {}", config.config_file.display()))?;
    let lock = DaemonLock::acquire(config.pid_file()).context("Failed to take daemon lock")?;

    info!(
        pid = lock.pid(),
        services = loaded.registry.len(),
        config_file = %config.config_file.display(),
        state_dir = %config.state_dir.display(),
        "Orchestrator daemon starting"
    );

    let registry = Arc::new(loaded.registry);
    let processes: Arc<dyn ProcessControl> = Arc::new(UnixProcessControl::new());
    let probes = Arc::new(CommandProbeRunner::new());
    let sampler = Arc::new(SysinfoSampler::new());
    let store: Arc<dyn StateStore> = Arc::new(JsonStateStore::new(config.state_file()));
    let notifier: Arc<dyn Notifier> = match config
        .notify_command
        .as_deref()
        .and_then(|line| {
            CommandNotifier::from_command_line(line, Duration::from_secs(NOTIFY_TIMEOUT_SEC))
        }) {
        Some(command) => Arc::new(command),
        None => Arc::new(LogNotifier),
    };

    let mut persistence = StatePersistence::new(store);
    let changes = persistence
        .load(&registry, processes.as_ref())
        .await
        .context("Failed to load daemon state")?;
    if !changes.is_empty() {
        warn!(changes = changes.len(), "Recovered from unclean shutdown");
    }

    let supervisor = ProcessSupervisor::new(
        Arc::clone(&registry),
        persistence,
        Arc::clone(&processes),
        probes.clone(),
        sampler.clone(),
    );
    let monitor = ResourceMonitor::new(sampler, probes);
    let scheduler_config = SchedulerConfig {
        thresholds: loaded.thresholds,
        external_margin_gb: loaded.external_margin_gb,
        resource_interval: config.resource_interval,
        health_interval: config.health_interval,
        ..SchedulerConfig::default()
    };
    let mut scheduler = SchedulerLoop::new(supervisor, monitor, notifier, scheduler_config);

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    let report = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        report = scheduler.startup() => Some(report),
    };
    if let Some(report) = report {
        info!(
            started = report.started.len(),
            failed = report.failures.len(),
            "Startup complete"
        );
    }

    scheduler.run(cancel).await;

    info!("Orchestrator daemon stopped");
    drop(lock);
    Ok(())
}
