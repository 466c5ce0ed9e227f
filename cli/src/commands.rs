//! Command handlers

use crate::formatters::{
    format_gb, format_liveness, format_pid, format_status, format_timestamp, tail_lines,
};
use crate::CliContext;
use anyhow::{bail, Context, Result};
use colored::*;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use orchestrator_engine::domain::{ResourceMonitor, StatusQuery, StatusReport};
use orchestrator_engine::infrastructure::{
    load_services_file, read_live_daemon_pid, CommandProbeRunner, JsonStateStore, SysinfoSampler,
    UnixProcessControl,
};
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tabwriter::TabWriter;

const DEFAULT_LOG_LINES: usize = 50;
const START_WAIT: Duration = Duration::from_secs(5);
// Long enough for the daemon to stop every service
const STOP_WAIT: Duration = Duration::from_secs(60);
const POLL: Duration = Duration::from_millis(200);

fn daemon_binary() -> PathBuf {
    if let Ok(path) = std::env::var("ORCH_DAEMON_BIN") {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name("orchestratord"))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from("orchestratord"))
}

pub async fn handle_start(ctx: &CliContext) -> Result<()> {
    if let Some(pid) = read_live_daemon_pid(&ctx.pid_file()) {
        println!("Daemon already running (pid {})", pid);
        return Ok(());
    }

    let binary = daemon_binary();
    let child = Command::new(&binary)
        .env("ORCH_STATE_DIR", &ctx.state_dir)
        .env("ORCH_CONFIG_FILE", &ctx.config_file)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .with_context(|| format!("Failed to launch {}", binary.display()))?;

    let deadline = tokio::time::Instant::now() + START_WAIT;
    while tokio::time::Instant::now() < deadline {
        if let Some(pid) = read_live_daemon_pid(&ctx.pid_file()) {
            println!("{} Daemon started (pid {})", "✓".green(), pid);
            return Ok(());
        }
        tokio::time::sleep(POLL).await;
    }

    bail!(
        "Daemon (pid {}) did not come up; see {}",
        child.id(),
        ctx.log_file().display()
    )
}

pub async fn handle_stop(ctx: &CliContext) -> Result<()> {
    let Some(pid) = read_live_daemon_pid(&ctx.pid_file()) else {
        println!("Daemon not running");
        return Ok(());
    };

    let target = Pid::from_raw(i32::try_from(pid).context("Invalid daemon pid")?);
    signal::kill(target, Signal::SIGTERM)
        .with_context(|| format!("Failed to signal daemon (pid {})", pid))?;
    println!("Stopping daemon (pid {})...", pid);

    let deadline = tokio::time::Instant::now() + STOP_WAIT;
    while tokio::time::Instant::now() < deadline {
        if read_live_daemon_pid(&ctx.pid_file()) != Some(pid) {
            println!("{} Daemon stopped", "✓".green());
            return Ok(());
        }
        tokio::time::sleep(POLL).await;
    }

    bail!("Daemon (pid {}) is still running after {:?}", pid, STOP_WAIT)
}

pub async fn handle_restart(ctx: &CliContext) -> Result<()> {
    handle_stop(ctx).await?;
    handle_start(ctx).await
}

pub async fn handle_status(ctx: &CliContext, args: &[String]) -> Result<()> {
    let json = args.iter().skip(2).any(|a| a == "--json");

    let loaded = load_services_file(&ctx.config_file)
        .with_context(|| format!("Failed to load {}", ctx.config_file.display()))?;
    let store = JsonStateStore::new(ctx.state_file());
    let processes = UnixProcessControl::new();
    let monitor = ResourceMonitor::new(
        Arc::new(SysinfoSampler::new()),
        Arc::new(CommandProbeRunner::new()),
    );

    let report = StatusQuery {
        registry: &loaded.registry,
        store: &store,
        processes: &processes,
        monitor: &monitor,
    }
    .execute(read_live_daemon_pid(&ctx.pid_file()))
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_status(&report)?;
    }
    Ok(())
}

fn print_status(report: &StatusReport) -> Result<()> {
    let mut tw = TabWriter::new(std::io::stdout()).padding(2);

    writeln!(tw, "Daemon Status")?;
    writeln!(tw, "─────────────────────────────────────────")?;
    match report.daemon.pid {
        Some(pid) if report.daemon.running => writeln!(tw, "Running:\tyes (pid {})", pid)?,
        _ => writeln!(tw, "Running:\tno")?,
    }
    match &report.resources {
        Some(res) => {
            writeln!(tw, "RAM available:\t{}", format_gb(res.ram_available_gb))?;
            writeln!(tw, "RAM total:\t{}", format_gb(res.ram_total_gb))?;
            writeln!(tw, "CPU:\t{:.1}%", res.cpu_percent)?;
        }
        None => writeln!(tw, "Resources:\tunavailable")?,
    }
    if !report.paused_by_resource.is_empty() {
        writeln!(tw, "Paused for RAM:\t{}", report.paused_by_resource.join(", "))?;
    }
    tw.flush()?;
    println!();

    println!(
        "{:<20}  {:<9}  {:<10}  {:<7}  {:<19}",
        "SERVICE", "PRIORITY", "STATUS", "PID", "LAST HEALTH"
    );
    println!("{:-<20}  {:-<9}  {:-<10}  {:-<7}  {:-<19}", "", "", "", "", "");
    for (name, entry) in &report.services {
        println!(
            "{:<20}  {:<9}  {}  {:<7}  {:<19}",
            name,
            entry.priority.label(),
            format_status(entry.status, 10),
            format_pid(entry.pid),
            format_timestamp(entry.last_health),
        );
        if let Some(err) = &entry.last_error {
            println!("  {} {}", "└".dimmed(), err.dimmed());
        }
    }

    if !report.external.is_empty() {
        println!();
        println!("External Services");
        println!("─────────────────────────────────────────");
        for (name, alive) in &report.external {
            println!("{:<20}  {}", name, format_liveness(*alive));
        }
    }
    Ok(())
}

pub fn handle_logs(ctx: &CliContext, args: &[String]) -> Result<()> {
    let lines = match args.get(2) {
        Some(n) => n
            .parse::<usize>()
            .with_context(|| format!("Invalid line count: {}", n))?,
        None => DEFAULT_LOG_LINES,
    };

    let path = ctx.log_file();
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No log file at {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    for line in tail_lines(&content, lines) {
        println!("{}", line);
    }
    Ok(())
}
