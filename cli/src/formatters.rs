//! Output formatting utilities

use chrono::{DateTime, Local, Utc};
use colored::*;
use orchestrator_engine::domain::ServiceStatus;

/// Format a timestamp in local time
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

/// Format service status with appropriate color, padded to `width`
pub fn format_status(status: ServiceStatus, width: usize) -> ColoredString {
    let label = format!("{:<width$}", status.to_string(), width = width);
    match status {
        ServiceStatus::Running => label.green(),
        ServiceStatus::Unhealthy => label.red(),
        ServiceStatus::Paused => label.yellow(),
        ServiceStatus::Starting => label.cyan(),
        ServiceStatus::Stopped => label.normal(),
    }
}

pub fn format_pid(pid: Option<u32>) -> String {
    pid.map_or_else(|| "-".to_string(), |p| p.to_string())
}

pub fn format_liveness(alive: bool) -> ColoredString {
    if alive {
        "up".green()
    } else {
        "down".red()
    }
}

pub fn format_gb(gb: f64) -> String {
    format!("{:.2} GB", gb)
}

/// Keep the last `n` lines of `content`
pub fn tail_lines(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}
