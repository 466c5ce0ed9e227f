//! Operator notifiers

use crate::domain::ports::Notifier;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs an operator-supplied command with the message appended as the last argument
pub struct CommandNotifier {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandNotifier {
    /// `None` when the command line is blank
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Option<Self> {
        let argv: Vec<String> = command_line.split_whitespace().map(String::from).collect();
        if argv.is_empty() {
            return None;
        }
        Some(Self { argv, timeout })
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, title: &str, message: &str) {
        warn!(title = %title, "{}", message);

        let Some((program, args)) = self.argv.split_first() else {
            return;
        };
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(format!("{}: {}", title, message))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!(program = %program, error = %e, "Notification command failed to start");
                return;
            }
        };
        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                debug!(program = %program, status = %status, "Notification command failed");
            }
            Ok(Err(e)) => debug!(program = %program, error = %e, "Notification command failed"),
            Err(_) => {
                let _ = child.kill().await;
                debug!(program = %program, "Notification command timed out");
            }
            Ok(Ok(_)) => {}
        }
    }
}

/// Notifications go to the log only
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        warn!(title = %title, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_blank_command_line() {
        assert!(CommandNotifier::from_command_line("   ", Duration::from_secs(1)).is_none());
        let notifier = CommandNotifier::from_command_line("notify-send -u low", Duration::from_secs(1))
            .unwrap();
        assert_eq!(notifier.argv, vec!["notify-send", "-u", "low"]);
    }

    #[tokio::test]
    async fn test_message_is_last_argument() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let script = dir.path().join("notify.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s' \"$1\" > {}\n", out.display()),
        )
        .unwrap();

        let line = format!("sh {}", script.display());
        let notifier = CommandNotifier::from_command_line(&line, Duration::from_secs(5)).unwrap();
        notifier.notify("Memory pressure", "paused tts").await;

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, "Memory pressure: paused tts");
    }

    #[tokio::test]
    async fn test_slow_or_missing_command_does_not_block() {
        let slow = CommandNotifier::from_command_line("sleep 30", Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();
        slow.notify("t", "m").await;
        assert!(started.elapsed() < Duration::from_secs(5));

        let missing =
            CommandNotifier::from_command_line("/nonexistent/notify", Duration::from_secs(1)).unwrap();
        missing.notify("t", "m").await;
        LogNotifier.notify("t", "m").await;
    }
}
