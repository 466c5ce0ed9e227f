mod commands;
mod formatters;

use anyhow::Result;
use orchestrator_engine::constants::paths;
use orchestrator_engine::infrastructure::config::{default_state_dir, expand_home};
use std::env;
use std::path::PathBuf;

/// Paths shared with the daemon, resolved from the same environment variables
pub struct CliContext {
    pub state_dir: PathBuf,
    pub config_file: PathBuf,
}

impl CliContext {
    fn from_env() -> Self {
        let state_dir = env::var("ORCH_STATE_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand_home(&s))
            .unwrap_or_else(default_state_dir);
        let config_file = env::var("ORCH_CONFIG_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand_home(&s))
            .unwrap_or_else(|| state_dir.join(paths::CONFIG_FILE));
        Self {
            state_dir,
            config_file,
        }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join(paths::PID_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(paths::STATE_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join(paths::LOG_FILE)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let ctx = CliContext::from_env();

    match args[1].as_str() {
        "start" => commands::handle_start(&ctx).await?,
        "stop" => commands::handle_stop(&ctx).await?,
        "restart" => commands::handle_restart(&ctx).await?,
        "status" => commands::handle_status(&ctx, &args).await?,
        "logs" => commands::handle_logs(&ctx, &args)?,
        "help" | "--help" | "-h" => print_usage(),
        cmd => {
            eprintln!("unknown command: {}", cmd);
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Orchestrator CLI");
    eprintln!();
    eprintln!("Usage: orchctl <command> [args...]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  start             Start the daemon in the background");
    eprintln!("  stop              Stop the daemon and every managed service");
    eprintln!("  restart           Stop, then start the daemon");
    eprintln!("  status [--json]   Show daemon, resource and service status");
    eprintln!("  logs [N]          Show the last N daemon log lines (default: 50)");
    eprintln!();
    eprintln!("Environment Variables:");
    eprintln!("  ORCH_STATE_DIR     State directory (default: ~/.orchestrator)");
    eprintln!("  ORCH_CONFIG_FILE   Services file (default: $ORCH_STATE_DIR/services.yaml)");
    eprintln!("  ORCH_DAEMON_BIN    Daemon binary (default: orchestratord next to orchctl)");
}
