//! Probe runner implementation
//! Performs exec, TCP and HTTP probes

use crate::domain::ports::ProbeRunner;
use crate::domain::{HealthProbe, ProbeOutcome, ProbeType};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Standard probe runner
pub struct CommandProbeRunner;

impl CommandProbeRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CommandProbeRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeRunner for CommandProbeRunner {
    async fn run(&self, probe: &HealthProbe, timeout: Duration) -> ProbeOutcome {
        let outcome = match probe.probe_type {
            ProbeType::Exec => run_exec(probe, timeout).await,
            ProbeType::Tcp => run_tcp(probe, timeout).await,
            ProbeType::Http => run_http(probe, timeout).await,
        };
        debug!(
            probe_type = %probe.probe_type,
            target = %probe.target(),
            outcome = %outcome,
            "Probe finished"
        );
        outcome
    }
}

/// Exec probe: success is exit code 0
async fn run_exec(probe: &HealthProbe, timeout: Duration) -> ProbeOutcome {
    let Some(command) = &probe.exec_command else {
        return ProbeOutcome::Error("exec probe missing command".to_string());
    };

    let mut cmd = Command::new(command);
    cmd.args(&probe.exec_args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to execute probe command");
            return ProbeOutcome::Error(e.to_string());
        }
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) if status.success() => ProbeOutcome::Passed,
        Ok(Ok(status)) => ProbeOutcome::Failed {
            exit_code: status.code(),
        },
        Ok(Err(e)) => ProbeOutcome::Error(e.to_string()),
        Err(_) => {
            let _ = child.kill().await;
            ProbeOutcome::TimedOut
        }
    }
}

/// TCP probe: success is an accepted connection
async fn run_tcp(probe: &HealthProbe, timeout: Duration) -> ProbeOutcome {
    let (Some(host), Some(port)) = (&probe.tcp_host, probe.tcp_port) else {
        return ProbeOutcome::Error("tcp probe missing host or port".to_string());
    };
    let addr = format!("{}:{}", host, port);

    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => ProbeOutcome::Passed,
        Ok(Err(e)) => {
            debug!(addr = %addr, error = %e, "TCP probe connection failed");
            ProbeOutcome::Failed { exit_code: None }
        }
        Err(_) => ProbeOutcome::TimedOut,
    }
}

/// HTTP probe: success is the expected status code
async fn run_http(probe: &HealthProbe, timeout: Duration) -> ProbeOutcome {
    let Some(endpoint) = probe.http_endpoint.clone() else {
        return ProbeOutcome::Error("http probe missing endpoint".to_string());
    };
    let expected = probe.http_expected_status;

    // ureq is blocking
    let task = tokio::task::spawn_blocking(move || {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        match agent.get(&endpoint).call() {
            Ok(resp) => Some(resp.status()),
            Err(ureq::Error::Status(code, _)) => Some(code),
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "HTTP probe request failed");
                None
            }
        }
    });

    // The agent timeout bounds the request; the outer one guards DNS stalls
    match tokio::time::timeout(timeout + Duration::from_secs(1), task).await {
        Ok(Ok(Some(code))) if code == expected => ProbeOutcome::Passed,
        Ok(Ok(Some(_))) | Ok(Ok(None)) => ProbeOutcome::Failed { exit_code: None },
        Ok(Err(e)) => ProbeOutcome::Error(e.to_string()),
        Err(_) => ProbeOutcome::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn exec(cmd: &str, args: &[&str]) -> HealthProbe {
        HealthProbe::exec(cmd, args.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_exec_probe_exit_codes() {
        let runner = CommandProbeRunner::new();
        let timeout = Duration::from_secs(5);

        assert_eq!(runner.run(&exec("true", &[]), timeout).await, ProbeOutcome::Passed);
        assert_eq!(
            runner.run(&exec("sh", &["-c", "exit 3"]), timeout).await,
            ProbeOutcome::Failed { exit_code: Some(3) }
        );
    }

    #[tokio::test]
    async fn test_exec_probe_timeout() {
        let runner = CommandProbeRunner::new();
        let outcome = runner
            .run(&exec("sleep", &["10"]), Duration::from_millis(200))
            .await;
        assert_eq!(outcome, ProbeOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_exec_probe_missing_binary() {
        let runner = CommandProbeRunner::new();
        let outcome = runner
            .run(&exec("/nonexistent/probe", &[]), Duration::from_secs(1))
            .await;
        assert!(matches!(outcome, ProbeOutcome::Error(_)));
    }

    #[tokio::test]
    async fn test_tcp_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let runner = CommandProbeRunner::new();

        let probe = HealthProbe::tcp("127.0.0.1", port);
        assert_eq!(runner.run(&probe, Duration::from_secs(2)).await, ProbeOutcome::Passed);

        drop(listener);
        let outcome = runner.run(&probe, Duration::from_secs(2)).await;
        assert!(!outcome.is_success());
    }

    async fn serve_once(listener: TcpListener, status_line: &'static str) {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status_line
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    }

    #[tokio::test]
    async fn test_http_probe_status_codes() {
        let runner = CommandProbeRunner::new();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, "200 OK"));
        let probe = HealthProbe::http(format!("http://127.0.0.1:{}/health", port));
        assert_eq!(runner.run(&probe, Duration::from_secs(2)).await, ProbeOutcome::Passed);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, "503 Service Unavailable"));
        let probe = HealthProbe::http(format!("http://127.0.0.1:{}/health", port));
        assert_eq!(
            runner.run(&probe, Duration::from_secs(2)).await,
            ProbeOutcome::Failed { exit_code: None }
        );
    }

    #[tokio::test]
    async fn test_http_probe_expected_non_200() {
        let runner = CommandProbeRunner::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, "204 No Content"));

        let probe = HealthProbe::http(format!("http://127.0.0.1:{}/", port)).with_expected_status(204);
        assert_eq!(runner.run(&probe, Duration::from_secs(2)).await, ProbeOutcome::Passed);
    }
}
