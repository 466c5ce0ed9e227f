//! Unix process control
//! Spawns detached process groups and signals them with nix; reads the
//! process table with sysinfo

use crate::domain::ports::{LaunchSpec, ProcessControl, ProcessEntry, ProcessSignal};
use crate::domain::DomainError;
use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tokio::process::Command;
use tracing::{debug, error, warn};

pub struct UnixProcessControl {
    system: Arc<Mutex<System>>,
}

impl UnixProcessControl {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    fn to_nix(signal: ProcessSignal) -> Signal {
        match signal {
            ProcessSignal::Terminate => Signal::SIGTERM,
            ProcessSignal::Kill => Signal::SIGKILL,
            ProcessSignal::Stop => Signal::SIGSTOP,
            ProcessSignal::Continue => Signal::SIGCONT,
        }
    }

    fn nix_pid(pid: u32) -> Result<Pid, DomainError> {
        i32::try_from(pid)
            .ok()
            .filter(|p| *p > 0)
            .map(Pid::from_raw)
            .ok_or_else(|| DomainError::SignalFailed {
                pid,
                reason: "pid out of range".to_string(),
            })
    }

    /// Exited but not yet reaped by its parent
    async fn is_zombie(&self, pid: u32) -> bool {
        let system = Arc::clone(&self.system);
        tokio::task::spawn_blocking(move || {
            let mut sys = system.lock().unwrap_or_else(|p| p.into_inner());
            let target = sysinfo::Pid::from_u32(pid);
            sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
            sys.process(target)
                .is_some_and(|process| process.status() == ProcessStatus::Zombie)
        })
        .await
        .unwrap_or(false)
    }

    /// Live, non-zombie processes other than this one
    async fn process_table(&self) -> Vec<ProcessEntry> {
        let system = Arc::clone(&self.system);
        let own_pid = std::process::id();

        let result = tokio::task::spawn_blocking(move || {
            let mut sys = system.lock().unwrap_or_else(|p| p.into_inner());
            sys.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
            );
            sys.processes()
                .iter()
                .filter(|(pid, process)| {
                    pid.as_u32() != own_pid && process.status() != ProcessStatus::Zombie
                })
                .map(|(pid, process)| ProcessEntry {
                    pid: pid.as_u32(),
                    parent: process.parent().map(|p| p.as_u32()),
                    name: process.name().to_string_lossy().into_owned(),
                    cmdline: process
                        .cmd()
                        .iter()
                        .map(|arg| arg.to_string_lossy())
                        .collect::<Vec<_>>()
                        .join(" "),
                })
                .collect::<Vec<_>>()
        })
        .await;

        match result {
            Ok(table) => table,
            Err(e) => {
                error!(error = %e, "Process table scan failed");
                Vec::new()
            }
        }
    }
}

impl Default for UnixProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessControl for UnixProcessControl {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32, DomainError> {
        let (program, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| DomainError::InvalidCommand(format!("{}: empty command", spec.service)))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env_vars {
            cmd.env(key, value);
        }

        // The service leads its own process group
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| DomainError::SpawnFailed {
            service: spec.service.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id().ok_or_else(|| DomainError::SpawnFailed {
            service: spec.service.clone(),
            reason: "process exited before its pid was read".to_string(),
        })?;

        // Reap the child so an exited service does not linger as a zombie
        let service = spec.service.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(service = %service, pid = pid, status = %status, "Process exited"),
                Err(e) => warn!(service = %service, pid = pid, error = %e, "Failed to wait for process"),
            }
        });

        Ok(pid)
    }

    async fn signal(&self, pid: u32, sig: ProcessSignal) -> Result<bool, DomainError> {
        let target = Self::nix_pid(pid)?;
        match signal::kill(target, Self::to_nix(sig)) {
            // A zombie accepts signals but has already exited
            Ok(()) => Ok(!self.is_zombie(pid).await),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(DomainError::SignalFailed {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    async fn signal_group(&self, pid: u32, sig: ProcessSignal) -> Result<bool, DomainError> {
        let target = Self::nix_pid(pid)?;
        let pgid = match unistd::getpgid(Some(target)) {
            Ok(pgid) => pgid,
            Err(Errno::ESRCH) => return Ok(false),
            Err(e) => {
                return Err(DomainError::SignalFailed {
                    pid,
                    reason: e.to_string(),
                })
            }
        };

        // Never signal our own group
        if pgid == unistd::getpgrp() {
            return self.signal(pid, sig).await;
        }

        match signal::killpg(pgid, Self::to_nix(sig)) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(DomainError::SignalFailed {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    async fn is_alive(&self, pid: u32) -> bool {
        let Ok(target) = Self::nix_pid(pid) else {
            return false;
        };
        match signal::kill(target, None) {
            Ok(()) => !self.is_zombie(pid).await,
            // Exists but belongs to someone else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    async fn descendants(&self, pid: u32) -> Vec<ProcessEntry> {
        let table = self.process_table().await;
        let mut out = Vec::new();
        let mut frontier = VecDeque::from([pid]);
        while let Some(parent) = frontier.pop_front() {
            for entry in table.iter().filter(|e| e.parent == Some(parent)) {
                frontier.push_back(entry.pid);
                out.push(entry.clone());
            }
        }
        out
    }

    async fn find_by_signature(&self, pattern: &str) -> Vec<ProcessEntry> {
        self.process_table()
            .await
            .into_iter()
            .filter(|e| e.cmdline.contains(pattern))
            .collect()
    }

    async fn write_pid_file(&self, path: &Path, pid: u32) -> Result<(), DomainError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Persistence(format!("{}: {}", path.display(), e)))?;
        }
        tokio::fs::write(path, format!("{}\n", pid))
            .await
            .map_err(|e| DomainError::Persistence(format!("{}: {}", path.display(), e)))
    }

    async fn read_pid_file(&self, path: &Path) -> Option<u32> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        content.trim().parse().ok()
    }

    async fn remove_pid_file(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove pid file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sleeper(service: &str, secs: u32) -> LaunchSpec {
        LaunchSpec {
            service: service.to_string(),
            argv: vec!["sleep".to_string(), secs.to_string()],
            working_dir: None,
            env_vars: vec![],
        }
    }

    async fn wait_dead(control: &UnixProcessControl, pid: u32) -> bool {
        for _ in 0..50 {
            if !control.is_alive(pid).await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_spawn_signal_and_reap() {
        let control = UnixProcessControl::new();
        let pid = control.spawn(&sleeper("sleeper", 30)).await.unwrap();
        assert!(control.is_alive(pid).await);

        // Leader of its own group
        let pgid = unistd::getpgid(Some(Pid::from_raw(pid as i32))).unwrap();
        assert_eq!(pgid.as_raw() as u32, pid);

        assert!(control.signal_group(pid, ProcessSignal::Terminate).await.unwrap());
        assert!(wait_dead(&control, pid).await);
        assert!(!control.signal(pid, ProcessSignal::Kill).await.unwrap());
    }

    #[tokio::test]
    async fn test_exited_child_is_reaped() {
        let control = UnixProcessControl::new();
        let spec = LaunchSpec {
            argv: vec!["true".to_string()],
            ..sleeper("oneshot", 0)
        };
        let pid = control.spawn(&spec).await.unwrap();

        let mut reaped = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if !control.is_zombie(pid).await && !control.is_alive(pid).await {
                reaped = true;
                break;
            }
        }
        assert!(reaped);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let control = UnixProcessControl::new();
        let spec = LaunchSpec {
            argv: vec!["/nonexistent/binary".to_string()],
            ..sleeper("ghost", 1)
        };
        let err = control.spawn(&spec).await.unwrap_err();
        assert!(matches!(err, DomainError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_descendants_and_signature() {
        let control = UnixProcessControl::new();
        let spec = LaunchSpec {
            service: "tree".to_string(),
            argv: vec![
                "sh".to_string(),
                "-c".to_string(),
                "sleep 31 & wait".to_string(),
            ],
            working_dir: None,
            env_vars: vec![],
        };
        let pid = control.spawn(&spec).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let children = control.descendants(pid).await;
        assert!(children.iter().any(|c| c.cmdline.contains("sleep 31")));
        let found = control.find_by_signature("sleep 31").await;
        assert!(!found.is_empty());

        control.signal_group(pid, ProcessSignal::Kill).await.unwrap();
        assert!(wait_dead(&control, pid).await);
    }

    #[tokio::test]
    async fn test_pid_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join("svc.pid");
        let control = UnixProcessControl::new();

        assert_eq!(control.read_pid_file(&path).await, None);
        control.write_pid_file(&path, 4321).await.unwrap();
        assert_eq!(control.read_pid_file(&path).await, Some(4321));
        control.remove_pid_file(&path).await;
        assert!(!path.exists());
        // Removing twice is fine
        control.remove_pid_file(&path).await;
    }

    #[tokio::test]
    async fn test_unknown_pid_is_dead() {
        let control = UnixProcessControl::new();
        assert!(!control.is_alive(0).await);
        assert!(!control.is_alive(u32::MAX).await);
    }
}
