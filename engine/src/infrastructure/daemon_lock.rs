//! Single-instance lock for the daemon
//!
//! A pid file in the state directory, held under an exclusive `flock` for the
//! daemon's lifetime. The kernel drops the lock when the holder exits, so a
//! file left behind by a crashed daemon is simply taken over. The pid inside
//! is informational and lets the operator front-end find the daemon.

use crate::domain::DomainError;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::signal;
use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct DaemonLock {
    path: PathBuf,
    pid: u32,
    _file: Flock<File>,
}

impl std::fmt::Debug for DaemonLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonLock")
            .field("path", &self.path)
            .field("pid", &self.pid)
            .finish()
    }
}

impl DaemonLock {
    /// Take the lock for the current process
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        let io_err = |e: std::io::Error| DomainError::Persistence(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DomainError::Persistence(format!("{}: {}", parent.display(), e)))?;
        }

        // No truncate: the current holder's pid must survive a failed attempt
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        let mut file = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(locked) => locked,
            Err((_, Errno::EWOULDBLOCK)) => {
                let holder = read_pid(&path).unwrap_or_default();
                return Err(DomainError::DaemonAlreadyRunning(holder));
            }
            Err((_, errno)) => {
                return Err(DomainError::Persistence(format!(
                    "{}: flock failed: {}",
                    path.display(),
                    errno
                )))
            }
        };

        if let Some(previous) = read_pid(&path) {
            debug!(path = %path.display(), previous = previous, "Taking over daemon pid file");
        }

        let pid = std::process::id();
        file.set_len(0).map_err(io_err)?;
        file.write_all(format!("{}\n", pid).as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(io_err)?;

        Ok(Self {
            path,
            pid,
            _file: file,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        // Unlinked while the lock is still held; the flock is released with the file
        if read_pid(&self.path) == Some(self.pid) {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove daemon pid file");
            }
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Pid recorded in the lock file, if that process is alive
pub fn read_live_daemon_pid(path: &Path) -> Option<u32> {
    let pid = read_pid(path)?;
    let raw = i32::try_from(pid).ok().filter(|p| *p > 0)?;
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Some(pid),
        Err(_) => None,
    }
}
