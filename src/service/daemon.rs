//! Background daemon management
//!
//! - Start: spawn `grace run` detached and wait until it answers
//! - Status: read the pid file and probe the process
//! - Stop support: wait for the process to exit and clean up

use crate::config::GraceDir;
use crate::control::ControlClient;
use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How often start-up and shutdown progress is polled
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Daemon status information
#[derive(Debug, Clone)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub pid_file: PathBuf,
}

/// Result of starting the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The daemon is up and answering on its control socket
    Running { pid: u32 },
    /// The daemon exited during start-up with this code
    Exited { code: i32 },
}

/// Daemon manager for one base directory
#[derive(Debug)]
pub struct Daemon {
    dir: GraceDir,
}

impl Daemon {
    pub fn new(dir: GraceDir) -> Self {
        Self { dir }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.pid_file()
    }

    /// Fail if a live process owns this directory's pid file
    pub fn ensure_not_running(&self) -> Result<()> {
        if let Ok(status) = self.status()
            && status.running
        {
            return Err(Error::Daemon(format!(
                "Daemon is already running with PID {}",
                status.pid.unwrap_or(0)
            )));
        }
        Ok(())
    }

    /// Spawn the daemon for this directory and wait until it is ready
    pub async fn start(&self, ready_timeout: Duration) -> Result<StartOutcome> {
        self.ensure_not_running()?;

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.log_file())
            .map_err(|e| Error::Daemon(format!("Failed to open log file: {}", e)))?;
        let log_err = log
            .try_clone()
            .map_err(|e| Error::Daemon(format!("Failed to open log file: {}", e)))?;

        let executable = std::env::current_exe()
            .map_err(|e| Error::Daemon(format!("Failed to get current executable path: {}", e)))?;

        let mut cmd = Command::new(&executable);
        cmd.arg("--dir").arg(self.dir.root()).arg("run");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::from(log));
        cmd.stderr(Stdio::from(log_err));
        // Keep terminal signals aimed at the CLI away from the daemon
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Daemon(format!("Failed to start daemon process: {}", e)))?;
        let pid = child.id();
        tracing::debug!(pid = pid, "Spawned daemon");

        let deadline = Instant::now() + ready_timeout;
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| Error::Daemon(format!("Failed to poll daemon: {}", e)))?
            {
                return Ok(StartOutcome::Exited {
                    code: status.code().unwrap_or(1),
                });
            }

            if self.answers().await {
                tracing::info!(pid = pid, dir = %self.dir.root().display(), "Daemon started");
                return Ok(StartOutcome::Running { pid });
            }

            if Instant::now() >= deadline {
                return Err(Error::Daemon(format!(
                    "Daemon (PID {}) did not become ready within {:?}",
                    pid, ready_timeout
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Whether the control socket accepts a `List` request
    async fn answers(&self) -> bool {
        match ControlClient::connect(self.dir.socket_path()).await {
            Ok(mut client) => client.list().await.is_ok(),
            Err(_) => false,
        }
    }

    /// Check if the daemon is running
    pub fn status(&self) -> Result<DaemonStatus> {
        let pid_file = self.pid_file();
        if !pid_file.exists() {
            return Ok(DaemonStatus {
                running: false,
                pid: None,
                pid_file,
            });
        }

        let pid_str = fs::read_to_string(&pid_file)
            .map_err(|e| Error::Daemon(format!("Failed to read PID file: {}", e)))?;
        let pid: u32 = pid_str
            .trim()
            .parse()
            .map_err(|e| Error::Daemon(format!("Invalid PID in file: {}", e)))?;

        Ok(DaemonStatus {
            running: is_process_running(pid),
            pid: Some(pid),
            pid_file,
        })
    }

    /// Record the current process as the daemon
    pub fn write_pid_file(&self) -> Result<()> {
        fs::write(self.pid_file(), std::process::id().to_string())
            .map_err(|e| Error::Daemon(format!("Failed to write PID file: {}", e)))
    }

    /// Remove the pid file if present
    pub fn remove_pid_file(&self) {
        let pid_file = self.pid_file();
        if pid_file.exists()
            && let Err(e) = fs::remove_file(&pid_file)
        {
            tracing::warn!(path = %pid_file.display(), error = %e, "Failed to remove PID file");
        }
    }

    /// Wait for `pid` to exit; returns false if it is still alive at the
    /// deadline.
    pub async fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while is_process_running(pid) {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        true
    }
}

/// Check if a process is running
fn is_process_running(pid: u32) -> bool {
    // kill(pid, 0) only checks for existence
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_no_pid_file() {
        let temp = TempDir::new().unwrap();
        let daemon = Daemon::new(GraceDir::new(temp.path()));
        let status = daemon.status().unwrap();
        assert!(!status.running);
        assert!(status.pid.is_none());
        assert_eq!(status.pid_file, temp.path().join("grace.pid"));
    }

    #[test]
    fn test_status_with_stale_pid() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("grace.pid"), "999999999").unwrap();
        let daemon = Daemon::new(GraceDir::new(temp.path()));
        let status = daemon.status().unwrap();
        assert!(!status.running);
        assert_eq!(status.pid, Some(999999999));
    }

    #[test]
    fn test_write_and_remove_pid_file() {
        let temp = TempDir::new().unwrap();
        let daemon = Daemon::new(GraceDir::new(temp.path()));
        daemon.write_pid_file().unwrap();

        let status = daemon.status().unwrap();
        assert!(status.running);
        assert_eq!(status.pid, Some(std::process::id()));

        daemon.remove_pid_file();
        assert!(!daemon.pid_file().exists());
    }

    #[test]
    fn test_ensure_not_running() {
        let temp = TempDir::new().unwrap();
        let daemon = Daemon::new(GraceDir::new(temp.path()));
        daemon.ensure_not_running().unwrap();

        daemon.write_pid_file().unwrap();
        let err = daemon.ensure_not_running().unwrap_err();
        assert!(matches!(err, Error::Daemon(_)));
    }

    #[test]
    fn test_invalid_pid_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("grace.pid"), "not-a-pid").unwrap();
        let daemon = Daemon::new(GraceDir::new(temp.path()));
        assert!(daemon.status().is_err());
    }

    #[tokio::test]
    async fn test_wait_for_exit_of_missing_process() {
        let temp = TempDir::new().unwrap();
        let daemon = Daemon::new(GraceDir::new(temp.path()));
        assert!(daemon.wait_for_exit(999999999, Duration::from_millis(10)).await);
    }
}
