//! Start command - write the startup descriptor and launch the daemon

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::time::Duration;

use super::parse_endpoint;
use crate::cli::args::StartArgs;
use crate::config::{GraceDir, PipeConfig, setup_dir};
use crate::service::{Daemon, StartOutcome};

/// Execute the start command
///
/// If the daemon dies during start-up its exit code becomes ours.
pub async fn execute(args: StartArgs, dir: &GraceDir) -> Result<ExitCode> {
    let src = parse_endpoint(&args.src)?;
    let dst = parse_endpoint(&args.dst)?;

    // The running daemon's descriptor must survive a rejected start
    let daemon = Daemon::new(dir.clone());
    daemon.ensure_not_running()?;

    setup_dir(
        dir,
        vec![PipeConfig {
            src: src.clone(),
            dst: dst.clone(),
        }],
    )
    .context("Failed to prepare base directory")?;

    match daemon.start(Duration::from_secs(args.timeout)).await? {
        StartOutcome::Running { pid } => {
            println!("grace started (PID: {}): {} -> {}", pid, src, dst);
            Ok(ExitCode::SUCCESS)
        }
        StartOutcome::Exited { code } => {
            eprintln!(
                "Daemon exited during start-up with code {}. See {}",
                code,
                dir.log_file().display()
            );
            Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::exit_code::ExitCode as GraceExitCode;
    use crate::config::load_startup;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_start_while_running_keeps_descriptor() {
        let temp = TempDir::new().unwrap();
        let dir = GraceDir::new(temp.path());
        let original = PipeConfig {
            src: "tcp:8080".parse().unwrap(),
            dst: "tcp:127.0.0.1:9001".parse().unwrap(),
        };
        setup_dir(&dir, vec![original.clone()]).unwrap();
        Daemon::new(dir.clone()).write_pid_file().unwrap();

        let args = StartArgs {
            src: "tcp:7777".to_string(),
            dst: "tcp:127.0.0.1:1".to_string(),
            timeout: 1,
        };
        let err = execute(args, &dir).await.unwrap_err();
        assert_eq!(GraceExitCode::for_error(&err), GraceExitCode::DaemonError);
        assert_eq!(load_startup(&dir).unwrap().pipes, vec![original]);
    }
}
