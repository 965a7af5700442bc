//! Stop command - ask the daemon to exit and wait until it has

use anyhow::{Context, Result, bail};
use std::time::Duration;
use tracing::{info, warn};

use super::connect;
use crate::cli::args::StopArgs;
use crate::config::GraceDir;
use crate::service::Daemon;

/// Execute the stop command
pub async fn execute(args: StopArgs, dir: &GraceDir) -> Result<()> {
    let daemon = Daemon::new(dir.clone());
    let status = daemon.status().context("Failed to read daemon status")?;

    let mut client = connect(dir).await?;
    client.stop().await.context("Failed to stop daemon")?;

    let Some(pid) = status.pid else {
        warn!("No PID file; not waiting for the daemon to exit");
        println!("Stop requested.");
        return Ok(());
    };

    info!(pid = pid, "Waiting for daemon to exit...");
    if !daemon
        .wait_for_exit(pid, Duration::from_secs(args.timeout))
        .await
    {
        bail!(crate::Error::Daemon(format!(
            "Daemon (PID {}) did not exit within {} seconds",
            pid, args.timeout
        )));
    }

    daemon.remove_pid_file();
    println!("Daemon stopped.");
    Ok(())
}
