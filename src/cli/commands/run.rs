//! Run command - serve the base directory's pipes in this process
//!
//! This is what `grace start` spawns in the background. It stays in the
//! foreground until a `stop` request or a termination signal arrives.

use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{GraceDir, load_startup};
use crate::control::ControlServer;
use crate::orchestrator::{Orchestrator, ShutdownTerminator};
use crate::service::Daemon;

/// Execute the run command
pub async fn execute(dir: &GraceDir) -> Result<()> {
    std::fs::create_dir_all(dir.root())
        .with_context(|| format!("Failed to create {}", dir.root().display()))?;

    let daemon = Daemon::new(dir.clone());
    if let Ok(status) = daemon.status()
        && status.running
        && status.pid != Some(std::process::id())
    {
        bail!(
            "Daemon is already running for {} (PID: {})",
            dir.root().display(),
            status.pid.unwrap_or(0)
        );
    }

    let startup = load_startup(dir)
        .with_context(|| format!("Failed to load {}", dir.startup_file().display()))?;

    daemon.write_pid_file()?;
    let _pid_guard = scopeguard::guard((), |_| daemon.remove_pid_file());

    let (terminator, shutdown_rx) = ShutdownTerminator::new();
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(terminator)));

    for pipe in startup.pipes {
        orchestrator
            .add_forwarder(pipe.src.clone(), pipe.dst.clone())
            .await
            .with_context(|| format!("Failed to forward {} -> {}", pipe.src, pipe.dst))?;
    }

    let mut server = ControlServer::new(dir.socket_path());
    server.bind().await?;

    tokio::spawn(watch_signals(Arc::clone(&orchestrator)));

    let pipes = orchestrator.sources().await.len();
    info!(dir = %dir.root().display(), pipes = pipes, "grace daemon ready");

    server.run(Arc::clone(&orchestrator), shutdown_rx).await?;

    orchestrator.close_all().await;
    info!("Shutdown complete");
    Ok(())
}

/// Turn SIGINT/SIGTERM into an orchestrator shutdown
async fn watch_signals(orchestrator: Arc<Orchestrator>) {
    #[cfg(unix)]
    {
        let mut term = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
            }
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
    }

    info!("Received shutdown signal, stopping...");
    orchestrator.shutdown();
}
