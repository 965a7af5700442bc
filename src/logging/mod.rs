//! Logging setup using tracing and tracing-subscriber
//!
//! Interactive commands log to stderr. The daemon logs to the base
//! directory's `grace.log` instead, without ANSI colours.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Verbosity level adjustment: -1 for quiet, 0 for normal, +1 for verbose
    pub verbosity: i8,
    /// Write to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

impl LogConfig {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbosity: if quiet {
                -1
            } else if verbose {
                1
            } else {
                0
            },
            log_file: None,
        }
    }

    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    fn min_level(&self) -> Level {
        match self.verbosity {
            v if v < 0 => Level::WARN,
            0 => Level::INFO,
            _ => Level::DEBUG,
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the level chosen by `--verbose`/`--quiet`.
pub fn init_with_config(config: LogConfig) -> crate::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.min_level().into())
        .from_env_lossy();

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    crate::Error::Config(format!(
                        "Failed to open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    let stderr_layer = config.log_file.is_none().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Failed to initialise logging: {}", e)))
}
