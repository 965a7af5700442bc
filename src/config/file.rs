//! Startup descriptor
//!
//! `grace.toml` lists the pipes the daemon creates when it boots:
//!
//! ```toml
//! [[pipes]]
//! src = "tcp:8080"
//! dst = "tcp:127.0.0.1:9001"
//! ```

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use super::GraceDir;

/// Pipes created on daemon start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartupConfig {
    #[serde(default)]
    pub pipes: Vec<PipeConfig>,
}

/// A single source/destination pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipeConfig {
    pub src: Endpoint,
    pub dst: Endpoint,
}

/// Create the base directory and write a startup descriptor for `pipes`
pub fn setup_dir(dir: &GraceDir, pipes: Vec<PipeConfig>) -> Result<()> {
    fs::create_dir_all(dir.root()).map_err(|e| {
        Error::Config(format!(
            "Failed to create directory {}: {}",
            dir.root().display(),
            e
        ))
    })?;

    let content = toml::to_string_pretty(&StartupConfig { pipes })?;
    fs::write(dir.startup_file(), content).map_err(|e| {
        Error::Config(format!(
            "Failed to write {}: {}",
            dir.startup_file().display(),
            e
        ))
    })?;
    tracing::debug!(path = %dir.startup_file().display(), "Wrote startup descriptor");
    Ok(())
}

/// Load the startup descriptor; a missing file means no pipes
pub fn load_startup(dir: &GraceDir) -> Result<StartupConfig> {
    let path = dir.startup_file();
    if !path.exists() {
        return Ok(StartupConfig::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(toml::from_str(&content)?)
}
