//! Unix socket path management
//!
//! Used for both forwarder source sockets and the control socket:
//! clearing stale socket files before bind, creating the parent
//! directory, restricting permissions and removing the file afterwards.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Error type for socket path operations
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("Refusing to replace symlink at {path}")]
    SymlinkDetected { path: String },

    #[error("Failed to check existing socket at {path}: {source}")]
    MetadataError { path: String, source: io::Error },

    #[error("Failed to remove existing socket at {path}: {source}")]
    RemoveError { path: String, source: io::Error },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirError { path: String, source: io::Error },

    #[error("Failed to set permissions on socket at {path}: {source}")]
    PermissionError { path: String, source: io::Error },
}

/// Remove a leftover socket file, refusing to follow symlinks.
pub fn remove_existing_socket(path: &Path) -> Result<(), SocketError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => {
            if metadata.file_type().is_symlink() {
                return Err(SocketError::SymlinkDetected {
                    path: path.display().to_string(),
                });
            }
            fs::remove_file(path).map_err(|e| SocketError::RemoveError {
                path: path.display().to_string(),
                source: e,
            })?;
            debug!(path = %path.display(), "Removed stale socket file");
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SocketError::MetadataError {
                path: path.display().to_string(),
                source: e,
            });
        }
    }
    Ok(())
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> Result<(), SocketError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| SocketError::CreateDirError {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Restrict a socket to its owner (0600).
pub fn set_socket_permissions(path: &Path) -> Result<(), SocketError> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        SocketError::PermissionError {
            path: path.display().to_string(),
            source: e,
        }
    })
}

/// Prepare a path for binding: clear any stale socket and create the
/// parent directory.
pub fn prepare_socket_path(path: &Path) -> Result<(), SocketError> {
    remove_existing_socket(path)?;
    ensure_parent_dir(path)?;
    Ok(())
}

/// Removes a socket file when dropped
#[derive(Debug)]
pub struct SocketCleanupGuard {
    path: PathBuf,
}

impl SocketCleanupGuard {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketCleanupGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove socket file during cleanup"
                );
            } else {
                debug!(path = %self.path.display(), "Removed socket file");
            }
        }
    }
}
