//! Configuration for grace
//!
//! Everything the daemon needs lives in one base directory (default
//! `~/.grace`):
//!
//! | File           | Purpose                                  |
//! |----------------|------------------------------------------|
//! | `grace.toml`   | startup descriptor: pipes added on boot  |
//! | `grace.socket` | control socket                           |
//! | `grace.pid`    | daemon process id                        |
//! | `grace.log`    | daemon log                               |

mod file;

use std::path::{Path, PathBuf};

pub use file::{PipeConfig, StartupConfig, load_startup, setup_dir};

/// Default base directory, before expansion
pub const DEFAULT_DIR: &str = "~/.grace";

const STARTUP_FILE_NAME: &str = "grace.toml";
const SOCKET_FILE_NAME: &str = "grace.socket";
const PID_FILE_NAME: &str = "grace.pid";
const LOG_FILE_NAME: &str = "grace.log";

/// Layout of a grace base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraceDir {
    root: PathBuf,
}

impl GraceDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Expand `~` and environment variables in `dir`
    pub fn from_arg(dir: &str) -> crate::Result<Self> {
        Ok(Self::new(expand_path(dir)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn startup_file(&self) -> PathBuf {
        self.root.join(STARTUP_FILE_NAME)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.root.join(SOCKET_FILE_NAME)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join(PID_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOG_FILE_NAME)
    }
}

/// Expand environment variables and tilde in a path string
pub fn expand_path(path: &str) -> crate::Result<String> {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .map_err(|e| crate::Error::Config(format!("Failed to expand path '{}': {}", path, e)))
}

/// Parse a duration string like "1h", "30m", "10s", "1d"
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::Config("Empty duration string".to_string()));
    }

    let (num_str, unit) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, "s"));

    let num: u64 = num_str.trim().parse().map_err(|e| {
        crate::Error::Config(format!("Invalid duration number '{}': {}", num_str, e))
    })?;

    let multiplier: u64 = match unit.to_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60 * 60,
        "d" | "day" | "days" => 60 * 60 * 24,
        _ => {
            return Err(crate::Error::Config(format!(
                "Unknown duration unit '{}' in '{}'",
                unit, s
            )));
        }
    };
    let seconds = num
        .checked_mul(multiplier)
        .ok_or_else(|| crate::Error::Config(format!("Duration '{}' is too large", s)))?;

    Ok(std::time::Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_grace_dir_layout() {
        let dir = GraceDir::new("/var/lib/grace");
        assert_eq!(dir.root(), Path::new("/var/lib/grace"));
        assert_eq!(dir.socket_path(), PathBuf::from("/var/lib/grace/grace.socket"));
        assert_eq!(dir.pid_file(), PathBuf::from("/var/lib/grace/grace.pid"));
        assert_eq!(dir.log_file(), PathBuf::from("/var/lib/grace/grace.log"));
        assert_eq!(dir.startup_file(), PathBuf::from("/var/lib/grace/grace.toml"));
    }

    #[test]
    fn test_default_dir_expands_home() {
        let dir = GraceDir::from_arg(DEFAULT_DIR).unwrap();
        assert!(dir.root().is_absolute());
        assert!(dir.root().ends_with(".grace"));
    }

    #[test]
    fn test_expand_path_env_var() {
        let home = std::env::var("HOME").unwrap();
        assert_eq!(expand_path("$HOME/grace").unwrap(), format!("{}/grace", home));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2min").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        let err = parse_duration("999999999999999999d").unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }
}
