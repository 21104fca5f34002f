//! The `.creditlab` application directory: default config location and logs.
//!
//! It sits under the OS config directory unless `CREDITLAB_CONFIG_HOME` names
//! another base, which is how tests and portable setups isolate their state.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

pub const APP_DIR_NAME: &str = ".creditlab";
/// Replaces the OS config directory as the base of [`APP_DIR_NAME`].
pub const CONFIG_HOME_ENV: &str = "CREDITLAB_CONFIG_HOME";
const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config directory found; set {CONFIG_HOME_ENV} to choose one")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The application root, created on first use.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = config_base_dir().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(root_under(&base))
}

/// Per-run log files live here.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join(LOGS_DIR_NAME))
}

fn root_under(base: &Path) -> PathBuf {
    base.join(APP_DIR_NAME)
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    match std::fs::create_dir_all(&path) {
        Ok(()) => Ok(path),
        Err(source) => Err(AppDirError::CreateDir { path, source }),
    }
}

fn config_base_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_HOME_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn root_and_logs_nest_under_base() {
        let base = tempdir().unwrap();
        let root = ensure_dir(root_under(base.path())).unwrap();
        assert_eq!(root, base.path().join(".creditlab"));
        assert!(root.is_dir());
        let logs = ensure_dir(root.join(LOGS_DIR_NAME)).unwrap();
        assert!(logs.is_dir());
    }

    #[test]
    fn create_failure_names_the_path() {
        let base = tempdir().unwrap();
        let blocker = base.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = ensure_dir(blocker.join("child")).unwrap_err();
        assert!(matches!(err, AppDirError::CreateDir { ref path, .. } if path.ends_with("child")));
    }
}
