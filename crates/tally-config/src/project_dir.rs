//! Discovery and management of the `.tally/` directory.
//!
//! The `.tally/` directory marks a generator project: it holds
//! `config.yaml` and, by convention, any catalogue overlay files. Paths in
//! the configuration are relative to the directory containing `.tally/`.

use crate::config::ConfigError;
use std::path::{Path, PathBuf};

/// The name of the tally metadata directory.
const TALLY_DIR_NAME: &str = ".tally";

/// The name of the environment variable that can override the tally directory.
const TALLY_DIR_ENV: &str = "TALLY_DIR";

/// Walk up the directory tree from `start` looking for a `.tally/` directory.
///
/// The `TALLY_DIR` environment variable is checked first (highest priority).
///
/// # Examples
///
/// ```no_run
/// use tally_config::project_dir::find_tally_dir;
/// use std::path::Path;
///
/// if let Some(dir) = find_tally_dir(Path::new(".")) {
///     println!("Found tally dir at {}", dir.display());
/// }
/// ```
pub fn find_tally_dir(start: &Path) -> Option<PathBuf> {
    if let Ok(env_dir) = std::env::var(TALLY_DIR_ENV) {
        let env_path = PathBuf::from(&env_dir);
        if env_path.is_dir() {
            return Some(env_path);
        }
    }

    let start = start.canonicalize().ok()?;
    start
        .ancestors()
        .map(|dir| dir.join(TALLY_DIR_NAME))
        .find(|candidate| candidate.is_dir())
}

/// [`find_tally_dir`], converting `None` into [`ConfigError::TallyDirNotFound`].
pub fn find_tally_dir_or_error(start: &Path) -> Result<PathBuf, ConfigError> {
    find_tally_dir(start).ok_or(ConfigError::TallyDirNotFound)
}

/// Ensure a `.tally/` directory exists at the given path.
///
/// If `path` itself is not called `.tally`, a `.tally/` subdirectory is
/// created under it. Returns the path to the `.tally/` directory.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if directory creation fails.
pub fn ensure_tally_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let tally_dir = if path.ends_with(TALLY_DIR_NAME) {
        path.to_path_buf()
    } else {
        path.join(TALLY_DIR_NAME)
    };

    std::fs::create_dir_all(&tally_dir)?;
    Ok(tally_dir)
}

/// The project root a `.tally/` directory belongs to.
pub fn project_root(tally_dir: &Path) -> PathBuf {
    tally_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tally_dir_in_child() {
        let dir = tempfile::tempdir().unwrap();
        let tally = dir.path().join(".tally");
        std::fs::create_dir(&tally).unwrap();

        let child = dir.path().join("models").join("deep");
        std::fs::create_dir_all(&child).unwrap();

        let found = find_tally_dir(&child).unwrap().canonicalize().unwrap();
        assert_eq!(found, tally.canonicalize().unwrap());
    }

    #[test]
    fn test_find_tally_dir_or_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".tally")).unwrap();
        assert!(find_tally_dir_or_error(dir.path()).is_ok());
    }

    #[test]
    fn test_ensure_tally_dir_creates_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = ensure_tally_dir(dir.path()).unwrap();
        assert!(first.is_dir());
        assert!(first.ends_with(".tally"));
        assert_eq!(ensure_tally_dir(dir.path()).unwrap(), first);
        assert_eq!(ensure_tally_dir(&first).unwrap(), first);
    }

    #[test]
    fn test_project_root_is_parent() {
        let root = Path::new("/work/tokenomics");
        assert_eq!(project_root(&root.join(".tally")), root);
    }
}
