use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

fn expand_tilde(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn ensure_dir(path: PathBuf) -> PathBuf {
    if !path.exists()
        && let Err(e) = std::fs::create_dir_all(&path)
    {
        tracing::warn!("Failed to create directory {:?}: {}", path, e);
    }
    path
}

/// Root directory for everything the server writes to disk.
///
/// `BOARDFLOW_ASSET_DIR` wins when set. Debug builds otherwise use
/// `dev_assets/` at the workspace root so local runs never touch the
/// user's data directory.
pub fn asset_dir() -> PathBuf {
    let path = if let Ok(custom) = std::env::var("BOARDFLOW_ASSET_DIR") {
        expand_tilde(&custom)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("dev", "boardflow", "boardflow")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".boardflow"))
    };

    ensure_dir(path)
}

/// Get the database file path.
///
/// Respects the `BOARDFLOW_DATABASE_PATH` environment variable for custom
/// locations. Supports tilde expansion (e.g., `~/boardflow/db.sqlite`).
///
/// Default: `{asset_dir}/db.sqlite`
pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var("BOARDFLOW_DATABASE_PATH") {
        return expand_tilde(&path);
    }
    asset_dir().join("db.sqlite")
}

/// Directory for rotated log files, `BOARDFLOW_LOG_DIR` or `{asset_dir}/logs`.
pub fn log_dir() -> PathBuf {
    if let Ok(path) = std::env::var("BOARDFLOW_LOG_DIR") {
        return expand_tilde(&path);
    }
    asset_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_database_path_default() {
        // SAFETY: Tests run serially via #[serial] attribute
        unsafe { env::remove_var("BOARDFLOW_DATABASE_PATH") };
        let path = database_path();
        assert!(path.ends_with("db.sqlite"));
    }

    #[test]
    #[serial]
    fn test_database_path_env_override() {
        // SAFETY: Tests run serially via #[serial] attribute
        unsafe { env::set_var("BOARDFLOW_DATABASE_PATH", "/custom/path/boards.db") };
        let path = database_path();
        unsafe { env::remove_var("BOARDFLOW_DATABASE_PATH") };
        assert_eq!(path, PathBuf::from("/custom/path/boards.db"));
    }

    #[test]
    #[serial]
    fn test_database_path_tilde_expansion() {
        // SAFETY: Tests run serially via #[serial] attribute
        unsafe { env::set_var("BOARDFLOW_DATABASE_PATH", "~/boardflow/db.sqlite") };
        let path = database_path();
        unsafe { env::remove_var("BOARDFLOW_DATABASE_PATH") };
        assert!(!path.to_string_lossy().contains('~'));
        assert!(path.is_absolute());
    }

    #[test]
    #[serial]
    fn test_asset_dir_override_is_created() {
        let temp = tempfile::tempdir().unwrap();
        let custom = temp.path().join("assets");
        // SAFETY: Tests run serially via #[serial] attribute
        unsafe { env::set_var("BOARDFLOW_ASSET_DIR", custom.to_str().unwrap()) };
        let dir = asset_dir();
        let logs = log_dir();
        unsafe { env::remove_var("BOARDFLOW_ASSET_DIR") };

        assert_eq!(dir, custom);
        assert!(custom.exists());
        assert_eq!(logs, custom.join("logs"));
    }
}
