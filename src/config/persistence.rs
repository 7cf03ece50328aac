//! Configuration loading for GD Notes
//!
//! This module resolves the platform-specific data directory and loads the
//! optional `config.json` inside it, falling back to defaults whenever the
//! file is missing or unreadable.

use crate::config::{AppConfig, APP_DIR_NAME};
use crate::error::{Error, Result, ResultExt};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "GD_NOTES_DATA_DIR";

/// Configuration file name, relative to the data directory
const CONFIG_FILE_NAME: &str = "config.json";

// ─────────────────────────────────────────────────────────────────────────────
// Platform-Specific Directory Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Get the data directory for the application.
///
/// `GD_NOTES_DATA_DIR` wins when set. Otherwise:
/// - **Windows**: `%APPDATA%\gd-notes\`
/// - **macOS**: `~/Library/Application Support/gd-notes/`
/// - **Linux**: `~/.config/gd-notes/`
///
/// # Errors
///
/// Returns `Error::DataDirNotFound` if no directory can be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    resolve_data_dir(std::env::var_os(DATA_DIR_ENV), dirs::config_dir())
}

fn resolve_data_dir(env_override: Option<OsString>, platform: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = env_override.filter(|d| !d.is_empty()) {
        debug!("Using data directory from {}", DATA_DIR_ENV);
        return Ok(PathBuf::from(dir));
    }
    platform
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or(Error::DataDirNotFound)
}

/// Path of the config file inside `data_dir`.
pub fn get_config_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

// ─────────────────────────────────────────────────────────────────────────────
// Load Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Load configuration for this run.
///
/// Never fails: an unresolvable data directory or an invalid config file
/// is logged and replaced by defaults.
pub fn load_config() -> AppConfig {
    let data_dir = match get_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            warn!("{}; using ./{}", e, APP_DIR_NAME);
            PathBuf::from(APP_DIR_NAME)
        }
    };

    let mut config = load_config_from(&data_dir).unwrap_or_warn_default(
        AppConfig::default(),
        "Failed to load configuration",
    );
    config.data_dir = data_dir;
    config
}

/// Load `config.json` from `data_dir`, or defaults if there is none.
pub fn load_config_from(data_dir: &Path) -> Result<AppConfig> {
    let config_path = get_config_file_path(data_dir);
    let defaults = || AppConfig {
        data_dir: data_dir.to_path_buf(),
        ..AppConfig::default()
    };

    if !config_path.exists() {
        debug!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
        return Ok(defaults());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| Error::DocumentLoad {
        path: config_path.clone(),
        source: Box::new(e),
    })?;

    if contents.trim().is_empty() {
        debug!("Config file is empty, using defaults");
        return Ok(defaults());
    }

    let mut config = AppConfig::from_json_sanitized(&contents).map_err(|e| {
        warn!(
            "Config file at {} contains invalid JSON: {}",
            config_path.display(),
            e
        );
        Error::DocumentParse {
            message: format!("Failed to parse config file: {}", e),
            source: Some(Box::new(e)),
        }
    })?;
    config.data_dir = data_dir.to_path_buf();

    info!("Configuration loaded from {}", config_path.display());
    Ok(config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_env_override_wins() {
        let dir = resolve_data_dir(
            Some(OsString::from("/custom/notes")),
            Some(PathBuf::from("/home/u/.config")),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/custom/notes"));
    }

    #[test]
    fn test_platform_dir_used_without_override() {
        let dir = resolve_data_dir(None, Some(PathBuf::from("/home/u/.config"))).unwrap();
        assert_eq!(dir, PathBuf::from("/home/u/.config/gd-notes"));

        let empty = resolve_data_dir(Some(OsString::new()), Some(PathBuf::from("/c"))).unwrap();
        assert_eq!(empty, PathBuf::from("/c/gd-notes"));
    }

    #[test]
    fn test_no_directory_is_error() {
        assert!(matches!(
            resolve_data_dir(None, None),
            Err(Error::DataDirNotFound)
        ));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(temp.path()).unwrap();
        assert_eq!(config.data_dir, temp.path());
        assert_eq!(config.debounce_ms, AppConfig::default().debounce_ms);
    }

    #[test]
    fn test_file_is_read_and_sanitized() {
        let temp = TempDir::new().unwrap();
        fs::write(
            get_config_file_path(temp.path()),
            r#"{"autosaveIntervalSecs": 30, "debounceMs": 5}"#,
        )
        .unwrap();

        let config = load_config_from(temp.path()).unwrap();
        assert_eq!(config.autosave_interval_secs, 30);
        assert_eq!(config.debounce_ms, AppConfig::MIN_DEBOUNCE_MS);
        assert_eq!(config.data_dir, temp.path());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(get_config_file_path(temp.path()), "{ nope").unwrap();
        assert!(matches!(
            load_config_from(temp.path()),
            Err(Error::DocumentParse { .. })
        ));
    }
}
