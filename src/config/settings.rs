//! Runtime configuration for GD Notes
//!
//! This module defines the `AppConfig` struct: where the document lives and
//! the timer intervals that drive saving. It is read from an optional
//! `config.json` in the data directory and is never written by the app.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::document_path;

/// Directory name used under the platform config directory.
pub const APP_DIR_NAME: &str = "gd-notes";

/// Application configuration.
///
/// All fields have defaults via the `Default` trait and `#[serde(default)]`,
/// so a partial or empty config file is always accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Root of all persisted data; the document lives in `settings/` below it.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Quiet period after the last edit before a save fires
    pub debounce_ms: u64,

    /// Periodic autosave interval (saves only when there are unsaved edits)
    pub autosave_interval_secs: u64,

    /// Upper bound on how long a closing window waits for its final save
    pub shutdown_flush_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(APP_DIR_NAME),
            debounce_ms: 1000,
            autosave_interval_secs: 10,
            shutdown_flush_timeout_ms: 750,
        }
    }
}

impl AppConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation Constants and Sanitization
    // ─────────────────────────────────────────────────────────────────────────

    /// Minimum debounce interval.
    pub const MIN_DEBOUNCE_MS: u64 = 100;
    /// Maximum debounce interval.
    pub const MAX_DEBOUNCE_MS: u64 = 10_000;
    /// Minimum autosave interval.
    pub const MIN_AUTOSAVE_SECS: u64 = 1;
    /// Maximum autosave interval.
    pub const MAX_AUTOSAVE_SECS: u64 = 600;
    /// Minimum shutdown flush wait.
    pub const MIN_FLUSH_TIMEOUT_MS: u64 = 50;
    /// Maximum shutdown flush wait.
    pub const MAX_FLUSH_TIMEOUT_MS: u64 = 5000;

    /// Clamp every interval to its valid range.
    ///
    /// Useful after loading a config file that may have been edited by hand.
    pub fn sanitize(&mut self) {
        self.debounce_ms = self
            .debounce_ms
            .clamp(Self::MIN_DEBOUNCE_MS, Self::MAX_DEBOUNCE_MS);
        self.autosave_interval_secs = self
            .autosave_interval_secs
            .clamp(Self::MIN_AUTOSAVE_SECS, Self::MAX_AUTOSAVE_SECS);
        self.shutdown_flush_timeout_ms = self
            .shutdown_flush_timeout_ms
            .clamp(Self::MIN_FLUSH_TIMEOUT_MS, Self::MAX_FLUSH_TIMEOUT_MS);
    }

    /// Deserialize and sanitize in one step.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn shutdown_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_flush_timeout_ms)
    }

    /// Full path of the shared document.
    pub fn document_path(&self) -> PathBuf {
        document_path(&self.data_dir)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
