//! Document file persistence for GD Notes
//!
//! This module handles loading the shared document from disk (running
//! migrations and normalization on the way in) and writing it back with an
//! atomic replace, so the file on disk is always either the previous or the
//! new complete version.

use super::document::{AppDocument, DocumentDraft};
use super::migrate::migrate;
use super::normalize::normalize_document;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use time::OffsetDateTime;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Subdirectory of the data directory that holds the document
pub const SETTINGS_DIR: &str = "settings";

/// Document file name
pub const DOCUMENT_FILE_NAME: &str = "appData.json";

/// Prefix for temporary files created during atomic writes
const TEMP_PREFIX: &str = ".appData.json.";

/// Get the path of the document inside `data_dir`.
pub fn document_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_DIR).join(DOCUMENT_FILE_NAME)
}

/// Ensure the directory containing `path` exists, creating it if necessary.
fn ensure_parent_dir(path: &Path) -> Result<PathBuf> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .ok_or(Error::DataDirNotFound)?;

    if !dir.exists() {
        debug!("Creating data directory: {}", dir.display());
        fs::create_dir_all(&dir).map_err(|e| Error::DocumentSave {
            path: dir.clone(),
            source: Box::new(e),
        })?;
    }

    Ok(dir)
}

// ─────────────────────────────────────────────────────────────────────────────
// Load Document
// ─────────────────────────────────────────────────────────────────────────────

/// A document read from disk and brought up to the current schema.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: AppDocument,
    /// `firstLaunchEver` as recorded before any migration touched the file
    pub first_launch_ever: bool,
    /// Whether migration or default-filling changed anything
    pub changed: bool,
}

/// Load the document at `path`.
///
/// # Behavior
///
/// 1. If the file doesn't exist or is empty, returns `Ok(None)`
/// 2. If the file is valid, migrates and normalizes it
/// 3. If the file is unreadable or invalid, returns the error; the caller
///    decides how to recover
pub fn load_document(path: &Path, now: OffsetDateTime) -> Result<Option<LoadedDocument>> {
    if !path.exists() {
        debug!("Document not found at {}", path.display());
        return Ok(None);
    }

    debug!("Loading document from: {}", path.display());

    let contents = fs::read_to_string(path).map_err(|e| Error::DocumentLoad {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    if contents.trim().is_empty() {
        warn!("Document at {} is empty, treating as new", path.display());
        return Ok(None);
    }

    let loaded = parse_document(&contents, now)?;
    info!(
        "Document loaded from {} ({} tabs)",
        path.display(),
        loaded.document.tabs.len()
    );
    Ok(Some(loaded))
}

/// Parse, migrate and normalize document text.
pub fn parse_document(contents: &str, now: OffsetDateTime) -> Result<LoadedDocument> {
    let mut value: serde_json::Value = serde_json::from_str(contents)?;
    let migrated = migrate(&mut value)?;

    let draft: DocumentDraft = serde_json::from_value(value.clone())?;
    let document = normalize_document(draft, now);
    let first_launch_ever = document.global_settings.first_launch_ever;

    let filled = serde_json::to_value(&document)? != value;
    if filled {
        debug!("Document was missing fields; defaults filled in");
    }

    Ok(LoadedDocument {
        document,
        first_launch_ever,
        changed: migrated || filled,
    })
}

/// Move an unreadable document aside so the next write does not destroy it.
///
/// Returns the new location, or `None` if the file could not be moved.
pub fn quarantine_corrupt(path: &Path, now: OffsetDateTime) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let target = path.with_file_name(format!("{}.corrupt-{}", file_name, now.unix_timestamp()));
    match fs::rename(path, &target) {
        Ok(()) => Some(target),
        Err(e) => {
            warn!("Could not move corrupt document aside: {}", e);
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Save Document
// ─────────────────────────────────────────────────────────────────────────────

/// Write the whole document to `path` atomically.
///
/// The document is serialized to pretty JSON, written to a temporary file in
/// the same directory, flushed to disk, and then renamed over `path`.
///
/// # Errors
///
/// - `Error::DataDirNotFound`: `path` has no parent directory
/// - `Error::DocumentSave`: serialization, write, or rename failed
pub fn save_document(path: &Path, document: &AppDocument) -> Result<()> {
    save_document_with(path, document, |_| Ok(()))
}

/// [`save_document`] with a hook that runs after the temporary file is
/// complete and before it replaces `path`. An error from the hook aborts the
/// write and leaves `path` untouched.
pub(crate) fn save_document_with<F>(path: &Path, document: &AppDocument, before_commit: F) -> Result<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let dir = ensure_parent_dir(path)?;
    let save_err = |e: Box<dyn std::error::Error + Send + Sync>| Error::DocumentSave {
        path: path.to_path_buf(),
        source: e,
    };

    debug!("Saving document to: {}", path.display());

    let json = serde_json::to_string_pretty(document).map_err(|e| save_err(Box::new(e)))?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(&dir)
        .map_err(|e| save_err(Box::new(e)))?;
    temp.write_all(json.as_bytes())
        .map_err(|e| save_err(Box::new(e)))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| save_err(Box::new(e)))?;

    before_commit(temp.path()).map_err(|e| save_err(Box::new(e)))?;

    commit(temp, path).map_err(save_err)?;

    debug!("Document saved to {}", path.display());
    Ok(())
}

fn commit(temp: NamedTempFile, path: &Path) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    temp.persist(path)
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e.error) })?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
