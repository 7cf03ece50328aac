//! Centralized error handling for GD Notes
//!
//! This module provides a unified error type that covers all error scenarios
//! in the application: document I/O, parsing, tab lookups, window handling,
//! and the message-passing boundary to the orchestrator.

use log::warn;
use std::fmt;
use std::io;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Custom Result Type Alias
// ─────────────────────────────────────────────────────────────────────────────

/// A specialized `Result` type for the application.
pub type Result<T> = std::result::Result<T, Error>;

/// The centralized error type for the application.
#[derive(Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Document I/O Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Generic I/O error wrapper
    Io(io::Error),

    /// Failed to read the document from disk
    DocumentLoad {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write the document to disk
    DocumentSave {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Document contents could not be parsed (invalid JSON or shape)
    DocumentParse {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Data directory not found or inaccessible
    DataDirNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// No tab with the given id exists
    TabNotFound(String),

    /// Tab data rejected before normalization
    InvalidTab(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Message-Passing Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The orchestrator is no longer running
    Disconnected,

    /// A bounded wait elapsed before a reply arrived
    Timeout,

    /// The window system reported a failure
    Window(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::DocumentParse {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display trait implementation for user-friendly error messages
// ─────────────────────────────────────────────────────────────────────────────
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::DocumentLoad { path, source } => {
                write!(
                    f,
                    "Failed to load notes from '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::DocumentSave { path, source } => {
                write!(
                    f,
                    "Failed to save notes to '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::DocumentParse { message, .. } => {
                write!(f, "Invalid notes document: {}", message)
            }
            Error::DataDirNotFound => write!(f, "Data directory not found"),
            Error::TabNotFound(id) => write!(f, "Tab not found: {}", id),
            Error::InvalidTab(reason) => write!(f, "Invalid tab data: {}", reason),
            Error::Disconnected => write!(f, "Note store is not running"),
            Error::Timeout => write!(f, "Timed out waiting for the note store"),
            Error::Window(msg) => write!(f, "Window error: {}", msg),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// std::error::Error trait implementation for error chaining
// ─────────────────────────────────────────────────────────────────────────────
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::DocumentLoad { source, .. } => Some(source.as_ref()),
            Error::DocumentSave { source, .. } => Some(source.as_ref()),
            Error::DocumentParse { source, .. } => source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::DataDirNotFound
            | Error::TabNotFound(_)
            | Error::InvalidTab(_)
            | Error::Disconnected
            | Error::Timeout
            | Error::Window(_) => None,
        }
    }
}

impl Error {
    /// Whether this error means the user's change may not have been saved.
    ///
    /// Used by windows to decide between "your change may not be saved"
    /// feedback and silently ignoring a lookup miss.
    pub fn is_save_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::DocumentSave { .. }
                | Error::Disconnected
                | Error::Timeout
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graceful Degradation Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for Result to support graceful degradation.
pub trait ResultExt<T> {
    /// If the result is an error, log it at warning level and return the provided default.
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!("{}: {}. Using default.", context, err);
                default
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
