//! Error types for usntrace
//!
//! One taxonomy for the whole pipeline: fatal acquisition/read errors that
//! abort a scan, and per-item conditions that are absorbed as data.

use thiserror::Error;

/// Main error type for usntrace operations
#[derive(Error, Debug)]
pub enum UsnTraceError {
    #[error("failed to open volume '{0}': {1}")]
    VolumeOpen(String, #[source] std::io::Error),

    #[error("no change journal is active on volume '{0}'")]
    NoJournal(String),

    #[error("access denied to volume '{0}' (administrator rights required)")]
    AccessDenied(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("no volume selected for scanning")]
    NoVolumeSelected,

    #[error("journal query failed on volume '{0}': {1}")]
    JournalQuery(String, String),

    #[error("journal read failed on volume '{0}': {1}")]
    JournalRead(String, String),

    #[error("file reference 0x{0:016X} could not be resolved to a path")]
    PathResolve(u64),

    #[error("duplicate USN {0} within a single journal read")]
    DuplicateUsn(i64),

    #[error("reason label list has {got} entries, expected {expected}")]
    LabelCount { expected: usize, got: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Windows API error: {0}")]
    Windows(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for usntrace operations
pub type Result<T> = std::result::Result<T, UsnTraceError>;

impl UsnTraceError {
    /// True for errors that abort a scan at the acquisition step
    /// (before any journal data has been read).
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            UsnTraceError::VolumeOpen(_, _)
                | UsnTraceError::NoJournal(_)
                | UsnTraceError::AccessDenied(_)
                | UsnTraceError::Unsupported(_)
                | UsnTraceError::NoVolumeSelected
        )
    }
}
