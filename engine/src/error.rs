//! Error types for the backup engine.
//!
//! The primary error type is `EngineError`, which represents job-level errors
//! that prevent a backup from being planned or executed. Failures while
//! creating a single directory or copying a single file are recorded on the
//! corresponding `BackupItem`, not returned as `EngineError`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid filter or configuration input, detected at construction time
    Configuration,
    /// A path violated a structural contract (e.g. graft outside the source root)
    Path,
    /// The filesystem refused an operation
    Io,
    /// The caller cancelled the operation
    Cancelled,
}

/// Errors that can occur at the job level (preventing execution or recovery).
///
/// Note: EngineError wraps io::Error and is therefore not serializable.
/// Per-item failures are flattened to strings on `BackupItem`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Filter type string is neither REGEX nor KEYWORD
    #[error("invalid filter type '{value}': expected REGEX or KEYWORD")]
    InvalidFilterType { value: String },

    /// Application string is neither FILENAMES nor PATHS
    #[error("invalid filter application '{value}': expected FILENAMES or PATHS")]
    InvalidApplication { value: String },

    /// Item type string is not FILES, DIRECTORY or BOTH
    #[error("invalid filter item type '{value}': expected FILES, DIRECTORY or BOTH")]
    InvalidItemType { value: String },

    /// Regex filter data failed to compile
    #[error("filter '{name}' has an invalid regex '{pattern}': {source}")]
    InvalidRegex {
        name: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A configuration is structurally unusable (e.g. empty name)
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Graft was asked to relocate a path that does not live under its source root
    #[error("cannot graft {}: not under source root {}", path.display(), root.display())]
    NotUnderRoot { path: PathBuf, root: PathBuf },

    /// Source directory does not exist
    #[error("source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source directory is not accessible (permissions)
    #[error("source directory access denied: {}", path.display())]
    SourceAccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to enumerate a directory while scanning the source tree
    #[error("failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory
    #[error("failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read from a source file
    #[error("failed to read file: {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write to a destination file
    #[error("failed to write file: {}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read or write the configuration store
    #[error("configuration store I/O failed: {}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration store contents are not valid JSON for the expected shape
    #[error("configuration store is malformed: {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Path is unusable for the requested role
    #[error("invalid path: {} ({reason})", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Job lifecycle function called in the wrong state
    #[error("job is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// Operation stopped by its cancellation token
    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Classify this error into the engine's error taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidFilterType { .. }
            | Self::InvalidApplication { .. }
            | Self::InvalidItemType { .. }
            | Self::InvalidRegex { .. }
            | Self::InvalidConfiguration { .. }
            | Self::ConfigParse { .. } => ErrorCategory::Configuration,
            Self::NotUnderRoot { .. } | Self::InvalidPath { .. } | Self::InvalidState { .. } => {
                ErrorCategory::Path
            }
            Self::SourceNotFound { .. }
            | Self::SourceAccessDenied { .. }
            | Self::EnumerationFailed { .. }
            | Self::DirectoryCreationFailed { .. }
            | Self::ReadError { .. }
            | Self::WriteError { .. }
            | Self::ConfigIo { .. } => ErrorCategory::Io,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::SourceAccessDenied { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::ConfigIo { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
