//! Error types for secure-media-dl
//!
//! This module provides the error handling for the library:
//! - A single [`Error`] enum with one variant per failure domain
//! - A `Copy` [`FailureKind`] used to tag terminal progress events
//! - Stable machine-readable codes for hosts that forward failures elsewhere

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for secure-media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for secure-media-dl
///
/// Streams never yield this type directly. When a job fails, the error is
/// rendered into a terminal [`ProgressEvent`](crate::types::ProgressEvent)
/// tagged with [`Error::kind`].
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing input (empty URL, non-creatable directory, malformed port)
    #[error("{message}")]
    Validation {
        /// Human-readable error message
        message: String,
        /// The input field that failed validation (e.g., "url", "port")
        field: Option<String>,
    },

    /// External executable could not be started
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// The program that was being started
        program: String,
        /// The underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// I/O error (credential write, permission change, pipe setup)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required external executable is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// External downloader exited unsuccessfully
    #[error("download failed: {}", exit_code_label(*exit_code))]
    DownloadFailed {
        /// Process exit code (None when terminated by a signal)
        exit_code: Option<i32>,
    },

    /// Reading the child's output failed mid-stream
    #[error("output stream failed: {0}")]
    StreamFailed(String),

    /// Operation cancelled by the caller
    #[error("cancelled")]
    Cancelled,
}

fn exit_code_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Create a validation error for the given input field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Classify this error for event tagging
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Validation { .. } => FailureKind::Validation,
            Error::Launch { .. } => FailureKind::Launch,
            Error::Io(_) => FailureKind::Io,
            Error::NotFound(_) => FailureKind::NotFound,
            Error::DownloadFailed { .. } => FailureKind::DownloadFailed,
            Error::StreamFailed(_) => FailureKind::StreamFailed,
            Error::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Whether the launch failed because the executable does not exist
    pub fn is_missing_executable(&self) -> bool {
        matches!(self, Error::Launch { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
            || matches!(self, Error::NotFound(_))
    }
}

/// Failure classification carried by terminal progress events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Bad or missing input
    Validation,
    /// External executable missing or unstartable
    Launch,
    /// Credential write or permission failure
    Io,
    /// Tunnel executable absent
    NotFound,
    /// Downloader exited with a non-zero code
    DownloadFailed,
    /// Output stream broke mid-job
    StreamFailed,
    /// Caller cancelled the job
    Cancelled,
}

impl FailureKind {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation_error",
            FailureKind::Launch => "launch_error",
            FailureKind::Io => "io_error",
            FailureKind::NotFound => "not_found",
            FailureKind::DownloadFailed => "download_failed",
            FailureKind::StreamFailed => "stream_failed",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
