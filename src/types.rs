//! Core types for secure-media-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, FailureKind, Result};
use crate::launcher::format::split_extra_args;

/// Unique identifier for a single download job
///
/// Namespaces the job's credential file and output filename so sequential
/// jobs writing to the same directory never collide. Never reused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which media streams to download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
    /// Audio track only
    AudioOnly,
    /// Video with its audio, no single-file fallback
    VideoOnly,
    /// Best available, falling back to single-file streams
    #[default]
    AudioAndVideo,
}

impl MediaMode {
    /// Resolve the mode from the two independent checkbox-style flags
    ///
    /// Setting both flags is rejected.
    pub fn from_flags(audio_only: bool, video_only: bool) -> Result<Self> {
        match (audio_only, video_only) {
            (true, true) => Err(Error::validation(
                "mode",
                "❌ Cannot select both 'Audio Only' and 'Video Only'",
            )),
            (true, false) => Ok(MediaMode::AudioOnly),
            (false, true) => Ok(MediaMode::VideoOnly),
            (false, false) => Ok(MediaMode::AudioAndVideo),
        }
    }
}

/// Options shared by single and batch downloads
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Destination directory (created if missing)
    pub output_dir: PathBuf,

    /// Download audio only
    #[serde(default)]
    pub audio_only: bool,

    /// Download video only
    #[serde(default)]
    pub video_only: bool,

    /// Extra downloader arguments, appended verbatim before the URL
    ///
    /// These are not escaped or validated in any way; treat them as a trusted knob.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Netscape-format cookie jar contents (blank counts as absent)
    #[serde(default, skip_serializing)]
    pub cookies: Option<String>,
}

impl DownloadOptions {
    /// Create options targeting the given directory
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Download audio only
    pub fn audio_only(mut self) -> Self {
        self.audio_only = true;
        self
    }

    /// Download video only
    pub fn video_only(mut self) -> Self {
        self.video_only = true;
        self
    }

    /// Set extra arguments from a whitespace-separated string
    pub fn with_extra_args(mut self, extra: &str) -> Self {
        self.extra_args = split_extra_args(extra);
        self
    }

    /// Attach a cookie payload
    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    /// Cookie payload if present and non-blank
    pub fn credential_payload(&self) -> Option<&str> {
        self.cookies.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// A single download job as submitted by the caller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source URL
    pub url: String,
    /// Shared options
    #[serde(flatten)]
    pub options: DownloadOptions,
}

impl DownloadRequest {
    /// Create a request for the given URL
    pub fn new(url: impl Into<String>, options: DownloadOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }

    /// Check the request invariants without touching the filesystem
    ///
    /// Returns the trimmed URL and the resolved media mode.
    pub fn validate(&self) -> Result<(String, MediaMode)> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(Error::validation("url", "❌ URL cannot be empty!"));
        }

        if self.options.output_dir.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(Error::validation(
                "output_dir",
                "❌ Output directory cannot be empty!",
            ));
        }

        let mode = MediaMode::from_flags(self.options.audio_only, self.options.video_only)?;
        Ok((url.to_string(), mode))
    }
}

/// Position of a job inside a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPosition {
    /// 1-based index of the current job
    pub index: usize,
    /// Total number of jobs
    pub total: usize,
}

impl std::fmt::Display for BatchPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}]", self.index, self.total)
    }
}

/// Lifecycle status carried by a progress event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventStatus {
    /// Job still running
    Running,
    /// Job (or batch) finished successfully
    Completed,
    /// Job (or batch) ended with an error
    Failed {
        /// Failure classification
        kind: FailureKind,
        /// Error message
        message: String,
    },
}

/// Unit streamed to the caller
///
/// `text` is the full log accumulated so far for the job, not a delta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Accumulated log text
    pub text: String,
    /// Fraction complete (0.0 to 1.0)
    pub fraction: f64,
    /// Lifecycle status
    #[serde(flatten)]
    pub status: EventStatus,
    /// Batch position for events re-emitted by a batch run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchPosition>,
}

impl ProgressEvent {
    /// Intermediate event
    pub fn running(text: impl Into<String>, fraction: f64) -> Self {
        Self {
            text: text.into(),
            fraction,
            status: EventStatus::Running,
            batch: None,
        }
    }

    /// Successful terminal event
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fraction: 1.0,
            status: EventStatus::Completed,
            batch: None,
        }
    }

    /// Failed terminal event
    pub fn failed(text: impl Into<String>, fraction: f64, error: &Error) -> Self {
        Self {
            text: text.into(),
            fraction,
            status: EventStatus::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
            batch: None,
        }
    }

    /// Whether this event ends its job's sequence
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, EventStatus::Running)
    }

    /// Failure classification, if this is a failed event
    pub fn failure(&self) -> Option<FailureKind> {
        match &self.status {
            EventStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// View as the `(text, fraction)` pair
    pub fn as_pair(&self) -> (&str, f64) {
        (&self.text, self.fraction)
    }
}

/// Progress bookkeeping for a running batch
#[derive(Clone, Debug)]
pub struct BatchState {
    /// Total job count
    pub total: usize,
    /// 1-based index of the current job
    pub index: usize,
    /// Latest event of the current job
    pub current: Option<ProgressEvent>,
}

impl BatchState {
    /// Create state for a batch of `total` jobs, positioned on the first
    pub fn new(total: usize) -> Self {
        Self {
            total,
            index: 1,
            current: None,
        }
    }

    /// Position of the current job
    pub fn position(&self) -> BatchPosition {
        BatchPosition {
            index: self.index,
            total: self.total,
        }
    }

    /// Map a job-local fraction onto the whole batch
    pub fn overall_progress(&self, job_fraction: f64) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let job_fraction = job_fraction.clamp(0.0, 1.0);
        ((self.index - 1) as f64 + job_fraction) / self.total as f64
    }
}

/// Split a newline-separated URL list into trimmed, non-empty entries
pub fn parse_url_list(urls: &str) -> Vec<String> {
    urls.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
