//! Progress extraction from downloader output
//!
//! Output flows through two stages:
//!
//! - [`LineSplitter`] turns raw, arbitrarily chunked bytes into whole lines
//! - [`ProgressExtractor`] appends each line to the job log and asks a
//!   [`ProgressMatcher`] for a percentage marker
//!
//! The matcher is the only piece that knows the external tool's log format.

mod lines;
mod matcher;

pub use lines::LineSplitter;
pub use matcher::{ProgressMatcher, YtDlpProgressMatcher};

use crate::types::ProgressEvent;
use futures::{Stream, StreamExt};
use std::sync::Arc;

/// Accumulates a job's log and converts marker lines into fractions
pub struct ProgressExtractor {
    matcher: Arc<dyn ProgressMatcher>,
    log: String,
}

impl ProgressExtractor {
    /// Create an extractor with an empty log
    pub fn new(matcher: Arc<dyn ProgressMatcher>) -> Self {
        Self {
            matcher,
            log: String::new(),
        }
    }

    /// Append one output line and return `(full log, fraction)`
    ///
    /// The fraction is the matched percentage divided by 100 and clamped to
    /// [0, 1], or 0.0 when the line carries no marker. Unmatched lines are not
    /// an error.
    pub fn feed(&mut self, line: &str) -> (String, f64) {
        self.append(line);
        let fraction = self
            .matcher
            .match_percent(line)
            .map(|pct| (pct / 100.0).clamp(0.0, 1.0))
            .unwrap_or(0.0);
        (self.log.clone(), fraction)
    }

    /// Append a status line that is not downloader output
    pub fn note(&mut self, line: &str) -> String {
        self.append(line);
        self.log.clone()
    }

    /// Full log accumulated so far
    pub fn log(&self) -> &str {
        &self.log
    }

    fn append(&mut self, line: &str) {
        self.log.push_str(line);
        if !line.ends_with('\n') {
            self.log.push('\n');
        }
    }
}

/// Drain a progress stream and keep only its final event
///
/// Suits consumers that only render the latest state.
pub async fn last_event<S>(stream: S) -> Option<ProgressEvent>
where
    S: Stream<Item = ProgressEvent>,
{
    stream
        .fold(None, |_, event| async move { Some(event) })
        .await
}
