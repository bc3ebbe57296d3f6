//! Download orchestration entry point.
//!
//! The `MediaDownloader` struct and its operations are organized by concern:
//! - [`job`] - Single download: validate, acquire cookies, launch, stream, clean up
//! - [`batch`] - Sequential batch with combined progress
//!
//! Both return a [`ProgressStream`]: a lazy, finite stream of
//! [`ProgressEvent`]s that ends with exactly one terminal event per job.

mod batch;
mod job;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::credentials::CredentialVault;
use crate::error::Result;
use crate::launcher::ProcessLauncher;
use crate::progress::{self, ProgressMatcher, YtDlpProgressMatcher};
use crate::tunnel::{Tunnel, TunnelReporter};
use crate::types::{DownloadOptions, DownloadRequest, ProgressEvent, parse_url_list};
use batch::BatchJob;
use futures::stream::{BoxStream, StreamExt};
use job::{JobContext, SingleJob};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lazy, finite stream of progress events
pub type ProgressStream = BoxStream<'static, ProgressEvent>;

fn job_stream(job: SingleJob) -> ProgressStream {
    futures::stream::unfold(job, |mut job| async move {
        let event = job.next_event().await?;
        Some((event, job))
    })
    .boxed()
}

fn batch_stream(batch: BatchJob) -> ProgressStream {
    futures::stream::unfold(batch, |mut batch| async move {
        let event = batch.next_event().await?;
        Some((event, batch))
    })
    .boxed()
}

/// Main downloader instance (cloneable - shared state is Arc-wrapped)
///
/// All configuration is carried by the instance; nothing is read from
/// process-wide state.
#[derive(Clone)]
pub struct MediaDownloader {
    /// Configuration (wrapped in Arc for sharing across jobs)
    pub(crate) config: Arc<Config>,
    /// Per-job cookie file storage
    pub(crate) vault: CredentialVault,
    /// Progress marker matcher (trait object so the log format can be swapped)
    pub(crate) matcher: Arc<dyn ProgressMatcher>,
    /// Launcher for downloader processes
    pub(crate) launcher: ProcessLauncher,
}

impl MediaDownloader {
    /// Create a downloader from configuration
    pub fn new(config: Config) -> Self {
        let vault = CredentialVault::new(config.credential_dir().clone());
        Self {
            config: Arc::new(config),
            vault,
            matcher: Arc::new(YtDlpProgressMatcher),
            launcher: ProcessLauncher::new(),
        }
    }

    /// Replace the progress matcher
    pub fn with_matcher(mut self, matcher: Arc<dyn ProgressMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Credential vault used by jobs
    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    fn context(&self) -> JobContext {
        JobContext {
            config: self.config.clone(),
            vault: self.vault.clone(),
            matcher: self.matcher.clone(),
            launcher: self.launcher.clone(),
        }
    }

    /// Run one download
    ///
    /// Nothing happens until the stream is polled. Dropping the stream early
    /// kills the downloader and deletes the job's cookie file.
    pub fn run(&self, request: DownloadRequest) -> ProgressStream {
        self.run_with_cancel(request, CancellationToken::new())
    }

    /// Run one download that stops when `cancel` fires
    ///
    /// On cancellation the downloader is killed, the cookie file is deleted,
    /// and a terminal `Cancelled` event ends the stream.
    pub fn run_with_cancel(
        &self,
        request: DownloadRequest,
        cancel: CancellationToken,
    ) -> ProgressStream {
        job_stream(SingleJob::new(self.context(), request, cancel))
    }

    /// Run one download to completion and return only its final event
    pub async fn run_to_end(&self, request: DownloadRequest) -> Option<ProgressEvent> {
        progress::last_event(self.run(request)).await
    }

    /// Run every URL in `urls` (one per line) sequentially
    ///
    /// Blank lines are skipped. An empty list yields a single validation
    /// failure with no side effects.
    pub fn run_batch(&self, urls: &str, options: DownloadOptions) -> ProgressStream {
        self.run_batch_with_cancel(urls, options, CancellationToken::new())
    }

    /// Batch variant of [`run_with_cancel`](Self::run_with_cancel)
    ///
    /// Cancelling stops the current job and skips the rest.
    pub fn run_batch_with_cancel(
        &self,
        urls: &str,
        options: DownloadOptions,
        cancel: CancellationToken,
    ) -> ProgressStream {
        batch_stream(BatchJob::new(
            self.context(),
            parse_url_list(urls),
            options,
            cancel,
        ))
    }

    /// Run a batch to completion and return only its final event
    pub async fn run_batch_to_end(
        &self,
        urls: &str,
        options: DownloadOptions,
    ) -> Option<ProgressEvent> {
        progress::last_event(self.run_batch(urls, options)).await
    }

    /// Open a public tunnel to a local port
    pub async fn create_tunnel(&self, port: &str) -> Result<Tunnel> {
        TunnelReporter::new(self.config.clone())
            .create_tunnel(port)
            .await
    }

    /// Open a tunnel and describe the outcome as display text
    pub async fn tunnel_report(&self, port: &str) -> String {
        TunnelReporter::new(self.config.clone()).report(port).await
    }
}
