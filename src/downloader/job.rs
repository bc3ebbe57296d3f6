//! Single-job state machine
//!
//! A job advances one step per pulled event, so nothing runs ahead of the
//! consumer. Every exit path after a credential is acquired releases it; a job
//! dropped mid-stream releases it through the lease's `Drop` and kills the
//! child through `kill_on_drop`.

use crate::config::{Config, DOWNLOADER_BINARY};
use crate::credentials::{CredentialLease, CredentialVault};
use crate::error::Error;
use crate::launcher::format::DownloaderArgs;
use crate::launcher::{ProcessHandle, ProcessLauncher, ToolCommand};
use crate::progress::{ProgressExtractor, ProgressMatcher};
use crate::types::{DownloadRequest, JobId, ProgressEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared collaborators for a job
#[derive(Clone)]
pub(crate) struct JobContext {
    pub(crate) config: Arc<Config>,
    pub(crate) vault: CredentialVault,
    pub(crate) matcher: Arc<dyn ProgressMatcher>,
    pub(crate) launcher: ProcessLauncher,
}

enum Phase {
    Pending(DownloadRequest),
    Streaming(Box<RunningJob>),
    Done,
}

/// State held while the downloader process is producing output
struct RunningJob {
    job_id: JobId,
    process: ProcessHandle,
    credential: Option<CredentialLease>,
    extractor: ProgressExtractor,
    high_water: f64,
}

impl RunningJob {
    /// Release the credential (if any) and report whether one was held
    fn release_credential(&mut self) -> bool {
        match self.credential.take() {
            Some(lease) => {
                lease.release();
                true
            }
            None => false,
        }
    }

    /// Fraction that never moves backwards within the job
    fn advance(&mut self, raw: f64) -> f64 {
        if raw > self.high_water {
            self.high_water = raw;
        }
        self.high_water
    }
}

enum Step {
    Line(Option<std::io::Result<String>>),
    Cancelled,
}

pub(crate) struct SingleJob {
    ctx: JobContext,
    cancel: CancellationToken,
    phase: Phase,
    pending: VecDeque<ProgressEvent>,
}

impl SingleJob {
    pub(crate) fn new(ctx: JobContext, request: DownloadRequest, cancel: CancellationToken) -> Self {
        Self {
            ctx,
            cancel,
            phase: Phase::Pending(request),
            pending: VecDeque::new(),
        }
    }

    /// Produce the next event, or `None` once the job has ended
    pub(crate) async fn next_event(&mut self) -> Option<ProgressEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Pending(request) => self.start(request).await,
                Phase::Streaming(running) => self.step(running).await,
                Phase::Done => return None,
            }
        }
    }

    async fn start(&mut self, request: DownloadRequest) {
        let (url, mode) = match request.validate() {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "rejected download request");
                self.pending.push_back(ProgressEvent::failed(e.to_string(), 0.0, &e));
                return;
            }
        };

        let output_dir = request.options.output_dir.clone();
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            let err = Error::validation(
                "output_dir",
                format!("❌ Failed to create output directory: {e}"),
            );
            self.pending.push_back(ProgressEvent::failed(err.to_string(), 0.0, &err));
            return;
        }

        if self.cancel.is_cancelled() {
            let err = Error::Cancelled;
            self.pending
                .push_back(ProgressEvent::failed("❌ Download cancelled", 0.0, &err));
            return;
        }

        let job_id = JobId::new();
        let mut extractor = ProgressExtractor::new(self.ctx.matcher.clone());

        let credential = match request.options.credential_payload() {
            Some(payload) => match self.ctx.vault.acquire(&job_id, payload).await {
                Ok(lease) => {
                    let text = extractor
                        .note("🔒 Using secure cookies (will be deleted after download)");
                    self.pending.push_back(ProgressEvent::running(text, 0.0));
                    Some(lease)
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "failed to write cookie file");
                    self.ctx.vault.release(&job_id);
                    let text = extractor.note(&format!("❌ Failed to process cookies: {e}"));
                    self.pending.push_back(ProgressEvent::failed(text, 0.0, &e));
                    return;
                }
            },
            None => None,
        };

        let tools = &self.ctx.config.tools;
        let command = ToolCommand::resolve(
            tools.downloader_path.as_deref(),
            DOWNLOADER_BINARY,
            &tools.downloader_args,
            tools.search_path,
        );
        let args = DownloaderArgs {
            url: &url,
            mode,
            output_dir: &output_dir,
            job_id: &job_id,
            cookie_file: credential.as_ref().map(CredentialLease::path),
            extra_args: &request.options.extra_args,
        }
        .build(&self.ctx.config.download);

        let text = extractor.note(&format!("🚀 Starting download: {url}"));
        self.pending.push_back(ProgressEvent::running(text, 0.0));

        info!(
            job_id = %job_id,
            program = %command.display_name(),
            args = %args.join(" "),
            matcher = self.ctx.matcher.name(),
            "executing downloader"
        );

        let process = match self.ctx.launcher.start(&command, &args) {
            Ok(process) => process,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "downloader launch failed");
                if let Some(lease) = credential {
                    lease.release();
                }
                let text = extractor.note(&format!("❌ Launch failed: {e}"));
                self.pending.push_back(ProgressEvent::failed(text, 0.0, &e));
                return;
            }
        };

        self.phase = Phase::Streaming(Box::new(RunningJob {
            job_id,
            process,
            credential,
            extractor,
            high_water: 0.0,
        }));
    }

    async fn step(&mut self, mut running: Box<RunningJob>) {
        let step = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Step::Cancelled,
            line = running.process.next_line() => Step::Line(line),
        };

        match step {
            Step::Line(Some(Ok(line))) => {
                let (text, raw) = running.extractor.feed(&line);
                let fraction = running.advance(raw);
                self.pending.push_back(ProgressEvent::running(text, fraction));
                self.phase = Phase::Streaming(running);
            }
            Step::Line(Some(Err(e))) => {
                warn!(job_id = %running.job_id, error = %e, "downloader output stream failed");
                running.process.kill().await;
                running.release_credential();
                let err = Error::StreamFailed(e.to_string());
                let text = running.extractor.note(&format!("❌ {err}"));
                let fraction = running.high_water;
                self.pending.push_back(ProgressEvent::failed(text, fraction, &err));
            }
            Step::Line(None) => self.finish(running).await,
            Step::Cancelled => self.cancelled(running).await,
        }
    }

    async fn cancelled(&mut self, mut running: Box<RunningJob>) {
        info!(job_id = %running.job_id, "download cancelled, terminating downloader");
        running.process.kill().await;
        let had_cookies = running.release_credential();
        let mut message = "❌ Download cancelled.".to_string();
        if had_cookies {
            message.push_str(" Cookies securely deleted.");
        }
        let text = running.extractor.note(&message);
        let fraction = running.high_water;
        self.pending
            .push_back(ProgressEvent::failed(text, fraction, &Error::Cancelled));
    }

    /// Output has ended; wait for the exit status unless cancelled first
    async fn finish(&mut self, mut running: Box<RunningJob>) {
        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            status = running.process.wait() => Some(status),
        };
        let Some(status) = status else {
            return self.cancelled(running).await;
        };

        let had_cookies = running.release_credential();
        let cookie_note = if had_cookies {
            " Cookies securely deleted."
        } else {
            ""
        };

        let event = match status {
            Ok(status) if status.success() => {
                info!(job_id = %running.job_id, code = ?status.code(), "download completed");
                let text = running
                    .extractor
                    .note(&format!("\n✅ Download completed.{cookie_note}"));
                ProgressEvent::completed(text)
            }
            Ok(status) => {
                warn!(job_id = %running.job_id, code = ?status.code(), "downloader exited unsuccessfully");
                let err = Error::DownloadFailed {
                    exit_code: status.code(),
                };
                let text = running
                    .extractor
                    .note(&format!("\n❌ Download failed ({err}).{cookie_note}"));
                ProgressEvent::failed(text, 1.0, &err)
            }
            Err(e) => {
                warn!(job_id = %running.job_id, error = %e, "failed to wait for downloader");
                let text = running
                    .extractor
                    .note(&format!("\n❌ {e}.{cookie_note}"));
                ProgressEvent::failed(text, 1.0, &e)
            }
        };
        self.pending.push_back(event);
    }
}
