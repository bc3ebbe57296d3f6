//! Sequential batch execution with combined progress
//!
//! Job `i` of `N` reports `((i - 1) + job_fraction) / N`. A job's stream is
//! drained completely before the next job is created.

use super::ProgressStream;
use super::job::{JobContext, SingleJob};
use crate::error::{Error, FailureKind};
use crate::types::{BatchState, DownloadOptions, DownloadRequest, ProgressEvent};
use futures::StreamExt;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

enum Phase {
    Starting,
    Running(ProgressStream),
    Finished,
    Done,
}

pub(crate) struct BatchJob {
    ctx: JobContext,
    urls: Vec<String>,
    options: DownloadOptions,
    cancel: CancellationToken,
    state: BatchState,
    failed: usize,
    phase: Phase,
    pending: VecDeque<ProgressEvent>,
}

impl BatchJob {
    pub(crate) fn new(
        ctx: JobContext,
        urls: Vec<String>,
        options: DownloadOptions,
        cancel: CancellationToken,
    ) -> Self {
        let total = urls.len();
        Self {
            ctx,
            urls,
            options,
            cancel,
            state: BatchState::new(total),
            failed: 0,
            phase: Phase::Starting,
            pending: VecDeque::new(),
        }
    }

    pub(crate) async fn next_event(&mut self) -> Option<ProgressEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Starting => self.start(),
                Phase::Running(inner) => self.step(inner).await,
                Phase::Finished => self.finish(),
                Phase::Done => return None,
            }
        }
    }

    fn start(&mut self) {
        if self.urls.is_empty() {
            let err = Error::validation("urls", "❌ No valid URLs found!");
            self.pending
                .push_back(ProgressEvent::failed(err.to_string(), 0.0, &err));
            return;
        }

        info!(total = self.state.total, "starting batch download");
        self.pending.push_back(ProgressEvent::running(
            format!("🔄 Processing {} URLs\n", self.state.total),
            0.0,
        ));
        self.begin_job(1);
    }

    /// Queue the "processing i/N" marker and create job `index`
    fn begin_job(&mut self, index: usize) {
        self.state.index = index;
        self.state.current = None;
        let position = self.state.position();
        let url = self.urls[index - 1].clone();

        debug!(index, total = self.state.total, url = %url, "starting batch job");

        let mut marker = ProgressEvent::running(
            format!("\n{position} Processing: {url}\n"),
            self.state.overall_progress(0.0),
        );
        marker.batch = Some(position);
        self.pending.push_back(marker);

        let job = SingleJob::new(
            self.ctx.clone(),
            DownloadRequest::new(url, self.options.clone()),
            self.cancel.child_token(),
        );
        self.phase = Phase::Running(super::job_stream(job));
    }

    async fn step(&mut self, mut inner: ProgressStream) {
        match inner.next().await {
            Some(event) => {
                let position = self.state.position();
                let remapped = ProgressEvent {
                    text: format!("{position} {}", event.text),
                    fraction: self.state.overall_progress(event.fraction),
                    status: event.status.clone(),
                    batch: Some(position),
                };
                self.state.current = Some(event);
                self.pending.push_back(remapped);
                self.phase = Phase::Running(inner);
            }
            None => {
                if self
                    .state
                    .current
                    .as_ref()
                    .is_some_and(|last| last.failure().is_some())
                {
                    self.failed += 1;
                }

                if self.cancel.is_cancelled() {
                    self.cancelled();
                } else if self.state.index < self.state.total {
                    self.begin_job(self.state.index + 1);
                } else {
                    self.phase = Phase::Finished;
                }
            }
        }
    }

    fn cancelled(&mut self) {
        // A job cut short by the cancel does not count as finished
        let interrupted = self
            .state
            .current
            .as_ref()
            .is_some_and(|last| last.failure() == Some(FailureKind::Cancelled));
        let finished = if interrupted {
            self.state.index.saturating_sub(1)
        } else {
            self.state.index
        };
        info!(
            completed = finished,
            total = self.state.total,
            "batch cancelled"
        );
        let fraction = self.state.overall_progress(
            self.state.current.as_ref().map_or(0.0, |event| event.fraction),
        );
        self.pending.push_back(ProgressEvent::failed(
            format!(
                "\n❌ Batch cancelled after {finished} of {} downloads.\n",
                self.state.total
            ),
            fraction,
            &Error::Cancelled,
        ));
    }

    fn finish(&mut self) {
        let total = self.state.total;
        info!(total, failed = self.failed, "batch finished");

        let text = if self.failed > 0 {
            format!("\n✅ All {total} downloads processed ({} failed).\n", self.failed)
        } else {
            format!("\n✅ All {total} downloads completed!\n")
        };
        self.pending.push_back(ProgressEvent::completed(text));
    }
}
