//! # secure-media-dl
//!
//! Backend library that drives an external media downloader and streams its
//! output back as incremental progress.
//!
//! ## Design Philosophy
//!
//! secure-media-dl is designed to be:
//! - **Pull-based** - Every operation returns a lazy stream of progress events; nothing runs ahead of the consumer
//! - **Secret-safe** - Caller-supplied cookies live in a per-job file that is deleted on every exit path
//! - **Library-first** - No UI, purely a Rust crate for embedding behind a form or CLI
//! - **Explicitly configured** - All tool paths and directories come from a [`Config`] value
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use secure_media_dl::{Config, DownloadOptions, DownloadRequest, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() {
//!     let downloader = MediaDownloader::new(Config::default());
//!
//!     let options = DownloadOptions::new("Downloads")
//!         .audio_only()
//!         .with_cookies("# Netscape HTTP Cookie File\n");
//!     let request = DownloadRequest::new("https://example.com/watch?v=abc", options);
//!
//!     let mut events = downloader.run(request);
//!     while let Some(event) = events.next().await {
//!         println!("{:>5.1}% {}", event.fraction * 100.0, event.text.lines().last().unwrap_or(""));
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Per-job cookie file lifecycle
pub mod credentials;
/// Download orchestration (single jobs and batches)
pub mod downloader;
/// Error types
pub mod error;
/// External process launching and downloader arguments
pub mod launcher;
/// Progress extraction from downloader output
pub mod progress;
/// Public tunnel creation
pub mod tunnel;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, ToolsConfig, TunnelConfig};
pub use credentials::{CredentialLease, CredentialVault};
pub use downloader::{MediaDownloader, ProgressStream};
pub use error::{Error, FailureKind, Result};
pub use progress::{ProgressMatcher, YtDlpProgressMatcher};
pub use tokio_util::sync::CancellationToken;
pub use tunnel::{Tunnel, TunnelReporter};
pub use types::{
    BatchPosition, DownloadOptions, DownloadRequest, EventStatus, JobId, MediaMode, ProgressEvent,
};

/// Cancel `token` when the process receives a termination signal.
///
/// Pass the same token to [`MediaDownloader::run_with_cancel`] or
/// [`MediaDownloader::run_batch_with_cancel`] so Ctrl+C kills the downloader
/// and deletes the job's cookie file instead of leaving both behind.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use secure_media_dl::{CancellationToken, Config, DownloadOptions, MediaDownloader, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() {
///     let downloader = MediaDownloader::new(Config::default());
///     let token = CancellationToken::new();
///     tokio::spawn(cancel_on_signal(token.clone()));
///
///     let last = secure_media_dl::progress::last_event(downloader.run_batch_with_cancel(
///         "https://example.com/a\nhttps://example.com/b",
///         DownloadOptions::new("Downloads"),
///         token,
///     ))
///     .await;
///     println!("{:?}", last.map(|event| event.text));
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        signal = termination_signal() => {
            tracing::info!(signal, "termination signal received, cancelling downloads");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

/// Resolve with the name of the first termination signal delivered
#[cfg(unix)]
async fn termination_signal() -> &'static str {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let listen = |kind: SignalKind| {
        signal(kind)
            .inspect_err(|e| tracing::warn!(error = %e, ?kind, "could not register signal handler"))
            .ok()
    };
    async fn recv(signal: &mut Option<Signal>) -> Option<()> {
        match signal {
            Some(signal) => signal.recv().await,
            None => None,
        }
    }

    let mut sigterm = listen(SignalKind::terminate());
    let mut sigint = listen(SignalKind::interrupt());

    tokio::select! {
        Some(()) = recv(&mut sigterm) => "SIGTERM",
        Some(()) = recv(&mut sigint) => "SIGINT",
        else => {
            tracing::error!("no signal handlers registered, falling back to ctrl_c");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
