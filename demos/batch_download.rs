//! Batch download example
//!
//! This example demonstrates the core functionality of secure-media-dl:
//! - Building a configuration
//! - Running a batch of URLs with shared options
//! - Rendering the progress stream
//! - Cancelling cleanly on Ctrl+C (the downloader is killed and cookies deleted)
//!
//! Usage:
//!
//! ```text
//! cargo run --example batch_download -- [--audio] [--cookies cookies.txt] URL...
//! ```

use futures::StreamExt;
use secure_media_dl::{
    CancellationToken, Config, DownloadOptions, EventStatus, MediaDownloader, cancel_on_signal,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut audio_only = false;
    let mut cookie_file = None;
    let mut urls = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--audio" => audio_only = true,
            "--cookies" => cookie_file = args.next(),
            _ => urls.push(arg),
        }
    }

    let config = Config::default();
    let mut options = DownloadOptions::new(config.download.default_output_dir.clone());
    if audio_only {
        options = options.audio_only();
    }
    if let Some(path) = cookie_file {
        options = options.with_cookies(std::fs::read_to_string(path)?);
    }

    let downloader = MediaDownloader::new(config);
    let token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(token.clone()));

    let mut events = downloader.run_batch_with_cancel(&urls.join("\n"), options, token);
    while let Some(event) = events.next().await {
        // Event text is the whole log so far; show only its newest line
        let last_line = event.text.lines().last().unwrap_or_default();
        println!("{:>6.1}% {last_line}", event.fraction * 100.0);

        if let EventStatus::Failed { kind, message } = &event.status
            && event.batch.is_none()
        {
            eprintln!("batch failed ({kind}): {message}");
        }
    }

    Ok(())
}
