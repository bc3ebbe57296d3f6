//! Downloader argument construction
//!
//! Everything the downloader receives is built here as a discrete argument
//! vector; nothing passes through a shell.

use crate::config::DownloadConfig;
use crate::types::{JobId, MediaMode};
use std::path::Path;

/// Format selector for `mode`, best choice first
///
/// | mode | chain |
/// |---|---|
/// | AudioOnly | best audio in the preferred container, else best audio |
/// | VideoOnly | best video+audio in preferred containers, else best video+audio |
/// | AudioAndVideo | as VideoOnly, then best single file in the preferred container, then best single file |
pub fn format_selector(mode: MediaMode, prefs: &DownloadConfig) -> String {
    let audio = &prefs.audio_container;
    let video = &prefs.video_container;
    match mode {
        MediaMode::AudioOnly => format!("bestaudio[ext={audio}]/bestaudio"),
        MediaMode::VideoOnly => {
            format!("bestvideo[ext={video}]+bestaudio[ext={audio}]/bestvideo+bestaudio")
        }
        MediaMode::AudioAndVideo => format!(
            "bestvideo[ext={video}]+bestaudio[ext={audio}]/bestvideo+bestaudio/best[ext={video}]/best"
        ),
    }
}

/// Output filename template: `<dir>/<title>_<job id>.<ext>`
pub fn output_template(output_dir: &Path, job_id: &JobId) -> String {
    output_dir
        .join(format!("%(title)s_{}.%(ext)s", job_id))
        .to_string_lossy()
        .to_string()
}

/// Split caller-supplied extra arguments on whitespace
///
/// No quoting, escaping or validation is applied: `--output "a b"` becomes
/// three tokens. Extra arguments are a trusted testing knob, not a security
/// boundary.
pub fn split_extra_args(extra: &str) -> Vec<String> {
    extra.split_whitespace().map(str::to_string).collect()
}

/// Inputs for one downloader invocation
#[derive(Debug, Clone)]
pub struct DownloaderArgs<'a> {
    /// Source URL (already trimmed)
    pub url: &'a str,
    /// Media selection
    pub mode: MediaMode,
    /// Destination directory
    pub output_dir: &'a Path,
    /// Job identity embedded in the output filename
    pub job_id: &'a JobId,
    /// Credential file, when the job carries cookies
    pub cookie_file: Option<&'a Path>,
    /// Caller-supplied extra arguments
    pub extra_args: &'a [String],
}

impl DownloaderArgs<'_> {
    /// Build the argument vector
    ///
    /// Order: format selector, output template, container merge (unless audio
    /// only), newline progress, cookies, extra arguments, then `--` and the URL.
    /// The `--` keeps a URL that starts with a dash from being read as an option.
    pub fn build(&self, prefs: &DownloadConfig) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            format_selector(self.mode, prefs),
            "-o".to_string(),
            output_template(self.output_dir, self.job_id),
        ];

        if self.mode != MediaMode::AudioOnly {
            args.push("--merge-output-format".to_string());
            args.push(prefs.merge_output_format.clone());
        }

        if prefs.newline_progress {
            args.push("--newline".to_string());
        }

        if let Some(cookie_file) = self.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookie_file.to_string_lossy().to_string());
        }

        args.extend(self.extra_args.iter().cloned());

        args.push("--".to_string());
        args.push(self.url.to_string());
        args
    }
}
