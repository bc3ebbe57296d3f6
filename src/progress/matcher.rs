//! Percentage marker detection

use regex::Regex;
use std::sync::LazyLock;

/// Extracts a completion percentage from one line of downloader output
///
/// The orchestration logic depends only on this trait, so a change in the
/// external tool's log format means swapping the matcher, nothing else.
pub trait ProgressMatcher: Send + Sync {
    /// Percentage (0–100, unclamped) found on the line, if any
    fn match_percent(&self, line: &str) -> Option<f64>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

static YTDLP_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\[download\]\s+([0-9.]+)%").unwrap()
});

/// Matches yt-dlp's `[download]  42.3% of ...` progress lines
#[derive(Clone, Copy, Debug, Default)]
pub struct YtDlpProgressMatcher;

impl ProgressMatcher for YtDlpProgressMatcher {
    fn match_percent(&self, line: &str) -> Option<f64> {
        YTDLP_PERCENT
            .captures(line)?
            .get(1)?
            .as_str()
            .parse::<f64>()
            .ok()
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_standard_progress_line() {
        let m = YtDlpProgressMatcher;
        assert_eq!(
            m.match_percent("[download]  37.5% of 10.00MiB at 1.00MiB/s ETA 00:06"),
            Some(37.5)
        );
        assert_eq!(m.match_percent("[download] 100% of 10.00MiB"), Some(100.0));
    }

    #[test]
    fn ignores_non_progress_lines() {
        let m = YtDlpProgressMatcher;
        assert_eq!(m.match_percent("[youtube] abc: Downloading webpage"), None);
        assert_eq!(m.match_percent("[download] Destination: video.mp4"), None);
        assert_eq!(m.match_percent("50% done"), None);
    }

    #[test]
    fn malformed_number_is_not_a_match() {
        assert_eq!(YtDlpProgressMatcher.match_percent("[download] ...%"), None);
        assert_eq!(YtDlpProgressMatcher.match_percent("[download] 1.2.3%"), None);
    }
}
