//! Shared test helpers for driving MediaDownloader against a scripted fake downloader.
//!
//! The fake is a shell script run through `/bin/sh` (script path as the
//! leading argument), so it never needs an executable bit. Its prelude records
//! every invocation under `$STATE` before running the per-test body:
//! - `$STATE/args` - arguments of the last invocation, one per line
//! - `$STATE/runs` - `start <url>` per invocation
//! - `$STATE/cookie_path`, `$STATE/seen_cookie` - credential file as seen mid-run

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::types::{DownloadOptions, ProgressEvent};
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PRELUDE: &str = r#"
printf '%s\n' "$@" > "$STATE/args"
cookie=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    --cookies) cookie="$2"; shift 2 ;;
    --) url="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "start $url" >> "$STATE/runs"
if [ -n "$cookie" ]; then
  echo "$cookie" > "$STATE/cookie_path"
  cat "$cookie" > "$STATE/seen_cookie"
fi
"#;

/// Progress lines for a download that succeeds
pub(crate) const SUCCESS_BODY: &str = r#"
echo "[youtube] abc: Downloading webpage"
echo "[download]  10.0% of 1.00MiB at 1.00MiB/s ETA 00:01"
echo "[download]  55.5% of 1.00MiB at 1.00MiB/s ETA 00:01"
echo "[download] 100.0% of 1.00MiB in 00:01"
echo "end $url" >> "$STATE/runs"
"#;

/// A test environment: fake downloader, credential dir and output dir under one tempdir
pub(crate) struct FakeDownloader {
    pub(crate) dir: TempDir,
    pub(crate) downloader: MediaDownloader,
}

impl FakeDownloader {
    /// Fake whose script runs `body` after the recording prelude
    pub(crate) fn new(body: &str) -> Self {
        Self::with_config(body, |_| {})
    }

    /// Like [`new`](Self::new) with a hook to adjust the config
    pub(crate) fn with_config(body: &str, adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        let credentials = dir.path().join("credentials");
        std::fs::create_dir_all(&state).unwrap();
        std::fs::create_dir_all(&credentials).unwrap();

        let script = dir.path().join("fake-yt-dlp.sh");
        let contents = format!(
            "STATE='{}'\n{PRELUDE}\n{body}\n",
            state.to_string_lossy()
        );
        std::fs::write(&script, contents).unwrap();

        let mut config = Config::default();
        config.tools.downloader_path = Some(PathBuf::from("/bin/sh"));
        config.tools.downloader_args = vec![script.to_string_lossy().to_string()];
        config.download.credential_dir = credentials;
        adjust(&mut config);

        Self {
            dir,
            downloader: MediaDownloader::new(config),
        }
    }

    fn state(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Destination directory for downloads (not created up front)
    pub(crate) fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Default options targeting [`output_dir`](Self::output_dir)
    pub(crate) fn options(&self) -> DownloadOptions {
        DownloadOptions::new(self.output_dir())
    }

    /// Lines of `$STATE/runs`
    pub(crate) fn runs(&self) -> Vec<String> {
        read_lines(&self.state().join("runs"))
    }

    /// Arguments of the most recent invocation
    pub(crate) fn last_args(&self) -> Vec<String> {
        read_lines(&self.state().join("args"))
    }

    /// Cookie file contents as read by the script while it ran
    pub(crate) fn seen_cookie(&self) -> Option<String> {
        std::fs::read_to_string(self.state().join("seen_cookie")).ok()
    }

    /// Cookie file path handed to the script
    pub(crate) fn cookie_path(&self) -> Option<PathBuf> {
        std::fs::read_to_string(self.state().join("cookie_path"))
            .ok()
            .map(|s| PathBuf::from(s.trim_end()))
    }

    /// Files currently present in the credential directory
    pub(crate) fn leftover_credentials(&self) -> Vec<PathBuf> {
        let dir = self.downloader.config().credential_dir();
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Drain a progress stream
pub(crate) async fn collect<S>(stream: S) -> Vec<ProgressEvent>
where
    S: Stream<Item = ProgressEvent>,
{
    stream.collect().await
}

/// Assert fractions never decrease
pub(crate) fn assert_monotonic(events: &[ProgressEvent]) {
    for pair in events.windows(2) {
        assert!(
            pair[1].fraction >= pair[0].fraction,
            "fraction went backwards: {} -> {} ({:?})",
            pair[0].fraction,
            pair[1].fraction,
            pair[1].text.lines().last()
        );
    }
}
