//! Test configuration helpers for pointing the library at scripted tools

use secure_media_dl::{Config, MediaDownloader};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary workspace with scripted tools and an isolated credential dir
pub struct TestEnv {
    /// Root of the workspace (removed on drop)
    pub dir: TempDir,
    /// Configuration wired to the scripted tools
    pub config: Config,
}

impl TestEnv {
    /// Workspace whose downloader runs `downloader_body` and tunnel runs `tunnel_body`
    ///
    /// Scripts are run through `/bin/sh` with their path as the first argument,
    /// so they need no executable bit. `$STATE` points at a scratch directory.
    pub fn new(downloader_body: &str, tunnel_body: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let state = dir.path().join("state");
        let credentials = dir.path().join("credentials");
        std::fs::create_dir_all(&state).expect("failed to create state dir");
        std::fs::create_dir_all(&credentials).expect("failed to create credential dir");

        let downloader = write_script(dir.path(), "yt-dlp.sh", &state, downloader_body);
        let tunnel = write_script(dir.path(), "cloudflared.sh", &state, tunnel_body);

        let mut config = Config::default();
        config.tools.downloader_path = Some(PathBuf::from("/bin/sh"));
        config.tools.downloader_args = vec![downloader.to_string_lossy().to_string()];
        config.tools.tunnel_path = Some(PathBuf::from("/bin/sh"));
        config.tools.tunnel_args = vec![tunnel.to_string_lossy().to_string()];
        config.download.credential_dir = credentials;

        Self { dir, config }
    }

    /// Downloader built from this environment's config
    pub fn downloader(&self) -> MediaDownloader {
        MediaDownloader::new(self.config.clone())
    }

    /// Destination directory for downloads
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("Downloads")
    }

    /// Scratch file written by a script
    pub fn state_file(&self, name: &str) -> PathBuf {
        self.dir.path().join("state").join(name)
    }

    /// Entries left in the credential directory
    pub fn credential_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.config.download.credential_dir)
            .expect("credential dir must exist")
            .map(|entry| entry.expect("bad dir entry").path())
            .collect()
    }
}

fn write_script(root: &Path, name: &str, state: &Path, body: &str) -> PathBuf {
    let path = root.join(name);
    let contents = format!("STATE='{}'\n{body}\n", state.to_string_lossy());
    std::fs::write(&path, contents).expect("failed to write script");
    path
}
