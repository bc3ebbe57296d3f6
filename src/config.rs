//! Configuration types for secure-media-dl
//!
//! [`Config`] is an explicit context object: the downloader never reads
//! process-wide state for its tool paths or scratch directories, so tests can
//! point it at a temporary directory and a fake executable.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the downloader executable searched on PATH
pub const DOWNLOADER_BINARY: &str = "yt-dlp";

/// Name of the tunnel executable searched on PATH
pub const TUNNEL_BINARY: &str = "cloudflared";

/// External tool paths and discovery
///
/// Each tool can be given an explicit path plus leading arguments. Leading
/// arguments are placed before anything the library generates, which allows
/// running the downloader through an interpreter (`python3 -m yt_dlp`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the downloader executable (auto-detected if None)
    #[serde(default)]
    pub downloader_path: Option<PathBuf>,

    /// Arguments placed before the generated downloader arguments
    #[serde(default)]
    pub downloader_args: Vec<String>,

    /// Path to the tunnel executable (auto-detected if None)
    #[serde(default)]
    pub tunnel_path: Option<PathBuf>,

    /// Arguments placed before the generated tunnel arguments
    #[serde(default)]
    pub tunnel_args: Vec<String>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader_path: None,
            downloader_args: Vec::new(),
            tunnel_path: None,
            tunnel_args: Vec::new(),
            search_path: true,
        }
    }
}

/// Download behavior configuration (directories, format preferences)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory holding per-job credential files (default: OS temp dir)
    #[serde(default = "default_credential_dir")]
    pub credential_dir: PathBuf,

    /// Destination directory suggested to callers (default: "Downloads")
    #[serde(default = "default_output_dir")]
    pub default_output_dir: PathBuf,

    /// Preferred audio container (default: "m4a")
    #[serde(default = "default_audio_container")]
    pub audio_container: String,

    /// Preferred video container (default: "mp4")
    #[serde(default = "default_video_container")]
    pub video_container: String,

    /// Container that separate video and audio streams are merged into (default: "mp4")
    #[serde(default = "default_video_container")]
    pub merge_output_format: String,

    /// Ask the downloader to print each progress update on its own line (default: true)
    #[serde(default = "default_true")]
    pub newline_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            credential_dir: default_credential_dir(),
            default_output_dir: default_output_dir(),
            audio_container: default_audio_container(),
            video_container: default_video_container(),
            merge_output_format: default_video_container(),
            newline_progress: true,
        }
    }
}

/// Tunnel configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Host the tunnel forwards to (default: "localhost")
    #[serde(default = "default_local_host")]
    pub local_host: String,

    /// Public domain suffix the tunnel URL must end with (default: "trycloudflare.com")
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,

    /// Give up waiting for the URL after this long (None = wait until output ends)
    #[serde(default, with = "optional_duration_serde")]
    pub startup_timeout: Option<Duration>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            local_host: default_local_host(),
            domain_suffix: default_domain_suffix(),
            startup_timeout: None,
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Fields are organized into sub-configs:
/// - [`tools`](ToolsConfig): external binary paths and discovery
/// - [`download`](DownloadConfig): credential dir, format preferences
/// - [`tunnel`](TunnelConfig): tunnel host, domain, timeout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// External tool paths and discovery
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Tunnel settings
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

impl Config {
    /// Directory holding per-job credential files
    pub fn credential_dir(&self) -> &PathBuf {
        &self.download.credential_dir
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_credential_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Downloads")
}

fn default_audio_container() -> String {
    "m4a".to_string()
}

fn default_video_container() -> String {
    "mp4".to_string()
}

fn default_local_host() -> String {
    "localhost".to_string()
}

fn default_domain_suffix() -> String {
    "trycloudflare.com".to_string()
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
