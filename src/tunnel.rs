//! Public tunnel creation
//!
//! Launches the tunnel executable for a local port and scans its combined
//! output for the first public URL under the configured domain suffix.
//! Discovery is all-or-nothing: callers get a URL or a typed error, never
//! intermediate output.

use crate::config::{Config, TUNNEL_BINARY};
use crate::error::{Error, Result};
use crate::launcher::{ProcessHandle, ProcessLauncher, ToolCommand};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Output marker a shell prints when the executable does not exist
const MISSING_COMMAND_MARKER: &str = "command not found";

/// A running tunnel
///
/// The child is not killed when this value is dropped; call
/// [`close`](Self::close) to stop forwarding.
#[derive(Debug)]
pub struct Tunnel {
    url: String,
    port: u16,
    child: Child,
    drain: JoinHandle<()>,
}

impl Tunnel {
    /// Public URL forwarding to the local port
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Local port being forwarded
    pub fn port(&self) -> u16 {
        self.port
    }

    /// OS process id of the tunnel, if still running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Stop the tunnel process and its output drain
    pub async fn close(mut self) -> Result<()> {
        info!(url = %self.url, port = self.port, "closing tunnel");
        self.drain.abort();
        match self.child.kill().await {
            Ok(()) => Ok(()),
            // Already exited
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Launches tunnels and reports their public URL
#[derive(Clone, Debug)]
pub struct TunnelReporter {
    config: Arc<Config>,
    launcher: ProcessLauncher,
}

impl TunnelReporter {
    /// Create a reporter; tunnel children outlive their handles
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            launcher: ProcessLauncher::new().detached(),
        }
    }

    /// Start a tunnel for `port` and wait for its public URL
    ///
    /// Fails with a validation error (and spawns nothing) unless `port` is a
    /// decimal TCP port. Fails with [`Error::NotFound`] when the executable is
    /// missing and with [`Error::Launch`] when output ends without a URL or
    /// the configured startup timeout elapses.
    pub async fn create_tunnel(&self, port: &str) -> Result<Tunnel> {
        let port = validate_port(port)?;
        let pattern = url_pattern(&self.config.tunnel.domain_suffix)?;

        let tools = &self.config.tools;
        let command = ToolCommand::resolve(
            tools.tunnel_path.as_deref(),
            TUNNEL_BINARY,
            &tools.tunnel_args,
            tools.search_path,
        );
        let args = tunnel_args(&self.config.tunnel.local_host, port);

        info!(port, program = %command.display_name(), "starting tunnel");

        let mut process = self.launcher.start(&command, &args).map_err(|e| match e {
            Error::Launch { program, source } if source.kind() == std::io::ErrorKind::NotFound => {
                Error::NotFound(program)
            }
            other => other,
        })?;

        let discovered = match self.config.tunnel.startup_timeout {
            Some(limit) => match tokio::time::timeout(limit, scan_for_url(&mut process, &pattern)).await {
                Ok(found) => found,
                Err(_) => Err(startup_timeout_error(&command, limit)),
            },
            None => scan_for_url(&mut process, &pattern).await,
        };

        let url = match discovered {
            Ok(url) => url,
            Err(e) => {
                warn!(port, error = %e, "tunnel creation failed");
                process.kill().await;
                return Err(e);
            }
        };

        info!(port, url = %url, "tunnel created");

        let (child, mut lines) = process.into_parts();
        let drain = tokio::spawn(async move {
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => debug!(line = %line, "tunnel output"),
                    Err(e) => {
                        debug!(error = %e, "tunnel output closed");
                        break;
                    }
                }
            }
        });

        Ok(Tunnel {
            url,
            port,
            child,
            drain,
        })
    }

    /// Start a tunnel and describe the outcome as display text
    ///
    /// On success the tunnel keeps running after this returns.
    pub async fn report(&self, port: &str) -> String {
        match self.create_tunnel(port).await {
            Ok(tunnel) => {
                let text = format!("🔗 Tunnel URL: {}", tunnel.url());
                // Leave the child running; its output drain keeps going.
                drop(tunnel);
                text
            }
            Err(e) => failure_text(&e),
        }
    }
}

/// Parse a port string as a decimal TCP port
pub fn validate_port(port: &str) -> Result<u16> {
    let trimmed = port.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::validation("port", "❌ Invalid port number"));
    }
    match trimmed.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::validation(
            "port",
            "❌ Invalid port number (must be 1-65535)",
        )),
        Ok(port) => Ok(port),
    }
}

/// Fixed argument vector binding `port` on `host` to a public endpoint
fn tunnel_args(host: &str, port: u16) -> Vec<String> {
    vec![
        "tunnel".to_string(),
        "--url".to_string(),
        format!("http://{host}:{port}"),
        "--no-autoupdate".to_string(),
    ]
}

fn url_pattern(domain_suffix: &str) -> Result<Regex> {
    let pattern = format!(r"(https://[^\s]+\.{})", regex::escape(domain_suffix));
    Regex::new(&pattern).map_err(|e| {
        Error::validation("domain_suffix", format!("invalid tunnel domain suffix: {e}"))
    })
}

/// Extract the first public URL from a line of tunnel output
pub(crate) fn find_url(line: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

async fn scan_for_url(process: &mut ProcessHandle, pattern: &Regex) -> Result<String> {
    while let Some(line) = process.next_line().await {
        let line = line.map_err(|e| Error::StreamFailed(e.to_string()))?;
        if let Some(url) = find_url(&line, pattern) {
            return Ok(url);
        }
        if line.contains(MISSING_COMMAND_MARKER) {
            return Err(Error::NotFound(process.program().to_string()));
        }
    }

    Err(Error::Launch {
        program: process.program().to_string(),
        source: std::io::Error::other("output ended without a tunnel URL"),
    })
}

fn startup_timeout_error(command: &ToolCommand, limit: Duration) -> Error {
    Error::Launch {
        program: command.display_name(),
        source: std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no tunnel URL within {}s", limit.as_secs()),
        ),
    }
}

fn failure_text(error: &Error) -> String {
    match error {
        Error::Validation { message, .. } => message.clone(),
        Error::NotFound(program) => format!(
            "❌ {program} not installed. Install it or set tools.tunnel_path in the configuration."
        ),
        other => format!("❌ Tunnel creation failed: {other}"),
    }
}
