//! External process launching
//!
//! [`ProcessLauncher`] starts a program with a discrete argument vector and
//! returns a [`ProcessHandle`] whose stdout and stderr are merged into one
//! stream of lines. Spawn failures surface immediately as
//! [`Error::Launch`](crate::Error::Launch), before any output exists.

pub mod format;

use crate::error::{Error, Result};
use crate::progress::LineSplitter;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Buffered lines between the pipe reader and the consumer
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Read size for pipe chunks
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A resolved executable plus the arguments that always precede generated ones
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable path or bare name
    pub program: PathBuf,
    /// Leading arguments
    pub leading_args: Vec<String>,
}

impl ToolCommand {
    /// Command for an explicit program with no leading arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Resolve a tool from config
    ///
    /// An explicit path wins. Otherwise `binary` is looked up on PATH with the
    /// `which` crate when `search_path` is set, falling back to the bare name
    /// so a missing tool still surfaces as a launch error at spawn time.
    pub fn resolve(
        explicit: Option<&Path>,
        binary: &str,
        leading_args: &[String],
        search_path: bool,
    ) -> Self {
        let program = match explicit {
            Some(path) => path.to_path_buf(),
            None if search_path => which::which(binary).unwrap_or_else(|_| PathBuf::from(binary)),
            None => PathBuf::from(binary),
        };
        Self {
            program,
            leading_args: leading_args.to_vec(),
        }
    }

    /// Program name for messages
    pub fn display_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }
}

/// Starts external programs with merged, line-oriented output
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    kill_on_drop: bool,
    env: Vec<(String, String)>,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher {
    /// Launcher whose children are killed when their handle is dropped
    ///
    /// Children get `PYTHONIOENCODING=utf-8` and `PYTHONUTF8=1` so Python
    /// tools emit UTF-8 regardless of the host locale.
    pub fn new() -> Self {
        Self {
            kill_on_drop: true,
            env: vec![
                ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
                ("PYTHONUTF8".to_string(), "1".to_string()),
            ],
        }
    }

    /// Keep children alive after their handle is dropped
    pub fn detached(mut self) -> Self {
        self.kill_on_drop = false;
        self
    }

    /// Add an environment variable for launched children
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Start `command` with `args` appended after its leading arguments
    ///
    /// On unix stdout and stderr share one pipe, so lines arrive in the order
    /// the child wrote them. Elsewhere each is piped separately and the two
    /// are interleaved as they are read.
    pub fn start(&self, command: &ToolCommand, args: &[String]) -> Result<ProcessHandle> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(self.kill_on_drop);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        #[cfg(windows)]
        cmd.creation_flags(0x08000000);

        #[cfg(unix)]
        let reader = {
            let (reader, writer) = std::io::pipe().map_err(Error::Io)?;
            let writer_err = writer.try_clone().map_err(Error::Io)?;
            cmd.stdout(writer).stderr(writer_err);
            reader
        };
        #[cfg(not(unix))]
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let program = command.display_name();
        #[cfg_attr(unix, allow(unused_mut))]
        let mut child = cmd.spawn().map_err(|source| Error::Launch {
            program: program.clone(),
            source,
        })?;
        // Our copies of the write end must close for EOF to reach the reader
        drop(cmd);

        debug!(program = %program, pid = ?child.id(), "process started");

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        #[cfg(unix)]
        {
            let reader = tokio::net::unix::pipe::Receiver::from_owned_fd(reader.into())
                .map_err(Error::Io)?;
            tokio::spawn(pump_lines(reader, tx));
        }
        #[cfg(not(unix))]
        {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| Error::Io(std::io::Error::other("child stdout was not captured")))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| Error::Io(std::io::Error::other("child stderr was not captured")))?;
            tokio::spawn(pump_lines(stdout, tx.clone()));
            tokio::spawn(pump_lines(stderr, tx));
        }

        Ok(ProcessHandle {
            child,
            program,
            lines: ReceiverStream::new(rx),
        })
    }
}

/// Read `reader` to EOF, forwarding each completed line
///
/// Stops early when the consumer has gone away.
async fn pump_lines<R>(mut reader: R, tx: mpsc::Sender<std::io::Result<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                if let Some(rest) = splitter.finish() {
                    tx.send(Ok(rest)).await.ok();
                }
                return;
            }
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    if tx.send(Ok(line)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tx.send(Err(e)).await.ok();
                return;
            }
        }
    }
}

/// Stream of lines from a running child
pub type LineStream = ReceiverStream<std::io::Result<String>>;

/// A running external process
pub struct ProcessHandle {
    child: Child,
    program: String,
    lines: LineStream,
}

impl ProcessHandle {
    /// Pair a child with a line stream built elsewhere
    #[cfg(test)]
    pub(crate) fn from_parts(child: Child, program: impl Into<String>, lines: LineStream) -> Self {
        Self {
            child,
            program: program.into(),
            lines,
        }
    }

    /// Next line of combined stdout/stderr
    ///
    /// Returns `None` once the child's output is closed. An `Err` means
    /// reading the output failed; no further lines follow from that pipe.
    pub async fn next_line(&mut self) -> Option<std::io::Result<String>> {
        self.lines.next().await
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().await.map_err(Error::Io)
    }

    /// Terminate the process and reap it
    ///
    /// Best-effort: errors are logged.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(program = %self.program, error = %e, "failed to kill process");
        }
    }

    /// OS process id, if still running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Program name for messages
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Separate the child from its line stream
    pub fn into_parts(self) -> (Child, LineStream) {
        (self.child, self.lines)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_explicit_path() {
        let cmd = ToolCommand::resolve(
            Some(Path::new("/opt/bin/yt-dlp")),
            "yt-dlp",
            &["--ignore-config".to_string()],
            true,
        );
        assert_eq!(cmd.program, PathBuf::from("/opt/bin/yt-dlp"));
        assert_eq!(cmd.leading_args, vec!["--ignore-config"]);
    }

    #[test]
    fn resolve_falls_back_to_bare_name() {
        let cmd = ToolCommand::resolve(None, "nonexistent-tool-binary-xyz", &[], true);
        assert_eq!(cmd.program, PathBuf::from("nonexistent-tool-binary-xyz"));

        let cmd = ToolCommand::resolve(None, "yt-dlp", &[], false);
        assert_eq!(cmd.program, PathBuf::from("yt-dlp"));
    }

    #[tokio::test]
    async fn start_with_missing_binary_is_launch_error() {
        let launcher = ProcessLauncher::new();
        let result = launcher.start(&ToolCommand::new("/nonexistent/path/to/yt-dlp"), &[]);

        match result {
            Err(err @ Error::Launch { .. }) => {
                assert!(err.is_missing_executable());
                assert!(err.to_string().contains("/nonexistent/path/to/yt-dlp"));
            }
            Err(other) => panic!("expected Launch error, got: {other:?}"),
            Ok(_) => panic!("expected Launch error, process started"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn merges_stdout_and_stderr_lines_in_write_order() {
        let launcher = ProcessLauncher::new();
        let sh = ToolCommand {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".to_string()],
        };

        for _ in 0..20 {
            let mut handle = launcher
                .start(
                    &sh,
                    &["echo A-out; echo B-err >&2; echo C-out; echo D-err >&2; echo E-out"
                        .to_string()],
                )
                .unwrap();

            let mut lines = Vec::new();
            while let Some(line) = handle.next_line().await {
                lines.push(line.unwrap());
            }

            assert_eq!(lines, vec!["A-out", "B-err", "C-out", "D-err", "E-out"]);
            assert!(handle.wait().await.unwrap().success());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_ends_when_child_exits() {
        let launcher = ProcessLauncher::new();
        let sh = ToolCommand {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".to_string()],
        };
        let mut handle = launcher.start(&sh, &["echo only".to_string()]).unwrap();

        let drained = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let mut count = 0;
            while handle.next_line().await.is_some() {
                count += 1;
            }
            count
        })
        .await
        .expect("line stream must close once the child exits");

        assert_eq!(drained, 1);
        handle.wait().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn arguments_are_not_shell_interpreted() {
        let launcher = ProcessLauncher::new();
        let sh = ToolCommand {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".to_string(), "printf '%s\\n' \"$1\"".to_string(), "sh".to_string()],
        };
        let mut handle = launcher
            .start(&sh, &["$(echo injected); rm -rf /nothing".to_string()])
            .unwrap();

        let line = handle.next_line().await.unwrap().unwrap();
        assert_eq!(line, "$(echo injected); rm -rf /nothing");
        handle.wait().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_code_is_reported() {
        let launcher = ProcessLauncher::new();
        let sh = ToolCommand {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".to_string()],
        };
        let mut handle = launcher.start(&sh, &["exit 3".to_string()]).unwrap();

        while handle.next_line().await.is_some() {}
        assert_eq!(handle.wait().await.unwrap().code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn utf8_environment_is_set() {
        let launcher = ProcessLauncher::new().with_env("SMDL_MARKER", "yes");
        let sh = ToolCommand {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".to_string()],
        };
        let mut handle = launcher
            .start(&sh, &["echo \"$PYTHONIOENCODING $SMDL_MARKER\"".to_string()])
            .unwrap();

        assert_eq!(handle.next_line().await.unwrap().unwrap(), "utf-8 yes");
        handle.wait().await.unwrap();
    }
}
