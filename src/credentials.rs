//! Ephemeral cookie-jar storage
//!
//! The vault writes a job's cookie payload to a file that only the current
//! user can read, and deletes it again when the job ends. Deletion is
//! best-effort: failures are logged, never returned, so a cleanup problem can
//! never replace the job's real outcome.

use crate::error::{Error, Result};
use crate::types::JobId;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Creates and destroys per-job credential files inside one directory
#[derive(Clone, Debug)]
pub struct CredentialVault {
    dir: PathBuf,
}

impl CredentialVault {
    /// Create a vault rooted at `dir` (usually the OS temp directory)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the credential files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the credential file for `job_id`
    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("cookies_{}.txt", job_id))
    }

    /// Write `payload` to the job's credential file with owner-only permissions
    ///
    /// The write runs on a blocking task that holds the lease from before the
    /// file is created. If the caller stops waiting, the finished lease is
    /// dropped with the task's output and the file is deleted. On error
    /// nothing is left behind.
    pub async fn acquire(&self, job_id: &JobId, payload: &str) -> Result<CredentialLease> {
        let vault = self.clone();
        let job_id = job_id.clone();
        let payload = payload.to_string();

        tokio::task::spawn_blocking(move || vault.acquire_blocking(&job_id, &payload))
            .await
            .unwrap_or_else(|e| Err(Error::Io(std::io::Error::other(e))))
    }

    fn acquire_blocking(&self, job_id: &JobId, payload: &str) -> Result<CredentialLease> {
        let lease = CredentialLease {
            vault: self.clone(),
            job_id: job_id.clone(),
            path: self.path_for(job_id),
            released: false,
        };

        // A failed write drops the lease, removing any partial file
        write_private(&lease.path, payload).map_err(Error::Io)?;

        info!(job_id = %job_id, path = ?lease.path, "created temporary cookie file");
        Ok(lease)
    }

    /// Delete the job's credential file if it exists
    ///
    /// Idempotent. Errors are logged and swallowed.
    pub fn release(&self, job_id: &JobId) {
        let path = self.path_for(job_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(job_id = %job_id, path = ?path, "deleted temporary cookie file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(job_id = %job_id, "no cookie file to delete");
            }
            Err(e) => {
                warn!(job_id = %job_id, path = ?path, error = %e, "failed to delete cookie file");
            }
        }
    }
}

fn write_private(path: &Path, payload: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // mode() only applies on creation; enforce it for pre-existing files too
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(payload.as_bytes())?;
    file.flush()
}

/// Handle to an acquired credential file
///
/// Releasing is explicit via [`CredentialLease::release`]; a lease that is
/// dropped without being released deletes the file in `Drop`, so abandoning a
/// job's stream still removes the secret.
#[derive(Debug)]
pub struct CredentialLease {
    vault: CredentialVault,
    job_id: JobId,
    path: PathBuf,
    released: bool,
}

impl CredentialLease {
    /// Path of the credential file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the credential file now
    pub fn release(mut self) {
        self.released = true;
        self.vault.release(&self.job_id);
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        if !self.released {
            self.vault.release(&self.job_id);
        }
    }
}
