//! Named mutual exclusion on the remote host.
//!
//! A lock is a directory created with a plain `mkdir`, which fails
//! atomically when the directory already exists. The directory name is
//! derived from the origin device and snapshot name so concurrent `up` and
//! `down` invocations for the same snapshot serialise.

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::inspect::{DeviceInspector, InspectError};
use crate::remote::{CommandFailure, CommandRunner, Privilege, RemoteError, RemoteExecutor, quote};

const LOCK_HASH_LENGTH: usize = 16;

/// Errors raised by [`RemoteLock`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LockError {
    /// Raised when the lock directory already exists.
    #[error("lock {path} is held; remove it if no other volsnap run is active: {failure}")]
    Held {
        /// Lock directory on the remote host.
        path: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when `mkdir` fails but no lock directory exists, for example
    /// because the parent directory is missing or not writable.
    #[error("failed to create lock {path}: {failure}")]
    Create {
        /// Lock directory on the remote host.
        path: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when the lock directory cannot be removed.
    #[error("failed to release lock {path}: {failure}")]
    Release {
        /// Lock directory on the remote host.
        path: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when the lock directory could not be inspected.
    #[error(transparent)]
    Inspect(#[from] InspectError),
    /// Raised when a command could not be sent.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Returns the lock directory for `(device, name)` under `lock_dir`.
#[must_use]
pub fn lock_path(lock_dir: &Utf8Path, device: &Utf8Path, name: &str) -> Utf8PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(device.as_str().as_bytes());
    hasher.update([0_u8]);
    hasher.update(name.as_bytes());
    let key: String = hex::encode(hasher.finalize())
        .chars()
        .take(LOCK_HASH_LENGTH)
        .collect();
    lock_dir.join(format!("volsnap-{key}.lock"))
}

/// Lock over one `(device, name)` pair.
#[derive(Debug)]
pub struct RemoteLock<'a, R: CommandRunner> {
    remote: &'a RemoteExecutor<R>,
    path: Utf8PathBuf,
}

impl<'a, R: CommandRunner> RemoteLock<'a, R> {
    /// Creates a lock handle; nothing runs until [`Self::acquire`].
    #[must_use]
    pub fn new(
        remote: &'a RemoteExecutor<R>,
        lock_dir: &Utf8Path,
        device: &Utf8Path,
        name: &str,
    ) -> Self {
        Self {
            remote,
            path: lock_path(lock_dir, device, name),
        }
    }

    /// Returns the lock directory on the remote host.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Takes the lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] when another invocation holds it and
    /// [`LockError::Create`] when `mkdir` failed for any other reason.
    pub fn acquire(&self) -> Result<(), LockError> {
        let command = format!("mkdir {}", quote(self.path.as_str()));
        let output = self.remote.execute(&command, Privilege::Standard)?;
        if !output.is_success() {
            let failure = CommandFailure::new(command, &output);
            let path = self.path.clone();
            return Err(if DeviceInspector::new(self.remote).path_exists(&self.path)? {
                LockError::Held { path, failure }
            } else {
                LockError::Create { path, failure }
            });
        }
        debug!(lock = %self.path, "lock acquired");
        Ok(())
    }

    /// Gives the lock up.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Release`] when the directory cannot be removed.
    pub fn release(&self) -> Result<(), LockError> {
        let command = format!("rmdir {}", quote(self.path.as_str()));
        let output = self.remote.execute(&command, Privilege::Standard)?;
        if !output.is_success() {
            return Err(LockError::Release {
                path: self.path.clone(),
                failure: CommandFailure::new(command, &output),
            });
        }
        debug!(lock = %self.path, "lock released");
        Ok(())
    }

    /// Runs `operation` while holding the lock and releases it afterwards.
    ///
    /// A release failure is returned only when `operation` succeeded; when
    /// both fail, the operation's error wins and the release failure is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error, the operation's error, or the release
    /// error, in that order of precedence.
    pub fn hold<T, E>(&self, operation: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<LockError>,
    {
        self.acquire()?;
        let outcome = operation();
        match (outcome, self.release()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release)) => Err(release.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release)) => {
                warn!(lock = %self.path, %release, "lock release failed after error");
                Err(err)
            }
        }
    }
}
