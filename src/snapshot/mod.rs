//! Creation and removal of LVM snapshot volumes.
//!
//! Both operations observe the host before mutating it: `create` returns an
//! existing snapshot untouched, and `remove` refuses to delete anything whose
//! attributes do not mark it as a snapshot.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::inspect::{DeviceInspector, InspectError};
use crate::remote::{CommandFailure, CommandRunner, Privilege, RemoteError, RemoteExecutor, quote};

/// Errors raised by [`SnapshotLifecycle`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SnapshotError {
    /// Raised when a snapshot name cannot be used as a volume name.
    #[error("invalid snapshot name `{name}`: {reason}")]
    InvalidName {
        /// Name as supplied.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },
    /// Raised when the snapshot size is blank.
    #[error("snapshot size must not be empty")]
    InvalidSize,
    /// Raised when the origin path has no parent to place the snapshot in.
    #[error("origin device `{device}` must be an absolute path with a parent directory")]
    InvalidOrigin {
        /// Origin as supplied.
        device: String,
    },
    /// Raised when `lvcreate` fails.
    #[error("failed to create snapshot {snapshot}: {failure}")]
    Create {
        /// Snapshot path that was requested.
        snapshot: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when removal targets a volume that is not a snapshot.
    #[error("refusing to remove {device}: attributes `{attributes}` do not mark a snapshot")]
    NotSnapshot {
        /// Device that was targeted.
        device: Utf8PathBuf,
        /// Observed `lv_attr` string.
        attributes: String,
    },
    /// Raised when `lvremove` fails.
    #[error("failed to remove snapshot {device}: {failure}")]
    Removal {
        /// Device that was targeted.
        device: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when the device could not be inspected.
    #[error(transparent)]
    Inspect(#[from] InspectError),
}

impl From<RemoteError> for SnapshotError {
    fn from(value: RemoteError) -> Self {
        Self::Inspect(InspectError::Remote(value))
    }
}

/// Derives the snapshot device path: `/dev/vg0/data` with `build-42`
/// becomes `/dev/vg0/build-42`.
///
/// # Errors
///
/// Returns [`SnapshotError::InvalidName`] for unusable names and
/// [`SnapshotError::InvalidOrigin`] when `origin` has no parent.
///
/// # Examples
///
/// ```
/// # use camino::Utf8Path;
/// # use volsnap::snapshot::snapshot_device_path;
/// let path = snapshot_device_path(Utf8Path::new("/dev/vg0/data"), "build-42").unwrap();
/// assert_eq!(path, "/dev/vg0/build-42");
/// ```
pub fn snapshot_device_path(origin: &Utf8Path, name: &str) -> Result<Utf8PathBuf, SnapshotError> {
    validate_name(name)?;
    match origin.parent() {
        Some(parent) if origin.is_absolute() && origin.file_name().is_some() => {
            Ok(parent.join(name))
        }
        _ => Err(SnapshotError::InvalidOrigin {
            device: origin.to_string(),
        }),
    }
}

/// Checks that `name` can serve as both an LV name and a path segment.
///
/// # Errors
///
/// Returns [`SnapshotError::InvalidName`] describing the first problem.
pub fn validate_name(name: &str) -> Result<(), SnapshotError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.contains('/') {
        Some("name contains `/`")
    } else if name.chars().any(char::is_whitespace) {
        Some("name contains whitespace")
    } else if name.chars().any(char::is_control) {
        Some("name contains control characters")
    } else {
        None
    };

    reason.map_or(Ok(()), |why| {
        Err(SnapshotError::InvalidName {
            name: name.to_owned(),
            reason: why,
        })
    })
}

/// Creates and removes snapshot volumes.
#[derive(Debug)]
pub struct SnapshotLifecycle<'a, R: CommandRunner> {
    remote: &'a RemoteExecutor<R>,
    inspector: DeviceInspector<'a, R>,
}

impl<'a, R: CommandRunner> SnapshotLifecycle<'a, R> {
    /// Creates a lifecycle manager borrowing `remote`.
    #[must_use]
    pub const fn new(remote: &'a RemoteExecutor<R>) -> Self {
        Self {
            remote,
            inspector: DeviceInspector::new(remote),
        }
    }

    /// Ensures a snapshot of `origin` called `name` exists and returns its
    /// device path. An existing snapshot is returned without issuing
    /// `lvcreate`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Create`] when `lvcreate` fails, or a
    /// validation error for a bad name, size, or origin.
    pub fn create(
        &self,
        origin: &Utf8Path,
        name: &str,
        size: &str,
    ) -> Result<Utf8PathBuf, SnapshotError> {
        let snapshot = snapshot_device_path(origin, name)?;
        if size.trim().is_empty() {
            return Err(SnapshotError::InvalidSize);
        }

        if self.inspector.path_exists(&snapshot)? {
            debug!(%snapshot, "snapshot already exists");
            return Ok(snapshot);
        }

        let command = format!(
            "lvcreate --size {} --snapshot --name {} {}",
            quote(size.trim()),
            quote(name),
            quote(origin.as_str())
        );
        let output = self.remote.execute(&command, Privilege::Elevated)?;
        if !output.is_success() {
            return Err(SnapshotError::Create {
                snapshot,
                failure: CommandFailure::new(command, &output),
            });
        }

        info!(%origin, %snapshot, size, "created snapshot");
        Ok(snapshot)
    }

    /// Removes the snapshot at `device` and returns its path. A device that
    /// does not exist is treated as already removed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotSnapshot`] when `device` is not a
    /// snapshot, or [`SnapshotError::Removal`] when `lvremove` fails.
    pub fn remove(&self, device: &Utf8Path) -> Result<Utf8PathBuf, SnapshotError> {
        if !self.inspector.path_exists(device)? {
            debug!(%device, "snapshot already absent");
            return Ok(device.to_path_buf());
        }

        let attributes = self.inspector.attributes(device)?;
        if !is_snapshot_attributes(&attributes) {
            return Err(SnapshotError::NotSnapshot {
                device: device.to_path_buf(),
                attributes,
            });
        }

        let command = format!("lvremove --force {}", quote(device.as_str()));
        let output = self.remote.execute(&command, Privilege::Elevated)?;
        if !output.is_success() {
            return Err(SnapshotError::Removal {
                device: device.to_path_buf(),
                failure: CommandFailure::new(command, &output),
            });
        }

        info!(%device, "removed snapshot");
        Ok(device.to_path_buf())
    }
}

/// `lv_attr` strings for snapshots start with `s` (active) or `S` (invalid).
fn is_snapshot_attributes(attributes: &str) -> bool {
    matches!(attributes.chars().next(), Some('s' | 'S'))
}

#[cfg(test)]
mod tests;
