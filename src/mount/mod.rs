//! Mounting snapshot devices with conflict detection.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::inspect::{DeviceInspector, InspectError};
use crate::remote::{CommandFailure, CommandRunner, Privilege, RemoteError, RemoteExecutor, quote};

/// Errors raised by [`MountManager`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MountError {
    /// Raised when the mountpoint directory cannot be created.
    #[error("failed to create directory {path}: {failure}")]
    Directory {
        /// Directory that was requested.
        path: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when the device to mount does not exist.
    #[error("device {device} does not exist")]
    DeviceNotFound {
        /// Device that was requested.
        device: Utf8PathBuf,
    },
    /// Raised when the device or mountpoint is already bound elsewhere.
    #[error("cannot mount {device} at {path}: {detail}")]
    Conflict {
        /// Device that was requested.
        device: Utf8PathBuf,
        /// Mountpoint that was requested.
        path: Utf8PathBuf,
        /// What is already mounted.
        detail: String,
    },
    /// Raised when `mount` fails.
    #[error("failed to mount {device} at {path}: {failure}")]
    Mount {
        /// Device that was requested.
        device: Utf8PathBuf,
        /// Mountpoint that was requested.
        path: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when `umount` fails.
    #[error("failed to unmount {path}: {failure}")]
    Unmount {
        /// Mountpoint or device that was targeted.
        path: Utf8PathBuf,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when the device or mountpoint could not be inspected.
    #[error(transparent)]
    Inspect(#[from] InspectError),
    /// Raised when a command could not be sent.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Flags passed to `umount`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UnmountOptions {
    /// Pass `--force`.
    pub force: bool,
    /// Pass `--lazy`.
    pub lazy: bool,
}

/// Creates mountpoints and binds devices to them.
#[derive(Debug)]
pub struct MountManager<'a, R: CommandRunner> {
    remote: &'a RemoteExecutor<R>,
    inspector: DeviceInspector<'a, R>,
}

impl<'a, R: CommandRunner> MountManager<'a, R> {
    /// Creates a mount manager borrowing `remote`.
    #[must_use]
    pub const fn new(remote: &'a RemoteExecutor<R>) -> Self {
        Self {
            remote,
            inspector: DeviceInspector::new(remote),
        }
    }

    /// Creates `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Directory`] when `mkdir` fails.
    pub fn mkdir(&self, path: &Utf8Path) -> Result<Utf8PathBuf, MountError> {
        let command = format!("mkdir -p {}", quote(path.as_str()));
        let output = self.remote.execute(&command, Privilege::Elevated)?;
        if !output.is_success() {
            return Err(MountError::Directory {
                path: path.to_path_buf(),
                failure: CommandFailure::new(command, &output),
            });
        }
        Ok(path.to_path_buf())
    }

    /// Mounts `device` at `path` and returns `path`.
    ///
    /// Mounting a device that is already mounted at `path` changes nothing.
    /// A device mounted elsewhere, or a different device at `path`, is a
    /// conflict and leaves the host untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Conflict`], [`MountError::DeviceNotFound`], or
    /// [`MountError::Mount`] as described above, or an inspection error.
    pub fn mount(&self, device: &Utf8Path, path: &Utf8Path) -> Result<Utf8PathBuf, MountError> {
        let info = self.inspector.block_info(device)?;
        if let Some(current) = info.mountpoint.as_deref()
            && current != path
        {
            return Err(conflict(
                device,
                path,
                format!("{device} is already mounted at {current}"),
            ));
        }

        if !self.inspector.path_exists(device)? {
            return Err(MountError::DeviceNotFound {
                device: device.to_path_buf(),
            });
        }

        if !self.inspector.path_exists(path)? {
            self.mkdir(path)?;
        }

        if self.inspector.is_mountpoint(path)? {
            let usage = self.inspector.usage(path)?;
            let mounted = usage.source_device_name();
            if mounted != info.name {
                return Err(conflict(
                    device,
                    path,
                    format!("{path} already holds {}", usage.source),
                ));
            }
            debug!(%device, %path, "device already mounted");
            return Ok(path.to_path_buf());
        }

        let command = format!(
            "mount -o nouuid {} {}",
            quote(device.as_str()),
            quote(path.as_str())
        );
        let output = self.remote.execute(&command, Privilege::Elevated)?;
        if !output.is_success() {
            return Err(MountError::Mount {
                device: device.to_path_buf(),
                path: path.to_path_buf(),
                failure: CommandFailure::new(command, &output),
            });
        }

        info!(%device, %path, "mounted snapshot");
        Ok(path.to_path_buf())
    }

    /// Unmounts `path`, which may be a mountpoint or a device.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Unmount`] when `umount` fails.
    pub fn umount(
        &self,
        path: &Utf8Path,
        options: UnmountOptions,
    ) -> Result<Utf8PathBuf, MountError> {
        let mut command = String::from("umount");
        if options.force {
            command.push_str(" --force");
        }
        if options.lazy {
            command.push_str(" --lazy");
        }
        command.push(' ');
        command.push_str(&quote(path.as_str()));

        let output = self.remote.execute(&command, Privilege::Elevated)?;
        if !output.is_success() {
            return Err(MountError::Unmount {
                path: path.to_path_buf(),
                failure: CommandFailure::new(command, &output),
            });
        }

        info!(%path, "unmounted");
        Ok(path.to_path_buf())
    }
}

fn conflict(device: &Utf8Path, path: &Utf8Path, detail: String) -> MountError {
    MountError::Conflict {
        device: device.to_path_buf(),
        path: path.to_path_buf(),
        detail,
    }
}
