//! Read-only queries against remote block devices and mountpoints.

use camino::Utf8Path;
use thiserror::Error;

use crate::remote::{
    CommandFailure, CommandRunner, Privilege, RemoteCommandOutput, RemoteError, RemoteExecutor,
    quote,
};

mod parse;

pub use parse::{BlockDevice, FilesystemUsage};

const LSBLK_COLUMNS: &str = "NAME,UUID,MOUNTPOINT,FSTYPE,STATE,SIZE,TYPE";
const DF_COLUMNS: &str = "source,fstype,size,used,avail,target";

/// Errors raised by [`DeviceInspector`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InspectError {
    /// Raised when a query command exits with a non-zero status.
    #[error("failed to query {what} of {target}: {failure}")]
    Query {
        /// Kind of information requested.
        what: &'static str,
        /// Device or path queried.
        target: String,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when a query succeeds but its output cannot be understood.
    #[error("unexpected output while inspecting {target}: {message}")]
    Parse {
        /// Device or path queried.
        target: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Raised when the query could not be sent.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Typed read-only queries over a [`RemoteExecutor`].
#[derive(Debug)]
pub struct DeviceInspector<'a, R: CommandRunner> {
    remote: &'a RemoteExecutor<R>,
}

impl<'a, R: CommandRunner> DeviceInspector<'a, R> {
    /// Creates an inspector borrowing `remote`.
    #[must_use]
    pub const fn new(remote: &'a RemoteExecutor<R>) -> Self {
        Self { remote }
    }

    /// Returns the `lv_attr` string of a logical volume.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Query`] when `lvs` fails and
    /// [`InspectError::Parse`] when it prints nothing.
    pub fn attributes(&self, device: &Utf8Path) -> Result<String, InspectError> {
        let command = format!("lvs --noheadings -o lv_attr {}", quote(device.as_str()));
        let output = self.query(&command, Privilege::Elevated, "attributes", device)?;
        parse::parse_attributes(&output.stdout).map_err(|message| parse_error(device, message))
    }

    /// Returns the `lsblk` record for `device`.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Query`] when `lsblk` fails and
    /// [`InspectError::Parse`] when the record lacks a name.
    pub fn block_info(&self, device: &Utf8Path) -> Result<BlockDevice, InspectError> {
        let command = format!(
            "lsblk {} -o {LSBLK_COLUMNS} --pairs",
            quote(device.as_str())
        );
        let output = self.query(&command, Privilege::Standard, "block device info", device)?;
        parse::parse_block_device(&output.stdout).map_err(|message| parse_error(device, message))
    }

    /// Returns `df` usage for the filesystem holding `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Query`] when `df` fails and
    /// [`InspectError::Parse`] when its data line is malformed.
    pub fn usage(&self, path: &Utf8Path) -> Result<FilesystemUsage, InspectError> {
        let command = format!("df --sync --output={DF_COLUMNS} {}", quote(path.as_str()));
        let output = self.query(&command, Privilege::Standard, "filesystem usage", path)?;
        parse::parse_usage(&output.stdout).map_err(|message| parse_error(path, message))
    }

    /// Returns `true` when `path` exists on the host.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Remote`] only when `ssh` cannot be started.
    pub fn path_exists(&self, path: &Utf8Path) -> Result<bool, InspectError> {
        let command = format!("ls {}", quote(path.as_str()));
        let output = self.remote.execute(&command, Privilege::Standard)?;
        Ok(output.is_success())
    }

    /// Returns `true` when `path` is a mountpoint.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Remote`] only when `ssh` cannot be started.
    pub fn is_mountpoint(&self, path: &Utf8Path) -> Result<bool, InspectError> {
        let command = format!("mountpoint -q {}", quote(path.as_str()));
        let output = self.remote.execute(&command, Privilege::Standard)?;
        Ok(output.is_success())
    }

    fn query(
        &self,
        command: &str,
        privilege: Privilege,
        what: &'static str,
        target: &Utf8Path,
    ) -> Result<RemoteCommandOutput, InspectError> {
        let output = self.remote.execute(command, privilege)?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(InspectError::Query {
                what,
                target: target.to_string(),
                failure: CommandFailure::new(command, &output),
            })
        }
    }
}

fn parse_error(target: &Utf8Path, message: String) -> InspectError {
    InspectError::Parse {
        target: target.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests;
