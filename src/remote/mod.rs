//! Remote command execution over `ssh` and file transfer via `rsync`.
//!
//! The executor is the only component that spawns local processes. Every
//! other module builds command strings and hands them to
//! [`RemoteExecutor::execute`], which makes the whole lifecycle testable with
//! a scripted [`CommandRunner`].

use std::ffi::OsString;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::VolsnapConfig;

mod host;
mod types;
mod util;

pub use host::{HostParseError, RemoteHost};
pub use types::{
    CommandFailure, CommandOutput, CommandRunner, Privilege, ProcessCommandRunner,
    RemoteCommandOutput,
};
pub use util::{expand_tilde, quote};

/// Errors raised before a remote command produces an exit status.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteError {
    /// Raised when a local program cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the local side of a transfer does not exist.
    #[error("transfer source {path} is not accessible: {message}")]
    MissingSource {
        /// Local path that was expected to exist.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// SSH client settings shared by command execution and transfers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshOptions {
    /// Path to the `ssh` executable.
    pub ssh_bin: String,
    /// Path to the `rsync` executable.
    pub rsync_bin: String,
    /// Whether to pass `BatchMode=yes`.
    pub batch_mode: bool,
    /// Whether to keep host key checking enabled.
    pub strict_host_key_checking: bool,
    /// Known hosts file override.
    pub known_hosts_file: String,
    /// Optional private key path.
    pub identity_file: Option<String>,
}

impl From<&VolsnapConfig> for SshOptions {
    fn from(config: &VolsnapConfig) -> Self {
        Self {
            ssh_bin: config.ssh_bin.clone(),
            rsync_bin: config.rsync_bin.clone(),
            batch_mode: config.ssh_batch_mode,
            strict_host_key_checking: config.ssh_strict_host_key_checking,
            known_hosts_file: config.ssh_known_hosts_file.clone(),
            identity_file: config.ssh_identity_file.clone(),
        }
    }
}

/// Runs commands against a single remote host.
#[derive(Clone, Debug)]
pub struct RemoteExecutor<R: CommandRunner> {
    host: RemoteHost,
    options: SshOptions,
    runner: R,
}

impl<R: CommandRunner> RemoteExecutor<R> {
    /// Creates an executor for `host` using the given runner.
    #[must_use]
    pub const fn new(host: RemoteHost, options: SshOptions, runner: R) -> Self {
        Self {
            host,
            options,
            runner,
        }
    }

    /// Returns the host this executor targets.
    #[must_use]
    pub const fn host(&self) -> &RemoteHost {
        &self.host
    }

    /// Executes `command` on the remote host and returns its exit status and
    /// captured output.
    ///
    /// A non-zero exit status is not an error here; callers decide what it
    /// means. Elevated commands are prefixed with `sudo`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Spawn`] when the local `ssh` client cannot be
    /// started.
    ///
    /// # Security
    ///
    /// `command` is passed verbatim to the remote shell. Interpolated values
    /// must already be quoted with [`quote`].
    pub fn execute(
        &self,
        command: &str,
        privilege: Privilege,
    ) -> Result<RemoteCommandOutput, RemoteError> {
        let remote_command = match privilege {
            Privilege::Standard => command.to_owned(),
            Privilege::Elevated => format!("sudo {command}"),
        };
        debug!(host = %self.host, command = %remote_command, "executing remote command");

        let args = self.build_ssh_args(&remote_command);
        let output = self.runner.run(&self.options.ssh_bin, &args)?;
        Ok(output.into())
    }

    /// Copies `local` to `remote` on the host with `rsync -a`.
    ///
    /// With `ensure_parent`, the parent directory of `remote` is created
    /// first; a failure of that step is logged and the transfer is still
    /// attempted so `rsync` reports the definitive error.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MissingSource`] when `local` cannot be accessed,
    /// or [`RemoteError::Spawn`] when `ssh` or `rsync` cannot be started.
    pub fn transfer(
        &self,
        local: &Utf8Path,
        remote: &Utf8Path,
        ensure_parent: bool,
    ) -> Result<RemoteCommandOutput, RemoteError> {
        ensure_local_source(local)?;

        if ensure_parent
            && let Some(parent) = remote.parent()
            && !parent.as_str().is_empty()
        {
            let command = format!("mkdir -p {}", quote(parent.as_str()));
            let output = self.execute(&command, Privilege::Standard)?;
            if !output.is_success() {
                let failure = CommandFailure::new(command, &output);
                warn!(%failure, "could not create transfer parent directory");
            }
        }

        let args = self.build_rsync_args(local, remote);
        debug!(host = %self.host, source = %local, destination = %remote, "transferring file");
        let output = self.runner.run(&self.options.rsync_bin, &args)?;
        Ok(output.into())
    }

    fn build_ssh_args(&self, remote_command: &str) -> Vec<OsString> {
        let mut args = self.common_ssh_options();
        args.push(OsString::from(self.host.login()));
        args.push(OsString::from(remote_command));
        args
    }

    fn build_rsync_args(&self, local: &Utf8Path, remote: &Utf8Path) -> Vec<OsString> {
        vec![
            OsString::from("-a"),
            OsString::from("--rsh"),
            OsString::from(self.build_remote_shell()),
            OsString::from(local.as_str()),
            OsString::from(self.host.rsync_target(remote.as_str())),
        ]
    }

    fn common_ssh_options(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.host.port.to_string()),
        ];

        if let Some(ref identity_file) = self.options.identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        if self.options.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.options.strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.options.known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.options.known_hosts_file
            )));
        }

        args
    }

    /// Renders the ssh invocation for `rsync --rsh`, which rsync splits
    /// like a shell would, so every word is quoted.
    fn build_remote_shell(&self) -> String {
        let opts = self
            .common_ssh_options()
            .into_iter()
            .map(|arg| quote(&arg.to_string_lossy()).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {opts}", quote(&self.options.ssh_bin))
    }
}

fn ensure_local_source(path: &Utf8Path) -> Result<(), RemoteError> {
    let missing = |message: String| RemoteError::MissingSource {
        path: path.to_string(),
        message,
    };

    let (dir_path, entry) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_str().is_empty() => (parent, name),
        (_, Some(name)) => (Utf8Path::new("."), name),
        (_, None) => return Err(missing(String::from("path has no file name"))),
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| missing(err.to_string()))?;
    dir.metadata(entry)
        .map(|_| ())
        .map_err(|err| missing(err.to_string()))
}
