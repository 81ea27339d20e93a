//! GlusterFS export containers and the NFS mount commands they enable.
//!
//! Each mounted snapshot is served by one container whose name is a
//! truncated SHA-256 of the mount path. The container exposes the mount as
//! a gluster volume of the same name, which NFS clients mount as
//! `/<container>`.

use camino::Utf8Path;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::VolsnapConfig;
use crate::remote::{CommandFailure, CommandRunner, Privilege, RemoteError, RemoteExecutor, quote};

mod record;

pub use record::{
    ContainerRecord, ContainerState, NFS_MOUNT_OPTIONS, NetworkSettings, NfsExport,
    TeardownReport, VolumeStatus,
};

const GLUSTERD_STATE_PATH: &str = "/var/lib/glusterd";

/// Errors raised by [`FilesystemExporter`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExportError {
    /// Raised when `docker run` fails.
    #[error("failed to start export container {container}: {failure}")]
    Start {
        /// Container name.
        container: String,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when the gluster volume cannot be created or started.
    #[error("failed to initialise gluster volume in {container}: {failure}")]
    VolumeInit {
        /// Container name.
        container: String,
        /// Failed command details.
        failure: CommandFailure,
    },
    /// Raised when a container name is not a hash of the configured length.
    #[error("invalid export container name {container:?}: expected {length} lowercase hex characters")]
    InvalidName {
        /// Rejected name.
        container: String,
        /// Configured name length.
        length: usize,
    },
    /// Raised when credentials are requested for an absent container.
    #[error("export container {container} does not exist")]
    ContainerMissing {
        /// Container name.
        container: String,
    },
    /// Raised when the container has no bridge address.
    #[error("export container {container} has no IP address")]
    NoAddress {
        /// Container name.
        container: String,
    },
    /// Raised when `docker inspect` output cannot be decoded.
    #[error("unexpected docker inspect output for {container}: {message}")]
    Parse {
        /// Container name.
        container: String,
        /// Decoder diagnostic.
        message: String,
    },
    /// Raised when a command could not be sent.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Returns the first `length` hex characters of SHA-256(`volume_path`).
///
/// ```
/// # use camino::Utf8Path;
/// # use volsnap::export::container_name;
/// assert_eq!(container_name(Utf8Path::new("/mnt/build-42"), 10), "dba3848d68");
/// ```
#[must_use]
pub fn container_name(volume_path: &Utf8Path, length: usize) -> String {
    let digest = Sha256::digest(volume_path.as_str().as_bytes());
    hex::encode(digest).chars().take(length).collect()
}

/// Runs and stops export containers on the remote host.
#[derive(Debug)]
pub struct FilesystemExporter<'a, R: CommandRunner> {
    remote: &'a RemoteExecutor<R>,
    config: &'a VolsnapConfig,
}

impl<'a, R: CommandRunner> FilesystemExporter<'a, R> {
    /// Creates an exporter borrowing `remote` and `config`.
    #[must_use]
    pub const fn new(remote: &'a RemoteExecutor<R>, config: &'a VolsnapConfig) -> Self {
        Self { remote, config }
    }

    /// Returns the container name for `volume_path` using the configured
    /// hash length.
    #[must_use]
    pub fn container_name(&self, volume_path: &Utf8Path) -> String {
        container_name(volume_path, self.config.container_name_length)
    }

    /// Returns the container called `name`, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Parse`] when `docker inspect` prints
    /// undecodable JSON.
    pub fn inspect(&self, name: &str) -> Result<Option<ContainerRecord>, ExportError> {
        let command = format!("{} inspect {}", self.config.docker_bin, quote(name));
        let output = self.remote.execute(&command, Privilege::Standard)?;
        if !output.is_success() {
            return Ok(None);
        }

        let records: Vec<ContainerRecord> =
            serde_json::from_str(&output.stdout).map_err(|err| ExportError::Parse {
                container: name.to_owned(),
                message: err.to_string(),
            })?;
        Ok(records.into_iter().next())
    }

    /// Ensures a container called `name` serves `volume_path` from a started
    /// gluster volume and returns its name.
    ///
    /// An existing container is kept; only the missing volume steps run in
    /// it, so a run that failed during volume initialisation resumes.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidName`] for names that are not a
    /// container hash, [`ExportError::Start`] when the container cannot be
    /// started and [`ExportError::VolumeInit`] when the gluster volume cannot
    /// be created or started. The container keeps running in the latter case.
    pub fn run(&self, name: &str, volume_path: &Utf8Path) -> Result<String, ExportError> {
        self.validate_name(name)?;
        let status = if self.inspect(name)?.is_some() {
            self.volume_status(name)?
        } else {
            self.start_container(name, volume_path)?;
            VolumeStatus::Missing
        };

        match status {
            VolumeStatus::Started => {
                debug!(container = name, "export already serving");
                return Ok(name.to_owned());
            }
            VolumeStatus::Missing => {
                let brick = format!("{name}:{}", self.config.container_data_path);
                self.gluster(
                    name,
                    &format!("volume create {} {} force", quote(name), quote(&brick)),
                )?;
                self.gluster(name, &format!("volume start {}", quote(name)))?;
            }
            VolumeStatus::Stopped => {
                self.gluster(name, &format!("volume start {}", quote(name)))?;
            }
        }

        info!(container = name, "gluster volume started");
        Ok(name.to_owned())
    }

    /// Returns the state of the gluster volume served by `container`.
    ///
    /// A failing `gluster volume info` is read as a missing volume.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Remote`] only when `ssh` cannot be started.
    pub fn volume_status(&self, container: &str) -> Result<VolumeStatus, ExportError> {
        let exec = self.gluster_command(container, &format!("volume info {}", quote(container)));
        let output = self.remote.execute(&exec, Privilege::Standard)?;
        if !output.is_success() {
            return Ok(VolumeStatus::Missing);
        }
        Ok(VolumeStatus::from_info(&output.stdout))
    }

    fn start_container(&self, name: &str, volume_path: &Utf8Path) -> Result<(), ExportError> {
        let command = self.run_command(name, volume_path);
        let output = self.remote.execute(&command, Privilege::Standard)?;
        if !output.is_success() {
            return Err(ExportError::Start {
                container: name.to_owned(),
                failure: CommandFailure::new(command, &output),
            });
        }
        info!(container = name, volume = %volume_path, "started export container");
        Ok(())
    }

    fn gluster(&self, container: &str, subcommand: &str) -> Result<(), ExportError> {
        let exec = self.gluster_command(container, subcommand);
        let output = self.remote.execute(&exec, Privilege::Standard)?;
        if !output.is_success() {
            return Err(ExportError::VolumeInit {
                container: container.to_owned(),
                failure: CommandFailure::new(exec, &output),
            });
        }
        Ok(())
    }

    fn gluster_command(&self, container: &str, subcommand: &str) -> String {
        format!(
            "{} exec {} gluster {subcommand}",
            self.config.docker_bin,
            quote(container)
        )
    }

    /// Stops and removes `container` along with its glusterd state.
    ///
    /// Every step runs regardless of earlier failures; failures are logged
    /// and returned in the report.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidName`] before any command runs when
    /// `container` is not a container hash, and [`ExportError::Remote`] when
    /// `ssh` cannot be started.
    pub fn stop(&self, container: &str) -> Result<TeardownReport, ExportError> {
        self.validate_name(container)?;
        let docker = &self.config.docker_bin;
        let steps = [
            format!(
                "{docker} stop --time={} {}",
                self.config.stop_timeout_secs,
                quote(container)
            ),
            format!("{docker} rm {}", quote(container)),
            format!("rm -rf {}", quote(&self.state_dir(container))),
        ];

        let mut report = TeardownReport {
            container: container.to_owned(),
            failures: Vec::new(),
        };
        for step in steps {
            let output = self.remote.execute(&step, Privilege::Elevated)?;
            if !output.is_success() {
                let failure = CommandFailure::new(step, &output);
                warn!(container, %failure, "teardown step failed");
                report.failures.push(failure);
            }
        }

        info!(container, clean = report.is_clean(), "export container torn down");
        Ok(report)
    }

    /// Returns the NFS export served by `container`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::ContainerMissing`] when the container does not
    /// exist and [`ExportError::NoAddress`] when it has no bridge address.
    pub fn export_credentials(&self, container: &str) -> Result<NfsExport, ExportError> {
        let record = self
            .inspect(container)?
            .ok_or_else(|| ExportError::ContainerMissing {
                container: container.to_owned(),
            })?;
        let address = record.network_settings.ip_address.trim();
        if address.is_empty() {
            return Err(ExportError::NoAddress {
                container: container.to_owned(),
            });
        }
        Ok(NfsExport::new(container, address))
    }

    /// Returns the client mount command for `container`'s export.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::export_credentials`] errors.
    pub fn export_mount_command(&self, container: &str) -> Result<String, ExportError> {
        Ok(self.export_credentials(container)?.mount_command())
    }

    /// Container names end up in `rm -rf` paths, so only hashes produced by
    /// [`container_name`] are accepted.
    fn validate_name(&self, name: &str) -> Result<(), ExportError> {
        let length = self.config.container_name_length;
        let is_hash = name.len() == length
            && name
                .chars()
                .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
        if is_hash {
            Ok(())
        } else {
            Err(ExportError::InvalidName {
                container: name.to_owned(),
                length,
            })
        }
    }

    fn state_dir(&self, container: &str) -> String {
        format!(
            "{}/glusterd-{container}",
            self.config.state_root.trim_end_matches('/')
        )
    }

    fn run_command(&self, name: &str, volume_path: &Utf8Path) -> String {
        let quoted = quote(name);
        let dns = format!(
            "$(ip -4 -o addr show {} | awk '{{print $4}}' | cut -d/ -f1)",
            quote(&self.config.bridge_interface)
        );
        let state_volume = format!("{}:{GLUSTERD_STATE_PATH}", self.state_dir(name));
        let data_volume = format!("{volume_path}:{}", self.config.container_data_path);
        format!(
            "{docker} run --detach --restart=always --name={quoted} \
             --cap-add=SYS_ADMIN --cap-add=MKNOD --device=/dev/fuse \
             --hostname={quoted} --dns={dns} --volume={} --volume={} {}",
            quote(&state_volume),
            quote(&data_volume),
            quote(&self.config.image),
            docker = self.config.docker_bin,
        )
    }
}
