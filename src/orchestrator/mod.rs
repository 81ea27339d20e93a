//! `up` and `down` workflows composed from the lifecycle components.
//!
//! A snapshot moves through `absent → created → mounted → exported` on `up`
//! and back on `down`. Nothing is remembered between calls: each step
//! observes the host and skips work that is already done, so re-running a
//! workflow after a partial failure resumes where it stopped.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, VolsnapConfig};
use crate::export::{ExportError, FilesystemExporter};
use crate::inspect::{DeviceInspector, InspectError};
use crate::lock::{LockError, RemoteLock};
use crate::mount::{MountError, MountManager, UnmountOptions};
use crate::remote::{CommandRunner, RemoteError, RemoteExecutor};
use crate::snapshot::{SnapshotError, SnapshotLifecycle, snapshot_device_path};

/// Errors raised by [`SnapshotOrchestrator`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OrchestratorError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A command could not be sent.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// A query failed.
    #[error(transparent)]
    Inspect(#[from] InspectError),
    /// Snapshot creation or removal failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Mounting or unmounting failed.
    #[error(transparent)]
    Mount(#[from] MountError),
    /// The export container failed.
    #[error(transparent)]
    Export(#[from] ExportError),
    /// The workflow lock could not be taken or released.
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Owns the executor and configuration, and hands out the lifecycle
/// components that borrow them.
#[derive(Debug)]
pub struct SnapshotOrchestrator<R: CommandRunner> {
    remote: RemoteExecutor<R>,
    config: VolsnapConfig,
}

impl<R: CommandRunner> SnapshotOrchestrator<R> {
    /// Creates an orchestrator after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] when validation fails.
    pub fn new(remote: RemoteExecutor<R>, config: VolsnapConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self { remote, config })
    }

    /// Returns the executor.
    #[must_use]
    pub const fn remote(&self) -> &RemoteExecutor<R> {
        &self.remote
    }

    /// Returns the validated configuration.
    #[must_use]
    pub const fn config(&self) -> &VolsnapConfig {
        &self.config
    }

    /// Returns a device inspector.
    #[must_use]
    pub const fn inspector(&self) -> DeviceInspector<'_, R> {
        DeviceInspector::new(&self.remote)
    }

    /// Returns the snapshot lifecycle manager.
    #[must_use]
    pub const fn snapshots(&self) -> SnapshotLifecycle<'_, R> {
        SnapshotLifecycle::new(&self.remote)
    }

    /// Returns the mount manager.
    #[must_use]
    pub const fn mounts(&self) -> MountManager<'_, R> {
        MountManager::new(&self.remote)
    }

    /// Returns the export container manager.
    #[must_use]
    pub const fn exporter(&self) -> FilesystemExporter<'_, R> {
        FilesystemExporter::new(&self.remote, &self.config)
    }

    /// Returns `<mount_root>/<name>`.
    #[must_use]
    pub fn mount_path_for(&self, name: &str) -> Utf8PathBuf {
        Utf8Path::new(&self.config.mount_root).join(name)
    }

    /// Creates, mounts, and exports a snapshot of `device` called `name`,
    /// returning the NFS mount command for clients.
    ///
    /// Steps that already hold are skipped. The first failure aborts the
    /// workflow and leaves completed steps in place.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error wrapped in
    /// [`OrchestratorError`].
    pub fn up(&self, device: &Utf8Path, name: &str, size: &str) -> Result<String, OrchestratorError> {
        snapshot_device_path(device, name)?;
        if size.trim().is_empty() {
            return Err(SnapshotError::InvalidSize.into());
        }

        self.lock_for(device, name).hold(|| -> Result<String, OrchestratorError> {
            let snapshot = self.snapshots().create(device, name, size)?;
            let mount_path = self.mounts().mount(&snapshot, &self.mount_path_for(name))?;
            let exporter = self.exporter();
            let container = exporter.run(&exporter.container_name(&mount_path), &mount_path)?;
            let command = exporter.export_mount_command(&container)?;
            info!(%snapshot, %mount_path, %container, "snapshot exported");
            Ok(command)
        })
    }

    /// Tears down the export, mount, and snapshot created by [`Self::up`]
    /// and returns the snapshot path.
    ///
    /// Export teardown is best effort: its failures are logged and the
    /// workflow continues. An unmounted path is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when unmounting or removal fails, or
    /// when the lock cannot be taken.
    pub fn down(&self, device: &Utf8Path, name: &str) -> Result<Utf8PathBuf, OrchestratorError> {
        let snapshot = snapshot_device_path(device, name)?;
        let mount_path = self.mount_path_for(name);

        self.lock_for(device, name).hold(|| -> Result<Utf8PathBuf, OrchestratorError> {
            let exporter = self.exporter();
            let report = exporter.stop(&exporter.container_name(&mount_path))?;
            for failure in &report.failures {
                warn!(container = %report.container, %failure, "ignoring export teardown failure");
            }

            if self.inspector().is_mountpoint(&mount_path)? {
                self.mounts()
                    .umount(&mount_path, UnmountOptions::default())?;
            } else {
                info!(%mount_path, "not mounted; skipping umount");
            }

            let removed = self.snapshots().remove(&snapshot)?;
            info!(%removed, "snapshot torn down");
            Ok(removed)
        })
    }

    fn lock_for(&self, device: &Utf8Path, name: &str) -> RemoteLock<'_, R> {
        RemoteLock::new(
            &self.remote,
            Utf8Path::new(&self.config.lock_dir),
            device,
            name,
        )
    }
}
