//! Core library for the volsnap snapshot export tool.
//!
//! The crate drives a remote host over `ssh` to create copy-on-write LVM
//! snapshots, mount them, and serve each one from a GlusterFS container so
//! other hosts can mount it over NFS. [`SnapshotOrchestrator::up`] and
//! [`SnapshotOrchestrator::down`] compose the lifecycle; the individual
//! components are exposed for finer-grained use.

pub mod config;
pub mod export;
pub mod inspect;
pub mod lock;
pub mod mount;
pub mod orchestrator;
pub mod remote;
pub mod snapshot;
pub mod test_support;

pub use config::{ConfigError, VolsnapConfig};
pub use export::{
    ContainerRecord, ExportError, FilesystemExporter, NfsExport, TeardownReport, container_name,
};
pub use inspect::{BlockDevice, DeviceInspector, FilesystemUsage, InspectError};
pub use lock::{LockError, RemoteLock};
pub use mount::{MountError, MountManager, UnmountOptions};
pub use orchestrator::{OrchestratorError, SnapshotOrchestrator};
pub use remote::{
    CommandFailure, CommandOutput, CommandRunner, HostParseError, Privilege,
    ProcessCommandRunner, RemoteCommandOutput, RemoteError, RemoteExecutor, RemoteHost,
    SshOptions,
};
pub use snapshot::{SnapshotError, SnapshotLifecycle, snapshot_device_path};
