//! Command-line interface definitions for the `volsnap` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `volsnap` binary.
#[derive(Debug, Parser)]
#[command(
    name = "volsnap",
    about = "Create, mount, and export LVM snapshots on a remote host over NFS",
    version,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Remote host descriptor, e.g. `ssh://core@st01.example.com:22/`.
    #[arg(long = "ssh", value_name = "DESCRIPTOR")]
    pub(crate) ssh: String,
    /// Override the GlusterFS export image.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// Log filter directive, e.g. `info` or `volsnap=debug`. `RUST_LOG` wins
    /// when set.
    #[arg(long, value_name = "LEVEL", default_value = "error")]
    pub(crate) log_level: String,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operations exposed by the CLI.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create, mount, and export a snapshot; prints the NFS mount command.
    Up(UpArgs),
    /// Stop the export, unmount, and remove a snapshot.
    Down(SnapshotArgs),
    /// Create a snapshot volume if it does not exist; prints its path.
    Create(UpArgs),
    /// Remove a snapshot volume; refuses non-snapshot volumes.
    Remove(DeviceArgs),
    /// Print the `lv_attr` string of a logical volume.
    Attributes(DeviceArgs),
    /// Print `lsblk` metadata of a device as JSON.
    Lsblk(DeviceArgs),
    /// Print `df` usage of a path as JSON.
    Df(PathArgs),
    /// Print whether a path exists on the host.
    Exists(PathArgs),
    /// Print whether a path is a mountpoint.
    IsMountpoint(PathArgs),
    /// Create a directory and its parents.
    Mkdir(PathArgs),
    /// Mount a device at a path.
    Mount(MountArgs),
    /// Unmount a path or device.
    Umount(UmountArgs),
    /// Print `docker inspect` details of a container as JSON.
    Inspect(ContainerArgs),
    /// Print the export container name for a volume path.
    ContainerName(PathArgs),
    /// Start the export container for a volume path.
    Run(RunArgs),
    /// Stop and remove an export container; prints the teardown report.
    Stop(ContainerArgs),
    /// Print the NFS export served by a container as JSON.
    NfsCredentials(ContainerArgs),
    /// Print the NFS mount command for a container.
    NfsMountCommand(ContainerArgs),
    /// Copy a local file to the host with rsync.
    Transfer(TransferArgs),
    /// Run a command on the host and relay its output and exit status.
    Ssh(SshArgs),
}

/// Arguments for `up` and `create`.
#[derive(Debug, Args)]
pub(crate) struct UpArgs {
    /// Origin logical volume, e.g. `/dev/vg0/data`.
    pub(crate) device: String,
    /// Snapshot name, e.g. `build-42`.
    pub(crate) name: String,
    /// Snapshot size as accepted by `lvcreate --size`, e.g. `5G`.
    pub(crate) size: String,
}

/// Arguments for `down`.
#[derive(Debug, Args)]
pub(crate) struct SnapshotArgs {
    /// Origin logical volume the snapshot was taken from.
    pub(crate) device: String,
    /// Snapshot name.
    pub(crate) name: String,
}

/// A single device argument.
#[derive(Debug, Args)]
pub(crate) struct DeviceArgs {
    /// Device path on the host.
    pub(crate) device: String,
}

/// A single path argument.
#[derive(Debug, Args)]
pub(crate) struct PathArgs {
    /// Path on the host.
    pub(crate) path: String,
}

/// Arguments for `mount`.
#[derive(Debug, Args)]
pub(crate) struct MountArgs {
    /// Device to mount.
    pub(crate) device: String,
    /// Mountpoint; created when missing.
    pub(crate) path: String,
}

/// Arguments for `umount`.
#[derive(Debug, Args)]
pub(crate) struct UmountArgs {
    /// Mountpoint or device to unmount.
    pub(crate) path: String,
    /// Force the unmount.
    #[arg(long)]
    pub(crate) force: bool,
    /// Detach now and clean up once the filesystem is idle.
    #[arg(long)]
    pub(crate) lazy: bool,
}

/// A single container argument.
#[derive(Debug, Args)]
pub(crate) struct ContainerArgs {
    /// Container name.
    pub(crate) container: String,
}

/// Arguments for `run`.
#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    /// Container name.
    pub(crate) name: String,
    /// Host path served by the container.
    pub(crate) volume_path: String,
}

/// Arguments for `transfer`.
#[derive(Debug, Args)]
pub(crate) struct TransferArgs {
    /// Local file to copy.
    pub(crate) local: String,
    /// Destination path on the host.
    pub(crate) remote: String,
    /// Create the destination's parent directory first.
    #[arg(long)]
    pub(crate) mkdir: bool,
}

/// Arguments for `ssh`.
#[derive(Debug, Args)]
pub(crate) struct SshArgs {
    /// Command to execute on the remote host (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) command: Vec<String>,
}
