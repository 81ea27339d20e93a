//! Records describing export containers and the NFS exports they serve.

use serde::{Deserialize, Serialize};

use crate::remote::CommandFailure;

/// Mount options handed to NFS clients of an export.
pub const NFS_MOUNT_OPTIONS: [&str; 7] = [
    "rw", "nofail", "noauto", "nolock", "soft", "noatime", "timeo=50",
];

/// State of the gluster volume inside an export container.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VolumeStatus {
    /// No volume of that name exists.
    Missing,
    /// The volume exists but is not started.
    Stopped,
    /// The volume is started and exported.
    Started,
}

impl VolumeStatus {
    /// Reads the `Status:` line of `gluster volume info` output.
    ///
    /// ```
    /// # use volsnap::export::VolumeStatus;
    /// let info = "Volume Name: dba3848d68\nType: Distribute\nStatus: Created\n";
    /// assert_eq!(VolumeStatus::from_info(info), VolumeStatus::Stopped);
    /// ```
    #[must_use]
    pub fn from_info(info: &str) -> Self {
        let status = info
            .lines()
            .find_map(|line| line.trim().strip_prefix("Status:"))
            .map(str::trim);
        match status {
            Some("Started") => Self::Started,
            Some(_) => Self::Stopped,
            None => Self::Missing,
        }
    }
}

/// Subset of `docker inspect` output describing one container.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerRecord {
    /// Full container identifier.
    pub id: String,
    /// Container name, as Docker reports it with a leading `/`.
    pub name: String,
    /// Runtime state.
    pub state: ContainerState,
    /// Network attachment of the default bridge.
    pub network_settings: NetworkSettings,
}

/// Runtime state of a container.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    /// Status word such as `running` or `exited`.
    pub status: String,
    /// Whether the container is running.
    pub running: bool,
}

/// Network settings of a container.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NetworkSettings {
    /// Address on the default bridge; empty when detached.
    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,
}

/// NFS export served by a running container.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NfsExport {
    /// Client mount options.
    pub options: Vec<String>,
    /// Address of the serving container.
    pub host: String,
    /// Exported path, `/<container>`.
    pub path: String,
}

impl NfsExport {
    /// Builds the export for `container` reachable at `host`.
    #[must_use]
    pub fn new(container: &str, host: &str) -> Self {
        Self {
            options: NFS_MOUNT_OPTIONS.iter().map(|opt| (*opt).to_owned()).collect(),
            host: host.to_owned(),
            path: format!("/{container}"),
        }
    }

    /// Returns the command a client runs to mount this export.
    ///
    /// ```
    /// # use volsnap::export::NfsExport;
    /// let export = NfsExport::new("dba3848d68", "172.17.0.2");
    /// assert_eq!(
    ///     export.mount_command(),
    ///     "mount -t nfs -o rw,nofail,noauto,nolock,soft,noatime,timeo=50 172.17.0.2:/dba3848d68",
    /// );
    /// ```
    #[must_use]
    pub fn mount_command(&self) -> String {
        format!(
            "mount -t nfs -o {} {}:{}",
            self.options.join(","),
            self.host,
            self.path
        )
    }
}

/// Outcome of tearing down an export container.
///
/// Teardown always runs every step; failures are collected here rather
/// than raised.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TeardownReport {
    /// Container that was torn down.
    pub container: String,
    /// Steps that exited unsuccessfully.
    pub failures: Vec<CommandFailure>,
}

impl TeardownReport {
    /// Returns `true` when every teardown step succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
