//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedRunner`] replays canned outputs for exact-argv assertions;
//! [`SimulatedHost`] models a host's volumes, mounts, and containers for
//! behavioural tests of whole workflows.

mod scripted;
mod simulated;

pub use scripted::{CommandInvocation, ScriptedRunner};
pub use simulated::SimulatedHost;

use crate::config::{DEFAULT_CONTAINER_NAME_LENGTH, DEFAULT_IMAGE, DEFAULT_MOUNT_ROOT, VolsnapConfig};
use crate::remote::{CommandRunner, RemoteExecutor, RemoteHost, SshOptions};

/// Host descriptor used throughout the test suites.
pub const TEST_HOST_DESCRIPTOR: &str = "ssh://core@st01.example.com:22/";

/// Returns a configuration populated with the built-in defaults, without
/// consulting files or the environment.
#[must_use]
pub fn default_config() -> VolsnapConfig {
    VolsnapConfig {
        ssh_bin: String::from("ssh"),
        rsync_bin: String::from("rsync"),
        ssh_user: String::from("root"),
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
        ssh_identity_file: None,
        docker_bin: String::from("docker"),
        image: String::from(DEFAULT_IMAGE),
        mount_root: String::from(DEFAULT_MOUNT_ROOT),
        state_root: String::from("/opt/var/lib"),
        container_data_path: String::from("/data"),
        bridge_interface: String::from("docker0"),
        stop_timeout_secs: 10,
        container_name_length: DEFAULT_CONTAINER_NAME_LENGTH,
        lock_dir: String::from("/run/lock"),
    }
}

/// Returns the host parsed from [`TEST_HOST_DESCRIPTOR`].
#[must_use]
pub fn test_host() -> RemoteHost {
    RemoteHost {
        user: String::from("core"),
        host: String::from("st01.example.com"),
        port: 22,
    }
}

/// Builds an executor for [`test_host`] with default SSH options.
#[must_use]
pub fn executor_with<R: CommandRunner>(runner: R) -> RemoteExecutor<R> {
    RemoteExecutor::new(test_host(), SshOptions::from(&default_config()), runner)
}
