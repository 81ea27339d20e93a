//! Configuration loading via `ortho-config`.
//!
//! [`VolsnapConfig`] merges defaults, configuration files, and environment
//! variables. The host descriptor, image override, and log level arrive via
//! CLI flags and are layered on top by the binary.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default GlusterFS image used for the export container.
pub const DEFAULT_IMAGE: &str = "suquant/glusterd:3.6.9.1";

/// Default parent directory for snapshot mountpoints.
pub const DEFAULT_MOUNT_ROOT: &str = "/mnt";

/// Default number of hex characters kept from the container name hash.
pub const DEFAULT_CONTAINER_NAME_LENGTH: usize = 10;

const MIN_CONTAINER_NAME_LENGTH: usize = 8;
const MAX_CONTAINER_NAME_LENGTH: usize = 64;

/// Remote host, container, and path settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VOLSNAP",
    discovery(
        app_name = "volsnap",
        env_var = "VOLSNAP_CONFIG_PATH",
        config_file_name = "volsnap.toml",
        dotfile_name = ".volsnap.toml",
        project_file_name = "volsnap.toml"
    )
)]
pub struct VolsnapConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `rsync` executable used for file transfers.
    #[ortho_config(default = "rsync".to_owned())]
    pub rsync_bin: String,
    /// Remote user used when the host descriptor omits one.
    #[ortho_config(default = "root".to_owned())]
    pub ssh_user: String,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
    /// Optional SSH private key. Supports tilde expansion.
    pub ssh_identity_file: Option<String>,
    /// Container CLI on the remote host.
    #[ortho_config(default = "docker".to_owned())]
    pub docker_bin: String,
    /// Image reference for the GlusterFS export container.
    #[ortho_config(default = DEFAULT_IMAGE.to_owned())]
    pub image: String,
    /// Directory under which `/<mount_root>/<name>` mountpoints are created.
    #[ortho_config(default = DEFAULT_MOUNT_ROOT.to_owned())]
    pub mount_root: String,
    /// Directory holding per-container `glusterd-<id>` state directories.
    #[ortho_config(default = "/opt/var/lib".to_owned())]
    pub state_root: String,
    /// Path inside the container where the snapshot is bind-mounted.
    #[ortho_config(default = "/data".to_owned())]
    pub container_data_path: String,
    /// Bridge interface whose IPv4 address serves as the container resolver.
    #[ortho_config(default = "docker0".to_owned())]
    pub bridge_interface: String,
    /// Grace period, in seconds, given to `docker stop`.
    #[ortho_config(default = 10)]
    pub stop_timeout_secs: u32,
    /// Number of hex characters kept from the container name hash.
    #[ortho_config(default = DEFAULT_CONTAINER_NAME_LENGTH)]
    pub container_name_length: usize,
    /// Remote directory holding `up`/`down` lock directories.
    #[ortho_config(default = "/run/lock".to_owned())]
    pub lock_dir: String,
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when a field is blank or out of range.
    #[error("invalid {field}: set VOLSNAP_{env_suffix} or add {field} to volsnap.toml", env_suffix = field.to_uppercase())]
    Invalid {
        /// Configuration field that failed validation.
        field: String,
    },
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

impl VolsnapConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("volsnap")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Ensures required values are present and numeric settings are sane.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (value, field) in [
            (self.ssh_bin.as_str(), "ssh_bin"),
            (self.rsync_bin.as_str(), "rsync_bin"),
            (self.ssh_user.as_str(), "ssh_user"),
            (self.docker_bin.as_str(), "docker_bin"),
            (self.image.as_str(), "image"),
            (self.mount_root.as_str(), "mount_root"),
            (self.state_root.as_str(), "state_root"),
            (self.container_data_path.as_str(), "container_data_path"),
            (self.bridge_interface.as_str(), "bridge_interface"),
            (self.lock_dir.as_str(), "lock_dir"),
        ] {
            Self::require_value(value, field)?;
        }
        if let Some(identity) = self.ssh_identity_file.as_deref() {
            Self::require_value(identity, "ssh_identity_file")?;
        }
        if !(MIN_CONTAINER_NAME_LENGTH..=MAX_CONTAINER_NAME_LENGTH)
            .contains(&self.container_name_length)
        {
            return Err(Self::invalid("container_name_length"));
        }
        Ok(())
    }

    /// Replaces the export image when an override is supplied.
    #[must_use]
    pub fn with_image(mut self, image: Option<String>) -> Self {
        if let Some(value) = image {
            self.image = value.trim().to_owned();
        }
        self
    }

    fn require_value(value: &str, field: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(Self::invalid(field));
        }
        Ok(())
    }

    fn invalid(field: &str) -> ConfigError {
        ConfigError::Invalid {
            field: field.to_owned(),
        }
    }
}
