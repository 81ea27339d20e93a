//! Parsers for the raw text printed by `lvs`, `lsblk`, and `df`.

use camino::Utf8PathBuf;
use regex::Regex;
use serde::Serialize;

const LSBLK_PAIR_PATTERN: &str = r#"([A-Za-z0-9\-:]+)="([^"]*)""#;

/// One block device as described by `lsblk --pairs`.
///
/// Empty values are reported as `None`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BlockDevice {
    /// Kernel name, e.g. `vg0-build--42` for a device-mapper volume.
    pub name: String,
    /// Filesystem UUID.
    pub uuid: Option<String>,
    /// Where the device is mounted, if anywhere.
    pub mountpoint: Option<Utf8PathBuf>,
    /// Filesystem type.
    pub fstype: Option<String>,
    /// Device state such as `running`.
    pub state: Option<String>,
    /// Human-readable size.
    pub size: Option<String>,
    /// Device type such as `lvm` or `disk`.
    pub kind: Option<String>,
}

/// Filesystem usage as reported by `df`, in 1 KiB blocks.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FilesystemUsage {
    /// Source device of the filesystem.
    pub source: String,
    /// Filesystem type.
    pub fstype: String,
    /// Total size.
    pub size: u64,
    /// Used blocks.
    pub used: u64,
    /// Available blocks.
    pub avail: u64,
    /// Mount target.
    pub target: Utf8PathBuf,
}

impl FilesystemUsage {
    /// Returns the last path segment of the source, which matches the
    /// `lsblk` name for device-mapper sources such as `/dev/mapper/vg0-data`.
    #[must_use]
    pub fn source_device_name(&self) -> &str {
        self.source.rsplit('/').next().unwrap_or(&self.source)
    }
}

/// Extracts the attribute string from `lvs --noheadings -o lv_attr` output.
pub(super) fn parse_attributes(stdout: &str) -> Result<String, String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| String::from("lvs printed no attributes"))
}

/// Parses the first line of `lsblk --pairs` output.
pub(super) fn parse_block_device(stdout: &str) -> Result<BlockDevice, String> {
    let pattern = Regex::new(LSBLK_PAIR_PATTERN).map_err(|err| err.to_string())?;
    let line = stdout
        .lines()
        .find(|candidate| !candidate.trim().is_empty())
        .ok_or_else(|| String::from("lsblk printed nothing"))?;

    let mut device = BlockDevice {
        name: String::new(),
        uuid: None,
        mountpoint: None,
        fstype: None,
        state: None,
        size: None,
        kind: None,
    };
    for captures in pattern.captures_iter(line) {
        let (Some(key), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let text = non_empty(value.as_str());
        match key.as_str() {
            "NAME" => device.name = value.as_str().to_owned(),
            "UUID" => device.uuid = text,
            "MOUNTPOINT" => device.mountpoint = text.map(Utf8PathBuf::from),
            "FSTYPE" => device.fstype = text,
            "STATE" => device.state = text,
            "SIZE" => device.size = text,
            "TYPE" => device.kind = text,
            _ => {}
        }
    }

    if device.name.is_empty() {
        return Err(format!("lsblk line has no NAME: {line}"));
    }
    Ok(device)
}

/// Parses `df --output=source,fstype,size,used,avail,target` output.
pub(super) fn parse_usage(stdout: &str) -> Result<FilesystemUsage, String> {
    let line = stdout
        .lines()
        .skip(1)
        .find(|candidate| !candidate.trim().is_empty())
        .ok_or_else(|| String::from("df printed no data line"))?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    let [source, fstype, size, used, avail, target @ ..] = fields.as_slice() else {
        return Err(format!("df line has fewer than six fields: {line}"));
    };
    if target.is_empty() {
        return Err(format!("df line has fewer than six fields: {line}"));
    }

    Ok(FilesystemUsage {
        source: (*source).to_owned(),
        fstype: (*fstype).to_owned(),
        size: parse_blocks(size, "size")?,
        used: parse_blocks(used, "used")?,
        avail: parse_blocks(avail, "avail")?,
        target: Utf8PathBuf::from(target.join(" ")),
    })
}

fn parse_blocks(value: &str, column: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|err| format!("df {column} column `{value}` is not a block count: {err}"))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
