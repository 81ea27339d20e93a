//! In-memory model of a remote host running LVM, `mount`, and Docker.
//!
//! [`SimulatedHost`] interprets the remote command strings the executor sends
//! over `ssh` and mutates its state the way the real tools would, so
//! behavioural tests can assert on end state rather than on exact argv.
//! Only the command shapes this crate emits are understood; anything else
//! exits with status 127.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::rc::Rc;

use crate::remote::{CommandOutput, CommandRunner, RemoteError};

const ORIGIN_ATTRIBUTES: &str = "owi-aos---";
const SNAPSHOT_ATTRIBUTES: &str = "swi-a-s---";
const NOT_FOUND: i32 = 127;

/// Stateful fake of the remote host.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the executor owns another.
#[derive(Clone, Debug, Default)]
pub struct SimulatedHost {
    state: Rc<RefCell<HostState>>,
}

#[derive(Debug, Default)]
struct HostState {
    paths: BTreeSet<String>,
    volumes: BTreeMap<String, String>,
    mounts: BTreeMap<String, String>,
    containers: BTreeMap<String, String>,
    gluster_volumes: BTreeSet<String>,
    started_volumes: BTreeSet<String>,
    failures: Vec<(String, i32)>,
    commands: Vec<String>,
    next_address: u8,
}

impl SimulatedHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an origin (non-snapshot) logical volume.
    #[must_use]
    pub fn with_origin_volume(self, device: &str) -> Self {
        self.add_volume(device, ORIGIN_ATTRIBUTES);
        self
    }

    /// Adds a logical volume with an explicit `lv_attr` string.
    pub fn add_volume(&self, device: &str, attributes: &str) {
        let mut state = self.state.borrow_mut();
        state
            .volumes
            .insert(device.to_owned(), attributes.to_owned());
        state.paths.insert(device.to_owned());
    }

    /// Adds a plain path (directory or non-LVM device).
    pub fn add_path(&self, path: &str) {
        self.state.borrow_mut().paths.insert(path.to_owned());
    }

    /// Records `device` as mounted at `path`, creating the directory.
    pub fn add_mount(&self, device: &str, path: &str) {
        let mut state = self.state.borrow_mut();
        state.paths.insert(path.to_owned());
        state.mounts.insert(path.to_owned(), device.to_owned());
    }

    /// Adds a running container with the given address.
    pub fn add_container(&self, name: &str, address: &str) {
        self.state
            .borrow_mut()
            .containers
            .insert(name.to_owned(), address.to_owned());
    }

    /// Makes every command starting with `prefix` (after any `sudo`) fail.
    pub fn fail_on(&self, prefix: &str, code: i32) {
        self.state
            .borrow_mut()
            .failures
            .push((prefix.to_owned(), code));
    }

    /// Drops every failure registered with [`Self::fail_on`].
    pub fn clear_failures(&self) {
        self.state.borrow_mut().failures.clear();
    }

    /// Returns every command received, including any `sudo` prefix.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    /// Counts received commands starting with `prefix` (after any `sudo`).
    #[must_use]
    pub fn count_commands(&self, prefix: &str) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|command| strip_sudo(command).starts_with(prefix))
            .count()
    }

    /// Returns `true` when `path` exists on the host.
    #[must_use]
    pub fn path_exists(&self, path: &str) -> bool {
        self.state.borrow().paths.contains(path)
    }

    /// Returns the device mounted at `path`, if any.
    #[must_use]
    pub fn mounted_device(&self, path: &str) -> Option<String> {
        self.state.borrow().mounts.get(path).cloned()
    }

    /// Returns `true` when a container called `name` exists.
    #[must_use]
    pub fn has_container(&self, name: &str) -> bool {
        self.state.borrow().containers.contains_key(name)
    }

    /// Returns `true` when the gluster volume `name` has been started.
    #[must_use]
    pub fn volume_started(&self, name: &str) -> bool {
        self.state.borrow().started_volumes.contains(name)
    }

    fn handle(&self, command: &str) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        state.commands.push(command.to_owned());
        let plain = strip_sudo(command);

        if let Some(code) = state
            .failures
            .iter()
            .find(|(prefix, _)| plain.starts_with(prefix.as_str()))
            .map(|(_, code)| *code)
        {
            return failure(code, "simulated failure");
        }

        let words: Vec<&str> = plain.split_whitespace().collect();
        match words.as_slice() {
            ["ls", path] => state.exists(path),
            ["lvs", "--noheadings", "-o", "lv_attr", device] => state.attributes(device),
            ["lvcreate", "--size", _, "--snapshot", "--name", name, origin] => {
                state.create_snapshot(origin, name)
            }
            ["lvremove", "--force", device] => state.remove_volume(device),
            ["lsblk", device, "-o", _, "--pairs"] => state.lsblk(device),
            ["df", "--sync", _, path] => state.df(path),
            ["mountpoint", "-q", path] => exit_with(state.mounts.contains_key(*path)),
            ["mkdir", "-p", path] => {
                state.paths.insert((*path).to_owned());
                success("")
            }
            ["mkdir", path] => exit_with(state.paths.insert((*path).to_owned())),
            ["rmdir", path] => exit_with(state.paths.remove(*path)),
            ["mount", "-o", "nouuid", device, path] => state.mount(device, path),
            ["umount", .., target] => state.umount(target),
            ["docker", "inspect", name] => state.inspect(name),
            ["docker", "run", rest @ ..] => state.run_container(rest),
            ["docker", "exec", name, "gluster", "volume", "create", volume, ..] => {
                state.create_gluster_volume(name, volume)
            }
            ["docker", "exec", name, "gluster", "volume", "info", volume] => {
                state.gluster_volume_info(name, volume)
            }
            ["docker", "exec", name, "gluster", "volume", "start", volume] => {
                state.start_gluster_volume(name, volume)
            }
            ["docker", "stop", _, name] => exit_with(state.containers.contains_key(*name)),
            ["docker", "rm", name] => {
                state.gluster_volumes.remove(*name);
                state.started_volumes.remove(*name);
                exit_with(state.containers.remove(*name).is_some())
            }
            ["rm", "-rf", path] => {
                state.paths.remove(*path);
                success("")
            }
            _ => failure(NOT_FOUND, "command not found"),
        }
    }
}

impl HostState {
    fn exists(&self, path: &str) -> CommandOutput {
        if self.paths.contains(path) {
            success(path)
        } else {
            failure(2, "No such file or directory")
        }
    }

    fn attributes(&self, device: &str) -> CommandOutput {
        match self.volumes.get(device) {
            Some(attributes) => success(&format!("  {attributes}\n")),
            None => failure(5, "Failed to find logical volume"),
        }
    }

    fn create_snapshot(&mut self, origin: &str, name: &str) -> CommandOutput {
        if !self.volumes.contains_key(origin) {
            return failure(5, "origin logical volume not found");
        }
        let snapshot = match origin.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/{name}"),
            None => name.to_owned(),
        };
        if self.volumes.contains_key(&snapshot) {
            return failure(5, "logical volume already exists");
        }
        self.volumes
            .insert(snapshot.clone(), SNAPSHOT_ATTRIBUTES.to_owned());
        self.paths.insert(snapshot);
        success("")
    }

    fn remove_volume(&mut self, device: &str) -> CommandOutput {
        if self.mounts.values().any(|mounted| mounted == device) {
            return failure(5, "logical volume is in use");
        }
        if self.volumes.remove(device).is_none() {
            return failure(5, "Failed to find logical volume");
        }
        self.paths.remove(device);
        success("")
    }

    fn lsblk(&self, device: &str) -> CommandOutput {
        if !self.paths.contains(device) {
            return failure(32, "not a block device");
        }
        let mountpoint = self
            .mounts
            .iter()
            .find(|(_, mounted)| mounted.as_str() == device)
            .map(|(path, _)| path.as_str())
            .unwrap_or_default();
        let kind = if self.volumes.contains_key(device) {
            "lvm"
        } else {
            "disk"
        };
        success(&format!(
            "NAME=\"{}\" UUID=\"5f1c2d9e-0000-4000-8000-000000000001\" MOUNTPOINT=\"{mountpoint}\" FSTYPE=\"xfs\" STATE=\"running\" SIZE=\"5G\" TYPE=\"{kind}\"\n",
            mapper_name(device)
        ))
    }

    fn df(&self, path: &str) -> CommandOutput {
        let header = "Filesystem     Type 1K-blocks    Used   Avail Mounted on\n";
        if let Some(device) = self.mounts.get(path) {
            return success(&format!(
                "{header}/dev/mapper/{} xfs 5232640 37856 5194784 {path}\n",
                mapper_name(device)
            ));
        }
        if self.paths.contains(path) {
            return success(&format!(
                "{header}/dev/sda1 ext4 41152736 9018744 30021896 /\n"
            ));
        }
        failure(1, "No such file or directory")
    }

    fn mount(&mut self, device: &str, path: &str) -> CommandOutput {
        if !self.paths.contains(device) {
            return failure(32, "special device does not exist");
        }
        if !self.paths.contains(path) {
            return failure(32, "mount point does not exist");
        }
        if self.mounts.contains_key(path) {
            return failure(32, "mount point is already in use");
        }
        self.mounts.insert(path.to_owned(), device.to_owned());
        success("")
    }

    fn umount(&mut self, target: &str) -> CommandOutput {
        if self.mounts.remove(target).is_some() {
            return success("");
        }
        let by_device = self
            .mounts
            .iter()
            .find(|(_, device)| device.as_str() == target)
            .map(|(path, _)| path.clone());
        match by_device {
            Some(path) => {
                self.mounts.remove(&path);
                success("")
            }
            None => failure(32, "not mounted"),
        }
    }

    fn inspect(&self, name: &str) -> CommandOutput {
        match self.containers.get(name) {
            Some(address) => success(&format!(
                "[{{\"Id\":\"{name}0000\",\"Name\":\"/{name}\",\"State\":{{\"Status\":\"running\",\"Running\":true}},\"NetworkSettings\":{{\"IPAddress\":\"{address}\"}}}}]\n"
            )),
            None => failure(1, "Error: No such object"),
        }
    }

    fn run_container(&mut self, args: &[&str]) -> CommandOutput {
        let Some(name) = args.iter().find_map(|arg| arg.strip_prefix("--name=")) else {
            return failure(125, "missing container name");
        };
        if self.containers.contains_key(name) {
            return failure(125, "container name is already in use");
        }
        if let Some(state_dir) = args
            .iter()
            .find_map(|arg| arg.strip_prefix("--volume="))
            .and_then(|mapping| mapping.split_once(':'))
            .map(|(host_path, _)| host_path)
        {
            self.paths.insert(state_dir.to_owned());
        }
        self.next_address = self.next_address.saturating_add(1);
        let address = format!("172.17.0.{}", self.next_address.saturating_add(1));
        self.containers.insert(name.to_owned(), address);
        success(&format!("{name}0000\n"))
    }

    fn create_gluster_volume(&mut self, container: &str, volume: &str) -> CommandOutput {
        if !self.containers.contains_key(container) {
            return failure(1, "No such container");
        }
        exit_with(self.gluster_volumes.insert(volume.to_owned()))
    }

    fn gluster_volume_info(&self, container: &str, volume: &str) -> CommandOutput {
        if !self.containers.contains_key(container) {
            return failure(1, "No such container");
        }
        if !self.gluster_volumes.contains(volume) {
            return failure(1, &format!("Volume {volume} does not exist"));
        }
        let status = if self.started_volumes.contains(volume) {
            "Started"
        } else {
            "Created"
        };
        success(&format!(
            "\nVolume Name: {volume}\nType: Distribute\nStatus: {status}\nNumber of Bricks: 1\n"
        ))
    }

    fn start_gluster_volume(&mut self, container: &str, volume: &str) -> CommandOutput {
        if !self.containers.contains_key(container) || !self.gluster_volumes.contains(volume) {
            return failure(1, "volume does not exist");
        }
        exit_with(self.started_volumes.insert(volume.to_owned()))
    }
}

impl CommandRunner for SimulatedHost {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError> {
        if program == "rsync" {
            let rendered = args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            self.state
                .borrow_mut()
                .commands
                .push(format!("rsync {rendered}"));
            return Ok(success(""));
        }

        let command = args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
            .ok_or_else(|| RemoteError::Spawn {
                program: program.to_owned(),
                message: String::from("no remote command supplied"),
            })?;
        Ok(self.handle(&command))
    }
}

fn strip_sudo(command: &str) -> &str {
    command.strip_prefix("sudo ").unwrap_or(command)
}

/// Device-mapper name as `lsblk` reports it: `/dev/vg0/build-42` becomes
/// `vg0-build--42`.
fn mapper_name(device: &str) -> String {
    let segments: Vec<&str> = device.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["dev", group, volume] => format!(
            "{}-{}",
            group.replace('-', "--"),
            volume.replace('-', "--")
        ),
        [.., last] => (*last).to_owned(),
        [] => String::new(),
    }
}

fn success(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

fn failure(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

fn exit_with(succeeded: bool) -> CommandOutput {
    if succeeded {
        success("")
    } else {
        failure(1, "simulated command failed")
    }
}
