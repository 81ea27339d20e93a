//! BDD step definitions for the snapshot lifecycle.

use camino::Utf8Path;
use rstest_bdd_macros::{given, then, when};
use volsnap::{OrchestratorError, SnapshotError};

use super::test_helpers::LifecycleContext;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

#[given("an origin volume \"{device}\"")]
fn origin_volume(lifecycle: &LifecycleContext, device: String) {
    lifecycle.host.add_volume(&device, "owi-aos---");
}

#[given("the host fails \"{prefix}\" with exit code \"{code}\"")]
fn host_fails(lifecycle: &LifecycleContext, prefix: String, code: i32) {
    lifecycle.host.fail_on(&prefix, code);
}

#[given("snapshot \"{name}\" of \"{device}\" is up")]
fn snapshot_is_up(
    lifecycle: &LifecycleContext,
    name: String,
    device: String,
) -> Result<(), StepError> {
    lifecycle
        .orchestrator
        .up(Utf8Path::new(&device), &name, "5G")
        .map(drop)
        .map_err(|err| StepError::Assertion(format!("setup up failed: {err}")))
}

#[when("I bring up snapshot \"{name}\" of \"{device}\" with size \"{size}\"")]
fn bring_up(lifecycle: &LifecycleContext, name: String, device: String, size: String) {
    let outcome = lifecycle
        .orchestrator
        .up(Utf8Path::new(&device), &name, &size);
    lifecycle.up.replace(Some(outcome));
}

#[when("I tear down snapshot \"{name}\" of \"{device}\"")]
fn tear_down(lifecycle: &LifecycleContext, name: String, device: String) {
    let outcome = lifecycle.orchestrator.down(Utf8Path::new(&device), &name);
    lifecycle.down.replace(Some(outcome));
}

#[then("up succeeds with mount command for \"{source}\"")]
fn up_succeeds(lifecycle: &LifecycleContext, source: String) -> Result<(), StepError> {
    match lifecycle.up.borrow().as_ref() {
        Some(Ok(command)) => check(command.ends_with(&format!(" {source}")), || {
            format!("expected mount command for {source}, got: {command}")
        }),
        Some(Err(err)) => Err(StepError::Assertion(format!("up failed: {err}"))),
        None => Err(StepError::Assertion(String::from("up was not run"))),
    }
}

#[then("up fails while creating the snapshot")]
fn up_fails_creating(lifecycle: &LifecycleContext) -> Result<(), StepError> {
    match lifecycle.up.borrow().as_ref() {
        Some(Err(OrchestratorError::Snapshot(SnapshotError::Create { .. }))) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected snapshot creation failure, got {other:?}"
        ))),
    }
}

#[then("down succeeds")]
fn down_succeeds(lifecycle: &LifecycleContext) -> Result<(), StepError> {
    match lifecycle.down.borrow().as_ref() {
        Some(Ok(_)) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!("down failed: {err}"))),
        None => Err(StepError::Assertion(String::from("down was not run"))),
    }
}

#[then("down fails because the volume is not a snapshot")]
fn down_refuses_origin(lifecycle: &LifecycleContext) -> Result<(), StepError> {
    match lifecycle.down.borrow().as_ref() {
        Some(Err(OrchestratorError::Snapshot(SnapshotError::NotSnapshot { .. }))) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected not-a-snapshot refusal, got {other:?}"
        ))),
    }
}

#[then("the device \"{device}\" exists")]
fn device_exists(lifecycle: &LifecycleContext, device: String) -> Result<(), StepError> {
    check(lifecycle.host.path_exists(&device), || {
        format!("{device} should exist")
    })
}

#[then("the device \"{device}\" does not exist")]
fn device_absent(lifecycle: &LifecycleContext, device: String) -> Result<(), StepError> {
    check(!lifecycle.host.path_exists(&device), || {
        format!("{device} should have been removed")
    })
}

#[then("\"{path}\" is mounted from \"{device}\"")]
fn mounted_from(
    lifecycle: &LifecycleContext,
    path: String,
    device: String,
) -> Result<(), StepError> {
    let mounted = lifecycle.host.mounted_device(&path);
    check(mounted.as_deref() == Some(device.as_str()), || {
        format!("expected {device} at {path}, got {mounted:?}")
    })
}

#[then("the host ran \"{prefix}\" exactly \"{count}\" times")]
fn ran_exactly(
    lifecycle: &LifecycleContext,
    prefix: String,
    count: usize,
) -> Result<(), StepError> {
    let actual = lifecycle.host.count_commands(&prefix);
    check(actual == count, || {
        format!("expected {count} `{prefix}` commands, got {actual}")
    })
}

#[then("no export container serves \"{path}\"")]
fn no_container(lifecycle: &LifecycleContext, path: String) -> Result<(), StepError> {
    let config = lifecycle.orchestrator.config();
    let name = volsnap::export::container_name(
        Utf8Path::new(&path),
        config.container_name_length,
    );
    check(!lifecycle.host.has_container(&name), || {
        format!("container {name} for {path} should be gone")
    })
}
