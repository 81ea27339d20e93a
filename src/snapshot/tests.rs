//! Unit tests for snapshot creation and removal.

use super::*;
use crate::test_support::{ScriptedRunner, SimulatedHost, executor_with};
use rstest::{fixture, rstest};

const ORIGIN: &str = "/dev/vg0/data";
const SNAPSHOT: &str = "/dev/vg0/build-42";

#[fixture]
fn host() -> SimulatedHost {
    SimulatedHost::new().with_origin_volume(ORIGIN)
}

#[rstest]
#[case("/dev/vg0/data", "build-42", "/dev/vg0/build-42")]
#[case("/dev/mapper/vg1/home", "snap", "/dev/mapper/vg1/snap")]
fn snapshot_path_keeps_parent_segments(
    #[case] origin: &str,
    #[case] name: &str,
    #[case] expected: &str,
) {
    let derived = snapshot_device_path(Utf8Path::new(origin), name).expect("path derives");
    assert_eq!(derived, Utf8PathBuf::from(expected));
}

#[rstest]
#[case("")]
#[case(".")]
#[case("..")]
#[case("a/b")]
#[case("build 42")]
#[case("build\u{7}")]
fn snapshot_path_rejects_bad_names(#[case] name: &str) {
    let err = snapshot_device_path(Utf8Path::new(ORIGIN), name).expect_err("name is invalid");
    assert!(matches!(err, SnapshotError::InvalidName { .. }), "{err:?}");
}

#[rstest]
#[case("data")]
#[case("/")]
fn snapshot_path_rejects_parentless_origins(#[case] origin: &str) {
    let err = snapshot_device_path(Utf8Path::new(origin), "snap").expect_err("origin is invalid");
    assert!(matches!(err, SnapshotError::InvalidOrigin { .. }), "{err:?}");
}

#[test]
fn create_issues_lvcreate_when_absent() {
    let runner = ScriptedRunner::new();
    runner.push_failure(2);
    runner.push_success();
    let remote = executor_with(runner.clone());

    let created = SnapshotLifecycle::new(&remote)
        .create(Utf8Path::new(ORIGIN), "build-42", "5G")
        .expect("create should succeed");

    assert_eq!(created, Utf8PathBuf::from(SNAPSHOT));
    assert_eq!(
        runner.remote_commands(),
        vec![
            String::from("ls /dev/vg0/build-42"),
            String::from("sudo lvcreate --size 5G --snapshot --name build-42 /dev/vg0/data"),
        ]
    );
}

#[rstest]
fn create_is_idempotent(host: SimulatedHost) {
    let remote = executor_with(host.clone());
    let lifecycle = SnapshotLifecycle::new(&remote);

    let first = lifecycle
        .create(Utf8Path::new(ORIGIN), "build-42", "5G")
        .expect("first create");
    let second = lifecycle
        .create(Utf8Path::new(ORIGIN), "build-42", "5G")
        .expect("second create");

    assert_eq!(first, second);
    assert_eq!(host.count_commands("lvcreate"), 1);
    assert!(host.path_exists(SNAPSHOT));
}

#[rstest]
fn create_raises_lvcreate_failure(host: SimulatedHost) {
    host.fail_on("lvcreate", 5);
    let remote = executor_with(host);

    let err = SnapshotLifecycle::new(&remote)
        .create(Utf8Path::new(ORIGIN), "build-42", "5G")
        .expect_err("failing lvcreate should be raised");

    let SnapshotError::Create { snapshot, failure } = err else {
        panic!("expected create error, got {err:?}");
    };
    assert_eq!(snapshot, Utf8PathBuf::from(SNAPSHOT));
    assert_eq!(failure.status, Some(5));
}

#[rstest]
fn create_rejects_blank_size_before_running_commands(host: SimulatedHost) {
    let remote = executor_with(host.clone());

    let err = SnapshotLifecycle::new(&remote)
        .create(Utf8Path::new(ORIGIN), "build-42", "  ")
        .expect_err("blank size should fail");

    assert_eq!(err, SnapshotError::InvalidSize);
    assert!(host.commands().is_empty());
}

#[rstest]
fn remove_deletes_snapshot(host: SimulatedHost) {
    host.add_volume(SNAPSHOT, "swi-a-s---");
    let remote = executor_with(host.clone());

    let removed = SnapshotLifecycle::new(&remote)
        .remove(Utf8Path::new(SNAPSHOT))
        .expect("remove should succeed");

    assert_eq!(removed, Utf8PathBuf::from(SNAPSHOT));
    assert!(!host.path_exists(SNAPSHOT));
    assert_eq!(host.count_commands("lvremove --force /dev/vg0/build-42"), 1);
}

#[rstest]
fn remove_of_missing_device_is_a_no_op(host: SimulatedHost) {
    let remote = executor_with(host.clone());

    let removed = SnapshotLifecycle::new(&remote)
        .remove(Utf8Path::new(SNAPSHOT))
        .expect("absent snapshot is fine");

    assert_eq!(removed, Utf8PathBuf::from(SNAPSHOT));
    assert_eq!(host.commands(), vec![String::from("ls /dev/vg0/build-42")]);
}

#[rstest]
fn remove_refuses_origin_volumes(host: SimulatedHost) {
    let remote = executor_with(host.clone());

    let err = SnapshotLifecycle::new(&remote)
        .remove(Utf8Path::new(ORIGIN))
        .expect_err("origin must not be removed");

    assert_eq!(
        err,
        SnapshotError::NotSnapshot {
            device: Utf8PathBuf::from(ORIGIN),
            attributes: String::from("owi-aos---"),
        }
    );
    assert_eq!(host.count_commands("lvremove"), 0);
    assert!(host.path_exists(ORIGIN));
}

#[rstest]
fn remove_reports_lvremove_failure(host: SimulatedHost) {
    host.add_volume(SNAPSHOT, "Swi-I-s---");
    host.fail_on("lvremove", 5);
    let remote = executor_with(host);

    let err = SnapshotLifecycle::new(&remote)
        .remove(Utf8Path::new(SNAPSHOT))
        .expect_err("lvremove failure should be raised");
    assert!(matches!(err, SnapshotError::Removal { .. }), "{err:?}");
}
