//! Unit tests for device inspection and output parsing.

use super::*;
use crate::test_support::{ScriptedRunner, SimulatedHost, executor_with};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};

#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

const LSBLK_MOUNTED: &str = "NAME=\"vg0-build--42\" UUID=\"5f1c2d9e\" MOUNTPOINT=\"/mnt/build-42\" \
FSTYPE=\"xfs\" STATE=\"running\" SIZE=\"5G\" TYPE=\"lvm\"\n";

#[rstest]
fn attributes_trims_lvs_padding(runner: ScriptedRunner) {
    runner.push_stdout("  swi-a-s---\n");
    let remote = executor_with(runner.clone());
    let inspector = DeviceInspector::new(&remote);

    let attributes = inspector
        .attributes(Utf8Path::new("/dev/vg0/build-42"))
        .expect("attributes should parse");

    assert_eq!(attributes, "swi-a-s---");
    assert_eq!(
        runner.remote_commands(),
        vec![String::from(
            "sudo lvs --noheadings -o lv_attr /dev/vg0/build-42"
        )]
    );
}

#[rstest]
fn attributes_reports_query_failure(runner: ScriptedRunner) {
    runner.push_output(Some(5), "", "  Failed to find logical volume \"vg0/x\"\n");
    let remote = executor_with(runner);
    let inspector = DeviceInspector::new(&remote);

    let err = inspector
        .attributes(Utf8Path::new("/dev/vg0/x"))
        .expect_err("failing lvs should be an error");

    let InspectError::Query { what, failure, .. } = err else {
        panic!("expected query error, got {err:?}");
    };
    assert_eq!(what, "attributes");
    assert_eq!(failure.status, Some(5));
    assert!(failure.stderr.contains("Failed to find logical volume"));
}

#[rstest]
fn attributes_rejects_empty_output(runner: ScriptedRunner) {
    runner.push_stdout("\n");
    let remote = executor_with(runner);
    let inspector = DeviceInspector::new(&remote);

    let err = inspector
        .attributes(Utf8Path::new("/dev/vg0/x"))
        .expect_err("empty lvs output should fail");
    assert!(matches!(err, InspectError::Parse { .. }));
}

#[rstest]
fn block_info_parses_pairs(runner: ScriptedRunner) {
    runner.push_stdout(LSBLK_MOUNTED);
    let remote = executor_with(runner.clone());
    let inspector = DeviceInspector::new(&remote);

    let device = inspector
        .block_info(Utf8Path::new("/dev/vg0/build-42"))
        .expect("lsblk should parse");

    assert_eq!(
        device,
        BlockDevice {
            name: String::from("vg0-build--42"),
            uuid: Some(String::from("5f1c2d9e")),
            mountpoint: Some(Utf8PathBuf::from("/mnt/build-42")),
            fstype: Some(String::from("xfs")),
            state: Some(String::from("running")),
            size: Some(String::from("5G")),
            kind: Some(String::from("lvm")),
        }
    );
    assert_eq!(
        runner.remote_commands(),
        vec![String::from(
            "lsblk /dev/vg0/build-42 -o NAME,UUID,MOUNTPOINT,FSTYPE,STATE,SIZE,TYPE --pairs"
        )]
    );
}

#[rstest]
fn block_info_maps_empty_values_to_none(runner: ScriptedRunner) {
    runner.push_stdout(
        "NAME=\"sdb\" UUID=\"\" MOUNTPOINT=\"\" FSTYPE=\"\" STATE=\"\" SIZE=\"10G\" TYPE=\"disk\"\n",
    );
    let remote = executor_with(runner);
    let inspector = DeviceInspector::new(&remote);

    let device = inspector
        .block_info(Utf8Path::new("/dev/sdb"))
        .expect("lsblk should parse");

    assert_eq!(device.name, "sdb");
    assert_eq!(device.mountpoint, None);
    assert_eq!(device.uuid, None);
    assert_eq!(device.size.as_deref(), Some("10G"));
}

#[rstest]
#[case("")]
#[case("UUID=\"abc\" TYPE=\"disk\"\n")]
fn block_info_requires_a_name(runner: ScriptedRunner, #[case] stdout: &str) {
    runner.push_stdout(stdout);
    let remote = executor_with(runner);
    let inspector = DeviceInspector::new(&remote);

    let err = inspector
        .block_info(Utf8Path::new("/dev/sdb"))
        .expect_err("nameless record should fail");
    assert!(matches!(err, InspectError::Parse { .. }));
}

#[rstest]
fn usage_skips_header_and_parses_columns(runner: ScriptedRunner) {
    runner.push_stdout(
        "Filesystem               Type 1K-blocks  Used   Avail Mounted on\n\
         /dev/mapper/vg0-build--42 xfs    5232640 37856 5194784 /mnt/build-42\n",
    );
    let remote = executor_with(runner.clone());
    let inspector = DeviceInspector::new(&remote);

    let usage = inspector
        .usage(Utf8Path::new("/mnt/build-42"))
        .expect("df should parse");

    assert_eq!(usage.source, "/dev/mapper/vg0-build--42");
    assert_eq!(usage.source_device_name(), "vg0-build--42");
    assert_eq!(usage.fstype, "xfs");
    assert_eq!((usage.size, usage.used, usage.avail), (5_232_640, 37_856, 5_194_784));
    assert_eq!(usage.target, Utf8PathBuf::from("/mnt/build-42"));
    assert_eq!(
        runner.remote_commands(),
        vec![String::from(
            "df --sync --output=source,fstype,size,used,avail,target /mnt/build-42"
        )]
    );
}

#[rstest]
#[case("Filesystem Type 1K-blocks Used Avail Mounted on\n")]
#[case("header\n/dev/sda1 ext4 100 50\n")]
#[case("header\n/dev/sda1 ext4 lots 50 50 /\n")]
fn usage_rejects_malformed_output(runner: ScriptedRunner, #[case] stdout: &str) {
    runner.push_stdout(stdout);
    let remote = executor_with(runner);
    let inspector = DeviceInspector::new(&remote);

    let err = inspector
        .usage(Utf8Path::new("/"))
        .expect_err("malformed df output should fail");
    assert!(matches!(err, InspectError::Parse { .. }), "{err:?}");
}

#[rstest]
fn usage_reports_query_failure(runner: ScriptedRunner) {
    runner.push_failure(1);
    let remote = executor_with(runner);
    let inspector = DeviceInspector::new(&remote);

    let err = inspector
        .usage(Utf8Path::new("/missing"))
        .expect_err("failing df should be an error");
    assert!(matches!(err, InspectError::Query { .. }));
}

#[rstest]
#[case(Some(0), true)]
#[case(Some(2), false)]
#[case(None, false)]
fn path_exists_follows_exit_status(
    runner: ScriptedRunner,
    #[case] code: Option<i32>,
    #[case] expected: bool,
) {
    runner.push_output(code, "", "");
    let remote = executor_with(runner.clone());
    let inspector = DeviceInspector::new(&remote);

    let exists = inspector
        .path_exists(Utf8Path::new("/mnt/with space"))
        .expect("probe should not error");

    assert_eq!(exists, expected);
    assert_eq!(
        runner.remote_commands(),
        vec![String::from("ls '/mnt/with space'")]
    );
}

#[test]
fn is_mountpoint_reflects_host_mounts() {
    let host = SimulatedHost::new().with_origin_volume("/dev/vg0/data");
    host.add_mount("/dev/vg0/data", "/srv/data");
    host.add_path("/srv/empty");
    let remote = executor_with(host);
    let inspector = DeviceInspector::new(&remote);

    assert!(
        inspector
            .is_mountpoint(Utf8Path::new("/srv/data"))
            .expect("probe")
    );
    assert!(
        !inspector
            .is_mountpoint(Utf8Path::new("/srv/empty"))
            .expect("probe")
    );
}
