//! Behavioural tests for the `volsnap` binary that need no remote host.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn help_lists_workflows() {
    let mut cmd = cargo_bin_cmd!("volsnap");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up").and(predicate::str::contains("down")));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let mut cmd = cargo_bin_cmd!("volsnap");
    cmd.assert().failure().code(2);
}

#[test]
fn malformed_host_is_reported() {
    let mut cmd = cargo_bin_cmd!("volsnap");
    cmd.env_remove("RUST_LOG")
        .args(["--ssh", "ssh://@st01.example.com/", "exists", "/mnt"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with("error:"));
}

#[test]
fn container_name_is_computed_locally() {
    let mut cmd = cargo_bin_cmd!("volsnap");
    cmd.env_remove("RUST_LOG")
        .args(["--ssh", "core@st01.example.com", "container-name", "/mnt/build-42"])
        .assert()
        .success()
        .stdout("dba3848d68\n");
}
