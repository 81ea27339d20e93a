//! BDD scenarios for the snapshot lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Export a fresh snapshot"
)]
fn scenario_export_fresh_snapshot(lifecycle: LifecycleContext) {
    drop(lifecycle);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Bringing a snapshot up twice is idempotent"
)]
fn scenario_up_is_idempotent(lifecycle: LifecycleContext) {
    drop(lifecycle);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Snapshot creation failures abort up"
)]
fn scenario_create_failure_aborts(lifecycle: LifecycleContext) {
    drop(lifecycle);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Tear down an exported snapshot"
)]
fn scenario_tear_down(lifecycle: LifecycleContext) {
    drop(lifecycle);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse to remove an origin volume"
)]
fn scenario_refuse_origin_removal(lifecycle: LifecycleContext) {
    drop(lifecycle);
}
