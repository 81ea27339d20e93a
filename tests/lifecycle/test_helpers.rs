//! Shared fixtures for lifecycle BDD scenarios.

use std::cell::RefCell;

use camino::Utf8PathBuf;
use rstest::fixture;
use volsnap::test_support::{SimulatedHost, default_config, executor_with};
use volsnap::{OrchestratorError, SnapshotOrchestrator};

/// Host, orchestrator, and recorded outcomes for one scenario.
#[derive(Debug)]
pub struct LifecycleContext {
    pub host: SimulatedHost,
    pub orchestrator: SnapshotOrchestrator<SimulatedHost>,
    pub up: RefCell<Option<Result<String, OrchestratorError>>>,
    pub down: RefCell<Option<Result<Utf8PathBuf, OrchestratorError>>>,
}

#[fixture]
pub fn lifecycle() -> LifecycleContext {
    let host = SimulatedHost::new();
    let orchestrator = SnapshotOrchestrator::new(executor_with(host.clone()), default_config())
        .unwrap_or_else(|err| panic!("default config should validate: {err}"));
    LifecycleContext {
        host,
        orchestrator,
        up: RefCell::new(None),
        down: RefCell::new(None),
    }
}
