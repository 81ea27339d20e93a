//! Lifecycle BDD scenarios against a simulated host.

mod bdd_steps;
mod scenarios;
mod test_helpers;
