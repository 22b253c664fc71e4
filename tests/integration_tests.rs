//! Entry point for the integration test suite: one file per §8.4 scenario,
//! aggregated the way worktrunk's own `tests/integration_tests/mod.rs`
//! aggregates its per-behavior files.

#[path = "integration_tests/mod.rs"]
mod integration_tests;
