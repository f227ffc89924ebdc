//! # Spice Test Utilities
//!
//! Shared testing utilities:
//! - Determinism test harness
//! - Scenario fixtures
//! - Property-based testing strategies
//! - Tracing setup for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
