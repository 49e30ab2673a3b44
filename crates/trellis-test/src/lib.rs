//! Test utilities for the trellis container
//!
//! Provides rstest fixtures for containers and scopes, construction counters, and
//! tracing initialisation for test output.

pub mod fixtures;
pub mod logging;

pub use fixtures::*;
pub use logging::init_test_tracing;
