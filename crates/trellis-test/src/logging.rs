//! Test logging utilities
//!
//! Provides utilities for initializing tracing output in test environments.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize tracing for tests (call once)
///
/// Installs a `fmt` subscriber writing through the test harness, filtered by
/// `RUST_LOG` (default `trellis_di=debug`). Later calls do nothing.
///
/// # Examples
///
/// ```
/// use trellis_test::init_test_tracing;
///
/// init_test_tracing();
/// init_test_tracing();
/// ```
pub fn init_test_tracing() {
	INIT.call_once(|| {
		let filter =
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trellis_di=debug"));
		let _ = tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_test_writer()
			.try_init();
	});
}
