//! Shared fixtures for container tests
//!
//! All fixtures work with rstest and can be composed together.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::fixture;
use trellis_di::{Container, ContainerSettings, ScopeFamily, ScopeInstance};

use crate::logging::init_test_tracing;

/// Name of the scope family used by [`request_family`].
pub const REQUEST_FAMILY: &str = "request";

/// Empty container with default settings.
#[fixture]
pub fn container() -> Container {
	init_test_tracing();
	Container::new()
}

/// Empty container that never traces undeclared dependencies, leaving cycle
/// detection to the resolution stack.
#[fixture]
pub fn untraced_container() -> Container {
	init_test_tracing();
	Container::with_settings(ContainerSettings::default().with_tracing(false))
}

#[fixture]
pub fn request_family() -> ScopeFamily {
	ScopeFamily::new(REQUEST_FAMILY)
}

/// A fresh, already opened request scope.
#[fixture]
pub fn open_scope(request_family: ScopeFamily) -> ScopeInstance {
	let scope = request_family.create_instance();
	scope
		.open()
		.expect("A freshly created scope should open");
	scope
}

/// Counts how often a construction closure ran.
#[derive(Debug, Clone, Default)]
pub struct ConstructionCounter(Arc<AtomicUsize>);

impl ConstructionCounter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one construction and returns the new total.
	pub fn hit(&self) -> usize {
		self.0.fetch_add(1, Ordering::SeqCst) + 1
	}

	pub fn count(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}
}

#[fixture]
pub fn counter() -> ConstructionCounter {
	ConstructionCounter::new()
}
