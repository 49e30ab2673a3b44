//! Container settings.

use serde::{Deserialize, Serialize};

/// Default bound on nested resolutions in one call chain.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 100;

/// Tunables of a [`Container`](crate::Container).
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// use trellis_di::ContainerSettings;
///
/// let settings: ContainerSettings =
///     serde_json::from_str(r#"{ "max_resolution_depth": 16 }"#).unwrap();
/// assert_eq!(settings.max_resolution_depth, 16);
/// assert!(settings.trace_undeclared_dependencies);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
	/// Resolutions deeper than this fail with `MaxDepthExceeded`.
	pub max_resolution_depth: usize,

	/// Discover the dependencies of bindings without a declared list by running
	/// their closures against a probing injector. When disabled such bindings
	/// are leaves for the planner and only the resolution stack guards them.
	pub trace_undeclared_dependencies: bool,

	/// Keep built plans until the registry version moves.
	pub cache_plans: bool,
}

impl Default for ContainerSettings {
	fn default() -> Self {
		Self {
			max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
			trace_undeclared_dependencies: true,
			cache_plans: true,
		}
	}
}

impl ContainerSettings {
	pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
		self.max_resolution_depth = depth;
		self
	}

	pub fn with_tracing(mut self, enabled: bool) -> Self {
		self.trace_undeclared_dependencies = enabled;
		self
	}

	pub fn with_plan_cache(mut self, enabled: bool) -> Self {
		self.cache_plans = enabled;
		self
	}
}
