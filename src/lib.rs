//! # Trellis
//!
//! An in-process object-graph container.
//!
//! Trellis resolves typed instances from declared construction recipes, keeps
//! singletons and scoped values at one instance each, rejects duplicate bindings
//! and reference cycles, and ties scoped values to explicit lifecycle windows.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis::prelude::*;
//!
//! struct Settings {
//!     name: &'static str,
//! }
//!
//! struct Service {
//!     settings: Arc<Settings>,
//! }
//!
//! let mut module = Module::new("app");
//! module.instance(Settings { name: "trellis" });
//! module
//!     .singleton(|inj| Ok(Service { settings: inj.get()? }))
//!     .depends_on::<Settings>();
//!
//! let container = Container::new();
//! container.register([&module]).unwrap();
//!
//! let service = container.get::<Service>().unwrap();
//! assert_eq!(service.settings.name, "trellis");
//! assert!(Arc::ptr_eq(&service, &container.get::<Service>().unwrap()));
//! ```
//!
//! ## Feature Flags
//!
//! - `dev-tools`: DOT rendering of resolution plans via `Plan::to_dot`

pub use trellis_di as di;
pub use trellis_di::*;

/// Commonly used items.
pub mod prelude {
	pub use trellis_di::{
		Container, ContainerSettings, Deferred, DiError, DiResult, Injector, Module, Qualifier,
		ScopeFamily, ScopeInstance, ScopeState, Signature,
	};
}
