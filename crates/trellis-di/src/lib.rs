//! # Trellis Dependency Injection
//!
//! Resolution engine of the trellis object-graph container.
//!
//! ## Features
//!
//! - **Typed lookups**: bindings are keyed by type and an optional interned qualifier
//! - **Three cardinalities**: factories, singletons, and bindings scoped to a scope family
//! - **Cycle detection**: whole-subgraph planning plus a per-call resolution stack
//! - **Single construction**: cached bindings are built at most once under contention
//! - **Aliases**: extra signatures, including trait objects, sharing one cache slot
//!
//! ## Development Tools (dev-tools feature)
//!
//! When the `dev-tools` feature is enabled, [`Plan::to_dot`] renders a resolution
//! plan in DOT format for Graphviz.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_di::{Container, Module, ScopeFamily};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! struct Request {
//!     greeter: Arc<dyn Greeter>,
//! }
//!
//! let request = ScopeFamily::new("request");
//!
//! let mut module = Module::new("greetings");
//! module
//!     .singleton(|_| Ok(English))
//!     .bind::<dyn Greeter>(|english| english);
//! module
//!     .scoped(&request, |inj| Ok(Request { greeter: inj.get::<dyn Greeter>()? }))
//!     .depends_on::<dyn Greeter>();
//!
//! let container = Container::new();
//! container.register([&module]).unwrap();
//!
//! let scope = request.create_instance();
//! scope.open().unwrap();
//!
//! let first = container.get_in::<Request>(&scope).unwrap();
//! let second = container.get_in::<Request>(&scope).unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! assert_eq!(first.greeter.greet(), "hello");
//!
//! scope.close();
//! let closed = container.get_in::<Request>(&scope);
//! assert!(matches!(closed, Err(error) if error.is_scope_closed()));
//! ```

mod binding;
mod cache;
mod container;
mod error;
mod intern;
mod lazy;
mod lock;
mod module;
mod planner;
mod registry;
mod resolver;
mod scope;
mod settings;
mod signature;

// Development tools
#[cfg(feature = "dev-tools")]
pub mod visualization;

pub use binding::{BindingInfo, BindingKind};
pub use container::Container;
pub use error::{CycleOrigin, CyclePath, DiError, DiResult, MissingReason};
pub use lazy::Deferred;
pub use module::{BindingBuilder, Module, ModuleId, OnDemand, Warmable};
pub use planner::{Plan, PlanNode};
pub use resolver::{Injector, ResolutionStack};
pub use scope::{ScopeFamily, ScopeId, ScopeInstance, ScopeState};
pub use settings::{ContainerSettings, DEFAULT_MAX_RESOLUTION_DEPTH};
pub use signature::{Qualifier, Signature, TypeKey};
