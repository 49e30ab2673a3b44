//! Declarative registration DSL
//!
//! A [`Module`] is an ordered list of binding declarations. It is handed to
//! [`Container::register`](crate::Container::register) as one batch and can later be
//! removed again with [`Container::unregister`](crate::Container::unregister).
//!
//! ```
//! use std::sync::Arc;
//! use trellis_di::{Container, Module, ScopeFamily};
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Pool {
//!     config: Arc<Config>,
//! }
//!
//! struct Session {
//!     pool: Arc<Pool>,
//! }
//!
//! let request = ScopeFamily::new("request");
//!
//! let mut module = Module::new("database");
//! module
//!     .singleton(|_| Ok(Config { url: "postgres://localhost".into() }))
//!     .eager();
//! module
//!     .singleton(|inj| Ok(Pool { config: inj.get()? }))
//!     .depends_on::<Config>();
//! module
//!     .scoped(&request, |inj| Ok(Session { pool: inj.get()? }))
//!     .depends_on::<Pool>();
//!
//! let container = Container::new();
//! container.register([&module]).unwrap();
//!
//! let scope = request.create_instance();
//! scope.open().unwrap();
//! let session = container.get_in::<Session>(&scope).unwrap();
//! assert_eq!(session.pool.config.url, "postgres://localhost");
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binding::{
	BindingKind, ConstructFn, Projection, SharedRecipe, alias_projection, closure_recipe,
	identity_projection,
};
use crate::error::DiResult;
use crate::resolver::Injector;
use crate::scope::ScopeFamily;
use crate::signature::{Qualifier, Signature};

/// Process-unique module id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u64);

impl ModuleId {
	pub(crate) fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for ModuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "module-{}", self.0)
	}
}

/// Additional signature sharing a declaration's cache slot.
pub(crate) struct Alias {
	pub(crate) signature: Signature,
	pub(crate) projection: Projection,
}

/// One declared binding, before registration.
pub(crate) struct Declaration {
	pub(crate) signature: Signature,
	pub(crate) kind: BindingKind,
	pub(crate) construct: ConstructFn,
	pub(crate) projection: Projection,
	/// `None` means discovered by tracing.
	pub(crate) dependencies: Option<Vec<Signature>>,
	pub(crate) eager: bool,
	pub(crate) aliases: Vec<Alias>,
}

impl Declaration {
	pub(crate) fn new(
		signature: Signature,
		kind: BindingKind,
		construct: ConstructFn,
		projection: Projection,
	) -> Self {
		Self {
			signature,
			kind,
			construct,
			projection,
			dependencies: None,
			eager: false,
			aliases: Vec::new(),
		}
	}

	/// Canonical signature followed by alias signatures.
	pub(crate) fn signatures(&self) -> impl Iterator<Item = &Signature> {
		std::iter::once(&self.signature).chain(self.aliases.iter().map(|alias| &alias.signature))
	}
}

/// Ordered batch of binding declarations.
pub struct Module {
	id: ModuleId,
	name: Arc<str>,
	declarations: Vec<Declaration>,
}

impl Module {
	pub fn new(name: impl Into<String>) -> Self {
		let name: String = name.into();
		Self {
			id: ModuleId::next(),
			name: Arc::from(name),
			declarations: Vec::new(),
		}
	}

	pub fn id(&self) -> ModuleId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Number of declarations, not counting aliases.
	pub fn len(&self) -> usize {
		self.declarations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.declarations.is_empty()
	}

	/// Every signature this module registers, aliases included, in declaration order.
	pub fn signatures(&self) -> Vec<Signature> {
		self.declarations
			.iter()
			.flat_map(Declaration::signatures)
			.cloned()
			.collect()
	}

	pub(crate) fn shared_name(&self) -> Arc<str> {
		self.name.clone()
	}

	pub(crate) fn declarations(&self) -> &[Declaration] {
		&self.declarations
	}

	/// Declares a single-instance binding for `T`.
	pub fn singleton<T, F>(&mut self, construct: F) -> BindingBuilder<'_, T, Warmable>
	where
		T: Send + Sync + 'static,
		F: Fn(&mut Injector<'_>) -> DiResult<T> + Send + Sync + 'static,
	{
		self.declare(BindingKind::Singleton, closure_recipe(construct))
	}

	/// Declares a binding that builds a new `T` on every resolution.
	pub fn factory<T, F>(&mut self, construct: F) -> BindingBuilder<'_, T, OnDemand>
	where
		T: Send + Sync + 'static,
		F: Fn(&mut Injector<'_>) -> DiResult<T> + Send + Sync + 'static,
	{
		self.declare(BindingKind::Factory, closure_recipe(construct))
	}

	/// Declares a binding with one `T` per open instance of `family`.
	pub fn scoped<T, F>(&mut self, family: &ScopeFamily, construct: F) -> BindingBuilder<'_, T, OnDemand>
	where
		T: Send + Sync + 'static,
		F: Fn(&mut Injector<'_>) -> DiResult<T> + Send + Sync + 'static,
	{
		self.declare(BindingKind::Scoped(family.clone()), closure_recipe(construct))
	}

	/// Declares a singleton backed by an already built value.
	///
	/// The value has no dependencies and is handed out as the same `Arc`.
	pub fn instance<T>(&mut self, value: T) -> BindingBuilder<'_, T, OnDemand>
	where
		T: Send + Sync + 'static,
	{
		let builder: BindingBuilder<'_, T, OnDemand> =
			self.declare(BindingKind::Singleton, Arc::new(SharedRecipe(Arc::new(value))));
		builder.no_dependencies()
	}

	fn declare<T, K>(&mut self, kind: BindingKind, construct: ConstructFn) -> BindingBuilder<'_, T, K>
	where
		T: Send + Sync + 'static,
	{
		self.declarations.push(Declaration::new(
			Signature::of::<T>(),
			kind,
			construct,
			identity_projection::<T>(),
		));
		let index = self.declarations.len() - 1;
		BindingBuilder {
			declaration: &mut self.declarations[index],
			_marker: PhantomData,
		}
	}
}

impl fmt::Debug for Module {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Module")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("signatures", &self.signatures())
			.finish()
	}
}

/// Builder marker for singletons, which may be warmed eagerly.
pub struct Warmable;

/// Builder marker for bindings that are only built on demand.
pub struct OnDemand;

/// Refines the declaration most recently added to a [`Module`].
pub struct BindingBuilder<'m, T, K> {
	declaration: &'m mut Declaration,
	_marker: PhantomData<(fn() -> T, K)>,
}

impl<T, K> BindingBuilder<'_, T, K>
where
	T: Send + Sync + 'static,
{
	/// Disambiguates the binding with a qualifier.
	pub fn named(self, qualifier: impl Into<Qualifier>) -> Self {
		let signature = self.declaration.signature.with_qualifier(Some(qualifier.into()));
		self.declaration.signature = signature;
		self
	}

	/// Declares a dependency on `D`. Declaring any dependency disables tracing.
	pub fn depends_on<D: ?Sized + 'static>(self) -> Self {
		self.depends_on_signature(Signature::of::<D>())
	}

	/// Declares a dependency on `D` under `qualifier`.
	pub fn depends_on_named<D: ?Sized + 'static>(self, qualifier: impl Into<Qualifier>) -> Self {
		self.depends_on_signature(Signature::named::<D>(qualifier))
	}

	pub fn depends_on_signature(self, signature: Signature) -> Self {
		let declared = self.declaration.dependencies.get_or_insert_with(Vec::new);
		if !declared.contains(&signature) {
			declared.push(signature);
		}
		self
	}

	/// Declares that the binding needs nothing from the container.
	pub fn no_dependencies(self) -> Self {
		self.declaration.dependencies.get_or_insert_with(Vec::new);
		self
	}

	/// Registers `U` as an alias resolving to this binding's instance.
	///
	/// `cast` views the shared instance as `U`, typically an unsizing coercion to a
	/// trait object: `.bind::<dyn Repository>(|repo| repo)`.
	pub fn bind<U>(self, cast: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static) -> Self
	where
		U: ?Sized + Send + Sync + 'static,
	{
		self.alias(Signature::of::<U>(), alias_projection::<T, U, _>(cast))
	}

	/// Registers `U` under `qualifier` as an alias of this binding.
	pub fn bind_named<U>(
		self,
		qualifier: impl Into<Qualifier>,
		cast: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
	) -> Self
	where
		U: ?Sized + Send + Sync + 'static,
	{
		self.alias(Signature::named::<U>(qualifier), alias_projection::<T, U, _>(cast))
	}

	/// Makes the binding reachable under another qualifier of its own type.
	pub fn also_named(self, qualifier: impl Into<Qualifier>) -> Self {
		self.alias(Signature::named::<T>(qualifier), identity_projection::<T>())
	}

	fn alias(self, signature: Signature, projection: Projection) -> Self {
		self.declaration.aliases.push(Alias {
			signature,
			projection,
		});
		self
	}
}

impl<T> BindingBuilder<'_, T, Warmable>
where
	T: Send + Sync + 'static,
{
	/// Builds the singleton during registration instead of on first query.
	pub fn eager(self) -> Self {
		self.declaration.eager = true;
		self
	}
}
