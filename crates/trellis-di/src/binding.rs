//! Registered bindings and their erased construction recipes

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::module::Declaration;
use crate::resolver::Injector;
use crate::scope::ScopeFamily;
use crate::signature::Signature;

/// Type-erased constructed value. Always wraps the canonical `Arc<T>`.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Erased construction recipe.
pub(crate) trait Construct: Send + Sync {
	fn construct(&self, injector: &mut Injector<'_>) -> DiResult<Instance>;
}

pub(crate) type ConstructFn = Arc<dyn Construct>;

/// Adapts a typed closure to [`Construct`].
pub(crate) struct ClosureRecipe<F, T> {
	closure: F,
	_output: PhantomData<fn() -> T>,
}

/// Erases a typed construction closure.
pub(crate) fn closure_recipe<T, F>(closure: F) -> ConstructFn
where
	F: Fn(&mut Injector<'_>) -> DiResult<T> + Send + Sync + 'static,
	T: Send + Sync + 'static,
{
	Arc::new(ClosureRecipe {
		closure,
		_output: PhantomData,
	})
}

impl<F, T> Construct for ClosureRecipe<F, T>
where
	F: Fn(&mut Injector<'_>) -> DiResult<T> + Send + Sync,
	T: Send + Sync + 'static,
{
	fn construct(&self, injector: &mut Injector<'_>) -> DiResult<Instance> {
		(self.closure)(injector).map(|value| Arc::new(value) as Instance)
	}
}

/// Hands out one pre-built value.
pub(crate) struct SharedRecipe<T>(pub(crate) Arc<T>);

impl<T: Send + Sync + 'static> Construct for SharedRecipe<T> {
	fn construct(&self, _injector: &mut Injector<'_>) -> DiResult<Instance> {
		Ok(self.0.clone() as Instance)
	}
}

/// Turns the canonical instance into a boxed `Arc<U>` for the signature's type.
pub(crate) type Projection = Arc<dyn Fn(&Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Cardinality of a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
	/// A new instance on every resolution, never cached.
	Factory,
	/// One instance per container.
	Singleton,
	/// One instance per open scope instance of the family.
	Scoped(ScopeFamily),
}

impl BindingKind {
	pub fn is_cached(&self) -> bool {
		!matches!(self, BindingKind::Factory)
	}

	pub fn scope_family(&self) -> Option<&ScopeFamily> {
		match self {
			BindingKind::Scoped(family) => Some(family),
			_ => None,
		}
	}
}

impl fmt::Display for BindingKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BindingKind::Factory => f.write_str("factory"),
			BindingKind::Singleton => f.write_str("singleton"),
			BindingKind::Scoped(family) => write!(f, "scoped({})", family),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BindingId(u64);

impl BindingId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}

	#[cfg(test)]
	pub(crate) fn for_tests(raw: u64) -> Self {
		Self(raw)
	}
}

/// How a binding's dependency list is obtained.
#[derive(Debug, Clone)]
pub(crate) enum Discovery {
	Declared(Vec<Signature>),
	Traced,
}

/// A canonical binding. Aliases point at the same `Arc<Binding>` and share its
/// cache slot.
pub(crate) struct Binding {
	pub(crate) id: BindingId,
	pub(crate) signature: Signature,
	pub(crate) kind: BindingKind,
	pub(crate) construct: ConstructFn,
	pub(crate) discovery: Discovery,
	/// Discovered once, on first plan build or warm-up.
	pub(crate) dependencies: OnceCell<Vec<Signature>>,
	/// Held while constructing a cached instance.
	pub(crate) lock: Mutex<()>,
	pub(crate) eager: bool,
	pub(crate) module_name: Arc<str>,
}

impl Binding {
	pub(crate) fn from_declaration(declaration: &Declaration, module_name: Arc<str>) -> Self {
		let discovery = match &declaration.dependencies {
			Some(declared) => Discovery::Declared(declared.clone()),
			None => Discovery::Traced,
		};
		Self {
			id: BindingId::next(),
			signature: declaration.signature.clone(),
			kind: declaration.kind.clone(),
			construct: declaration.construct.clone(),
			discovery,
			dependencies: OnceCell::new(),
			lock: Mutex::new(()),
			eager: declaration.eager,
			module_name,
		}
	}
}

impl fmt::Debug for Binding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Binding")
			.field("signature", &self.signature)
			.field("kind", &self.kind)
			.field("discovery", &self.discovery)
			.field("eager", &self.eager)
			.field("module", &self.module_name)
			.finish()
	}
}

/// One row of the binding table: a requested signature and the binding behind it.
pub(crate) struct Entry {
	pub(crate) signature: Signature,
	pub(crate) binding: Arc<Binding>,
	pub(crate) projection: Projection,
}

impl Entry {
	pub(crate) fn is_alias(&self) -> bool {
		self.signature != self.binding.signature
	}

	/// Views the canonical instance as the entry's requested type.
	pub(crate) fn project<T>(&self, instance: &Instance) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		(self.projection)(instance)
			.and_then(|boxed| boxed.downcast::<Arc<T>>().ok())
			.map(|boxed| *boxed)
			.ok_or_else(|| DiError::TypeMismatch {
				signature: self.signature.clone(),
				expected: std::any::type_name::<T>(),
			})
	}
}

/// Projection for the binding's own type.
pub(crate) fn identity_projection<T: Send + Sync + 'static>() -> Projection {
	Arc::new(|instance: &Instance| {
		instance
			.clone()
			.downcast::<T>()
			.ok()
			.map(|typed| Box::new(typed) as Box<dyn Any + Send + Sync>)
	})
}

/// Projection for an alias type reached through `cast`.
pub(crate) fn alias_projection<T, U, C>(cast: C) -> Projection
where
	T: Send + Sync + 'static,
	U: ?Sized + Send + Sync + 'static,
	C: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
{
	Arc::new(move |instance: &Instance| {
		instance
			.clone()
			.downcast::<T>()
			.ok()
			.map(|typed| Box::new(cast(typed)) as Box<dyn Any + Send + Sync>)
	})
}

/// Read-only description of a registered signature, for tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
	/// Signature under which the entry is looked up.
	pub signature: Signature,
	/// Signature of the binding owning the cache slot.
	pub canonical: Signature,
	pub kind: BindingKind,
	pub module: String,
	pub alias: bool,
	pub eager: bool,
}

impl BindingInfo {
	pub(crate) fn from_entry(entry: &Entry) -> Self {
		Self {
			signature: entry.signature.clone(),
			canonical: entry.binding.signature.clone(),
			kind: entry.binding.kind.clone(),
			module: entry.binding.module_name.to_string(),
			alias: entry.is_alias(),
			eager: entry.binding.eager,
		}
	}
}
