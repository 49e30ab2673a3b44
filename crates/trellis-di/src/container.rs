//! The container facade
//!
//! A [`Container`] owns a binding registry, the instance caches and the plan cache.
//! It is an ordinary value: create as many as needed, share one by reference across
//! threads, and [`reset`](Container::reset) it between tests.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::binding::{Binding, BindingInfo, BindingKind, Discovery, Entry, Instance};
use crate::cache::InstanceCaches;
use crate::error::DiResult;
use crate::lazy::Deferred;
use crate::lock::ConstructionLocks;
use crate::module::{Module, ModuleId};
use crate::planner::{self, Plan, PlanCache, PlanInput};
use crate::registry::{ModuleRecord, Registry};
use crate::resolver::{self, ResolutionStack};
use crate::scope::{ScopeFamily, ScopeInstance};
use crate::settings::ContainerSettings;
use crate::signature::{Qualifier, Signature, TypeKey};

/// Registry, caches and resolution entry points.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use trellis_di::{Container, Module};
///
/// struct A;
/// struct B {
///     a: Arc<A>,
/// }
///
/// let mut module = Module::new("app");
/// module.singleton(|_| Ok(A)).no_dependencies();
/// module.factory(|inj| Ok(B { a: inj.get()? })).depends_on::<A>();
///
/// let container = Container::new();
/// container.register([&module]).unwrap();
///
/// let first = container.get::<B>().unwrap();
/// let second = container.get::<B>().unwrap();
/// assert!(!Arc::ptr_eq(&first, &second));
/// assert!(Arc::ptr_eq(&first.a, &second.a));
/// ```
pub struct Container {
	settings: ContainerSettings,
	registry: RwLock<Registry>,
	caches: Arc<InstanceCaches>,
	plans: PlanCache,
	locks: ConstructionLocks,
}

impl Default for Container {
	fn default() -> Self {
		Self::new()
	}
}

impl Container {
	pub fn new() -> Self {
		Self::with_settings(ContainerSettings::default())
	}

	pub fn with_settings(settings: ContainerSettings) -> Self {
		Self {
			settings,
			registry: RwLock::new(Registry::new()),
			caches: Arc::new(InstanceCaches::new()),
			plans: PlanCache::default(),
			locks: ConstructionLocks::default(),
		}
	}

	pub fn settings(&self) -> &ContainerSettings {
		&self.settings
	}

	pub(crate) fn caches(&self) -> &Arc<InstanceCaches> {
		&self.caches
	}

	pub(crate) fn locks(&self) -> &ConstructionLocks {
		&self.locks
	}

	/// Drops whatever was just cached for `binding` if it was unregistered while
	/// its closure ran.
	pub(crate) fn evict_if_unregistered(&self, binding: &Binding) {
		let current = self
			.registry
			.read()
			.lookup(&binding.signature)
			.is_some_and(|entry| entry.binding.id == binding.id);
		if !current {
			let evicted = self.caches.evict_binding(&binding.signature, binding.id);
			tracing::debug!(signature = %binding.signature, evicted, "binding unregistered during construction");
		}
	}

	// ===== Registration =====

	/// Registers a batch of modules.
	///
	/// The whole batch is rejected with `DuplicateBinding` if any signature is
	/// already registered or appears twice in the batch. Eager singletons are then
	/// built in declaration order before this returns; if one fails, every module
	/// of the batch is unregistered again and the error is returned.
	pub fn register<'m>(&self, modules: impl IntoIterator<Item = &'m Module>) -> DiResult<()> {
		let modules: Vec<&Module> = modules.into_iter().collect();
		let (eager, version) = {
			let mut registry = self.registry.write();
			let eager = registry.insert_batch(&modules)?;
			(eager, registry.version())
		};
		tracing::debug!(
			modules = ?modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
			version,
			eager = eager.len(),
			"modules registered"
		);

		for binding in eager {
			if let Err(error) = self.warm_binding(&binding) {
				tracing::warn!(
					signature = %binding.signature,
					module = %binding.module_name,
					error = %error,
					"eager construction failed, rolling back registration"
				);
				let ids: Vec<ModuleId> = modules.iter().map(|module| module.id()).collect();
				let records = self.registry.write().remove_batch(&ids);
				let evicted = self.evict_records(&records);
				tracing::debug!(modules = records.len(), evicted, version = self.version(), "registration rolled back");
				return Err(error);
			}
		}
		Ok(())
	}

	/// Removes a registered module, its aliases and their cached instances.
	///
	/// Returns `false` if the module is not registered.
	pub fn unregister(&self, module: &Module) -> bool {
		self.remove_module(module.id())
	}

	fn remove_module(&self, module: ModuleId) -> bool {
		let Some(record) = self.registry.write().remove_module(module) else {
			return false;
		};
		let evicted = self.evict_records(std::slice::from_ref(&record));
		tracing::debug!(
			module = %record.name,
			bindings = record.bindings.len(),
			evicted,
			version = self.version(),
			"module unregistered"
		);
		true
	}

	fn evict_records(&self, records: &[ModuleRecord]) -> usize {
		records
			.iter()
			.flat_map(|record| record.bindings.iter())
			.map(|binding| self.caches.evict_binding(&binding.signature, binding.id))
			.sum()
	}

	/// Removes every module and drops every cached instance.
	pub fn unregister_all(&self) {
		let removed = self.registry.write().clear();
		self.caches.clear();
		tracing::debug!(modules = removed, version = self.version(), "all modules unregistered");
	}

	/// Returns the container to its freshly constructed state, plans included.
	pub fn reset(&self) {
		self.unregister_all();
		self.plans.clear();
	}

	// ===== Resolution =====

	/// Resolves the unqualified binding of `T` without a scope.
	pub fn get<T>(&self) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get_with::<T>(None, None)
	}

	pub fn get_named<T>(&self, qualifier: impl Into<Qualifier>) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get_with::<T>(Some(qualifier.into()), None)
	}

	/// Resolves `T` against `scope`.
	pub fn get_in<T>(&self, scope: &ScopeInstance) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get_with::<T>(None, Some(scope))
	}

	pub fn get_named_in<T>(&self, qualifier: impl Into<Qualifier>, scope: &ScopeInstance) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get_with::<T>(Some(qualifier.into()), Some(scope))
	}

	/// General form of the `get` family.
	pub fn get_with<T>(&self, qualifier: Option<Qualifier>, scope: Option<&ScopeInstance>) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.resolve::<T>(&Signature::new(TypeKey::of::<T>(), qualifier), scope)
	}

	/// Returns a handle that resolves `T` when first observed.
	pub fn lazy_of<T>(&self, qualifier: Option<Qualifier>, scope: Option<&ScopeInstance>) -> Deferred<'_, T>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		Deferred::new(self, Signature::new(TypeKey::of::<T>(), qualifier), scope.cloned())
	}

	pub(crate) fn resolve<T>(&self, signature: &Signature, scope: Option<&ScopeInstance>) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		let entry = self.entry(signature)?;
		let instance = self.resolve_root(&entry, scope)?;
		entry.project::<T>(&instance)
	}

	/// Top of a call chain: cache hit, else validate the plan and construct with a
	/// fresh resolution stack.
	fn resolve_root(&self, entry: &Entry, scope: Option<&ScopeInstance>) -> DiResult<Instance> {
		if let Some(hit) = resolver::cached(self, &entry.binding, scope)? {
			tracing::trace!(signature = %entry.signature, "cache hit");
			return Ok(hit);
		}
		self.plan_for(&entry.binding)?;
		let mut stack = ResolutionStack::new(self.settings.max_resolution_depth);
		resolver::resolve_entry(self, entry, &mut stack, scope)
	}

	pub(crate) fn entry(&self, signature: &Signature) -> DiResult<Arc<Entry>> {
		let registry = self.registry.read();
		registry.lookup(signature).ok_or_else(|| registry.missing(signature))
	}

	fn warm_binding(&self, binding: &Arc<Binding>) -> DiResult<()> {
		let entry = self.entry(&binding.signature)?;
		self.resolve_root(&entry, None).map(|_| ())
	}

	// ===== Planning =====

	/// The validated plan for `signature` at the current registry version.
	pub fn plan(&self, signature: &Signature) -> DiResult<Arc<Plan>> {
		let entry = self.entry(signature)?;
		self.plan_for(&entry.binding)
	}

	/// Plans every registered binding, failing on the first cycle.
	pub fn validate(&self) -> DiResult<()> {
		let mut bindings: Vec<Arc<Binding>> = self.registry.read().bindings().cloned().collect();
		bindings.sort_by_cached_key(|binding| binding.signature.to_string());
		for binding in bindings {
			self.plan_for(&binding)?;
		}
		Ok(())
	}

	/// Builds every cached node of the plan for `signature`, dependencies first.
	///
	/// Factories are skipped. Scoped nodes are built only when `scope` is given.
	pub fn warm_up(&self, signature: &Signature, scope: Option<&ScopeInstance>) -> DiResult<Arc<Plan>> {
		let plan = self.plan(signature)?;
		for node in plan.nodes() {
			let skip = match &node.kind {
				BindingKind::Factory => true,
				BindingKind::Scoped(_) => scope.is_none(),
				BindingKind::Singleton => false,
			};
			if skip {
				continue;
			}
			let entry = self.entry(&node.signature)?;
			let mut stack = ResolutionStack::new(self.settings.max_resolution_depth);
			resolver::resolve_entry(self, &entry, &mut stack, scope)?;
		}
		Ok(plan)
	}

	fn plan_for(&self, binding: &Binding) -> DiResult<Arc<Plan>> {
		let version = self.version();
		if self.settings.cache_plans {
			if let Some(plan) = self.plans.get(&binding.signature, version) {
				return Ok(plan);
			}
		}

		let root = self.plan_input(binding);
		let plan = Arc::new(planner::build(root, version, |signature| {
			let entry = self.registry.read().lookup(signature)?;
			Some(self.plan_input(&entry.binding))
		})?);
		if self.settings.cache_plans {
			self.plans.insert(plan.clone());
		}
		Ok(plan)
	}

	fn plan_input(&self, binding: &Binding) -> PlanInput {
		PlanInput {
			canonical: binding.signature.clone(),
			kind: binding.kind.clone(),
			dependencies: self.dependencies_of(binding),
		}
	}

	/// Dependencies of `binding`, discovered once.
	fn dependencies_of(&self, binding: &Binding) -> Vec<Signature> {
		binding
			.dependencies
			.get_or_init(|| match &binding.discovery {
				Discovery::Declared(declared) => declared.clone(),
				Discovery::Traced if self.settings.trace_undeclared_dependencies => self.trace(binding),
				Discovery::Traced => Vec::new(),
			})
			.clone()
	}

	fn trace(&self, binding: &Binding) -> Vec<Signature> {
		let (requested, outcome) = resolver::trace(binding);
		tracing::trace!(signature = %binding.signature, dependencies = requested.len(), "traced dependencies");
		// A singleton that asked for nothing already produced its real instance.
		if requested.is_empty() && binding.kind == BindingKind::Singleton {
			if let Ok(instance) = outcome {
				self.caches.store_singleton(&binding.signature, binding.id, instance);
			}
		}
		requested
	}

	// ===== Introspection =====

	/// Registry version; moves on every registration batch and unregistration.
	pub fn version(&self) -> u64 {
		self.registry.read().version()
	}

	pub fn contains<T: ?Sized + 'static>(&self) -> bool {
		self.contains_signature(&Signature::of::<T>())
	}

	pub fn contains_named<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
		self.contains_signature(&Signature::named::<T>(qualifier))
	}

	pub fn contains_signature(&self, signature: &Signature) -> bool {
		self.registry.read().contains(signature)
	}

	/// Number of registered signatures, aliases included.
	pub fn len(&self) -> usize {
		self.registry.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Registered signatures sorted by their display form.
	pub fn signatures(&self) -> Vec<Signature> {
		let mut signatures: Vec<Signature> = self
			.registry
			.read()
			.entries()
			.map(|entry| entry.signature.clone())
			.collect();
		signatures.sort_by_cached_key(ToString::to_string);
		signatures
	}

	pub fn bindings(&self) -> Vec<BindingInfo> {
		let mut bindings: Vec<BindingInfo> = self
			.registry
			.read()
			.entries()
			.map(|entry| BindingInfo::from_entry(entry))
			.collect();
		bindings.sort_by_cached_key(|info| info.signature.to_string());
		bindings
	}

	/// Interned scope family named `name`.
	pub fn scope_family(&self, name: &str) -> ScopeFamily {
		ScopeFamily::new(name)
	}
}

impl fmt::Debug for Container {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let registry = self.registry.read();
		f.debug_struct("Container")
			.field("settings", &self.settings)
			.field("version", &registry.version())
			.field("signatures", &registry.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Debug)]
	struct Leaf;

	#[rstest]
	fn speculative_singleton_instance_is_reused() {
		// Arrange
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let mut module = Module::new("leaf");
		module.singleton(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(Leaf)
		});
		let container = Container::new();
		container.register([&module]).unwrap();

		// Act
		let first = container.get::<Leaf>().unwrap();
		let second = container.get::<Leaf>().unwrap();

		// Assert
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[rstest]
	fn plans_are_cached_per_version() {
		// Arrange
		let mut module = Module::new("leaf");
		module.singleton(|_| Ok(Leaf)).no_dependencies();
		let container = Container::new();
		container.register([&module]).unwrap();

		// Act
		let first = container.plan(&Signature::of::<Leaf>()).unwrap();
		let second = container.plan(&Signature::of::<Leaf>()).unwrap();

		// Assert
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(first.version(), container.version());
	}

	#[rstest]
	fn disabled_plan_cache_rebuilds() {
		// Arrange
		let mut module = Module::new("leaf");
		module.singleton(|_| Ok(Leaf)).no_dependencies();
		let container = Container::with_settings(ContainerSettings::default().with_plan_cache(false));
		container.register([&module]).unwrap();

		// Act
		let first = container.plan(&Signature::of::<Leaf>()).unwrap();
		let second = container.plan(&Signature::of::<Leaf>()).unwrap();

		// Assert
		assert!(!Arc::ptr_eq(&first, &second));
	}

	#[rstest]
	fn reset_empties_the_container() {
		// Arrange
		let mut module = Module::new("leaf");
		module.instance(Leaf);
		let container = Container::new();
		container.register([&module]).unwrap();

		// Act
		container.reset();

		// Assert
		assert!(container.is_empty());
		assert!(container.get::<Leaf>().unwrap_err().is_missing_binding());
		assert!(!container.unregister(&module));
	}
}
