//! Resolution of bindings into instances
//!
//! The resolver walks construction closures recursively. Each call chain carries
//! its own [`ResolutionStack`], passed explicitly through every nested resolution,
//! which detects cycles that were not visible to the planner.
//!
//! Cached kinds use double-checked construction: a lock-free cache read, then the
//! per-binding lock, a second read, and only then the closure. A closure therefore
//! runs at most once per binding (singletons) or per binding and scope instance
//! (scoped bindings). A chain that would wait on a lock held by a chain waiting on
//! it fails with `Cycle` instead of blocking.

use std::sync::Arc;

use crate::binding::{Binding, BindingKind, Entry, Instance};
use crate::container::Container;
use crate::error::{CycleOrigin, CyclePath, DiError, DiResult};
use crate::lock::ChainId;
use crate::scope::{ScopeFamily, ScopeInstance};
use crate::signature::{Qualifier, Signature};

/// Signatures currently under construction in one call chain.
///
/// # Examples
///
/// ```
/// use trellis_di::{ResolutionStack, Signature};
///
/// let mut stack = ResolutionStack::new(8);
/// stack.enter(Signature::of::<u8>()).unwrap();
/// stack.enter(Signature::of::<u16>()).unwrap();
///
/// let error = stack.enter(Signature::of::<u8>()).unwrap_err();
/// assert_eq!(error.cycle_path().unwrap().to_string(), "u8 -> u16 -> u8");
/// ```
#[derive(Debug)]
pub struct ResolutionStack {
	frames: Vec<Signature>,
	max_depth: usize,
	chain: ChainId,
}

impl ResolutionStack {
	pub fn new(max_depth: usize) -> Self {
		Self {
			frames: Vec::new(),
			max_depth,
			chain: ChainId::next(),
		}
	}

	/// Pushes `signature`, failing if it is already being resolved or the depth
	/// limit is reached. Nothing is pushed on failure.
	pub fn enter(&mut self, signature: Signature) -> DiResult<()> {
		if let Some(start) = self.frames.iter().position(|frame| *frame == signature) {
			let mut path: Vec<Signature> = self.frames[start..].to_vec();
			path.push(signature);
			return Err(DiError::Cycle {
				path: CyclePath(path),
				detected_by: CycleOrigin::Resolver,
			});
		}
		if self.frames.len() >= self.max_depth {
			return Err(DiError::MaxDepthExceeded(self.frames.len() + 1));
		}
		self.frames.push(signature);
		Ok(())
	}

	pub fn leave(&mut self) {
		self.frames.pop();
	}

	pub fn depth(&self) -> usize {
		self.frames.len()
	}

	pub fn contains(&self, signature: &Signature) -> bool {
		self.frames.contains(signature)
	}

	pub fn frames(&self) -> &[Signature] {
		&self.frames
	}

	pub(crate) fn chain(&self) -> ChainId {
		self.chain
	}
}

enum Mode<'a> {
	Live {
		container: &'a Container,
		stack: &'a mut ResolutionStack,
		scope: Option<&'a ScopeInstance>,
	},
	Probe {
		requested: &'a mut Vec<Signature>,
	},
}

/// Resolution surface handed to construction closures.
///
/// During normal resolution every query resolves through the owning container. While
/// dependencies are being traced, queries only record the requested signature and
/// return [`DiError::DiscoveryProbe`]; closures should propagate it with `?`.
pub struct Injector<'a> {
	mode: Mode<'a>,
}

impl<'a> Injector<'a> {
	pub(crate) fn live(
		container: &'a Container,
		stack: &'a mut ResolutionStack,
		scope: Option<&'a ScopeInstance>,
	) -> Self {
		Self {
			mode: Mode::Live {
				container,
				stack,
				scope,
			},
		}
	}

	pub(crate) fn probe(requested: &'a mut Vec<Signature>) -> Self {
		Self {
			mode: Mode::Probe { requested },
		}
	}

	/// Resolves the unqualified binding of `T`.
	pub fn get<T>(&mut self) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.resolve_typed(Signature::of::<T>())
	}

	/// Resolves the binding of `T` under `qualifier`.
	pub fn get_named<T>(&mut self, qualifier: impl Into<Qualifier>) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.resolve_typed(Signature::named::<T>(qualifier))
	}

	/// Like [`Injector::get`], but a missing binding yields `None`.
	pub fn try_get<T>(&mut self) -> DiResult<Option<Arc<T>>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match self.get::<T>() {
			Ok(value) => Ok(Some(value)),
			Err(error) if error.is_missing_binding() => Ok(None),
			Err(error) => Err(error),
		}
	}

	/// Scope instance the current chain resolves against, if any.
	pub fn scope(&self) -> Option<&ScopeInstance> {
		match &self.mode {
			Mode::Live { scope, .. } => *scope,
			Mode::Probe { .. } => None,
		}
	}

	/// Whether this injector is only tracing dependencies.
	pub fn is_probe(&self) -> bool {
		matches!(self.mode, Mode::Probe { .. })
	}

	fn resolve_typed<T>(&mut self, signature: Signature) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match &mut self.mode {
			Mode::Live {
				container,
				stack,
				scope,
			} => {
				let entry = container.entry(&signature)?;
				let instance = resolve_entry(container, &entry, stack, *scope)?;
				entry.project::<T>(&instance)
			}
			Mode::Probe { requested } => {
				requested.push(signature.clone());
				Err(DiError::DiscoveryProbe(signature))
			}
		}
	}
}

/// A scoped binding needs a scope instance of its own family.
fn require_scope<'s>(
	binding: &Binding,
	family: &ScopeFamily,
	scope: Option<&'s ScopeInstance>,
) -> DiResult<&'s ScopeInstance> {
	let scope = scope.ok_or_else(|| DiError::ScopeRequired {
		signature: binding.signature.clone(),
		family: family.clone(),
	})?;
	if scope.family() != family {
		return Err(DiError::WrongScope {
			signature: binding.signature.clone(),
			expected: family.clone(),
			actual: scope.family().clone(),
		});
	}
	Ok(scope)
}

/// Lock-free cache read. `Ok(None)` means a miss or a factory.
pub(crate) fn cached(
	container: &Container,
	binding: &Binding,
	scope: Option<&ScopeInstance>,
) -> DiResult<Option<Instance>> {
	let caches = container.caches();
	match &binding.kind {
		BindingKind::Factory => Ok(None),
		BindingKind::Singleton => Ok(caches.singleton(&binding.signature, binding.id)),
		BindingKind::Scoped(family) => {
			let scope = require_scope(binding, family, scope)?;
			scope.while_open(&binding.signature, || {
				caches.scoped(scope.id(), &binding.signature, binding.id)
			})
		}
	}
}

/// Resolves `entry` within an existing call chain.
pub(crate) fn resolve_entry(
	container: &Container,
	entry: &Entry,
	stack: &mut ResolutionStack,
	scope: Option<&ScopeInstance>,
) -> DiResult<Instance> {
	let binding = &entry.binding;
	if let Some(hit) = cached(container, binding, scope)? {
		tracing::trace!(signature = %entry.signature, "cache hit");
		return Ok(hit);
	}

	stack.enter(binding.signature.clone())?;
	let outcome = construct(container, binding, stack, scope);
	stack.leave();
	outcome
}

fn construct(
	container: &Container,
	binding: &Binding,
	stack: &mut ResolutionStack,
	scope: Option<&ScopeInstance>,
) -> DiResult<Instance> {
	match &binding.kind {
		BindingKind::Factory => invoke(container, binding, stack, scope),
		BindingKind::Singleton => {
			let _guard = container.locks().acquire(binding, stack.chain())?;
			let caches = container.caches();
			if let Some(hit) = caches.singleton(&binding.signature, binding.id) {
				return Ok(hit);
			}
			// Singletons outlive every scope, so their dependencies resolve unscoped.
			let instance = invoke(container, binding, stack, None)?;
			let stored = caches.store_singleton(&binding.signature, binding.id, instance);
			container.evict_if_unregistered(binding);
			Ok(stored)
		}
		BindingKind::Scoped(family) => {
			let scope = require_scope(binding, family, scope)?;
			scope.ensure_open(&binding.signature)?;

			let _guard = container.locks().acquire(binding, stack.chain())?;
			let caches = container.caches();
			let recheck = scope.while_open(&binding.signature, || {
				caches.scoped(scope.id(), &binding.signature, binding.id)
			})?;
			if let Some(hit) = recheck {
				return Ok(hit);
			}

			let instance = invoke(container, binding, stack, Some(scope))?;
			// The scope may have closed while the closure ran.
			let stored = scope.while_open(&binding.signature, || {
				scope.attach(caches);
				caches.store_scoped(scope.id(), &binding.signature, binding.id, instance)
			})?;
			container.evict_if_unregistered(binding);
			Ok(stored)
		}
	}
}

fn invoke(
	container: &Container,
	binding: &Binding,
	stack: &mut ResolutionStack,
	scope: Option<&ScopeInstance>,
) -> DiResult<Instance> {
	tracing::trace!(signature = %binding.signature, kind = %binding.kind, "constructing");
	let mut injector = Injector::live(container, stack, scope);
	binding
		.construct
		.construct(&mut injector)
		.map_err(|error| error.in_construction_of(&binding.signature))
}

/// Runs a closure against a probing injector and returns what it asked for.
///
/// The closure's own result is returned as well: a closure that requested nothing
/// may have produced a real instance.
pub(crate) fn trace(binding: &Binding) -> (Vec<Signature>, DiResult<Instance>) {
	let mut requested = Vec::new();
	let outcome = {
		let mut injector = Injector::probe(&mut requested);
		binding.construct.construct(&mut injector)
	};
	let mut unique: Vec<Signature> = Vec::with_capacity(requested.len());
	for signature in requested {
		if !unique.contains(&signature) {
			unique.push(signature);
		}
	}
	(unique, outcome)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	struct A;
	struct B;
	struct C;

	#[rstest]
	fn stack_reports_cycle_segment_only() {
		// Arrange
		let mut stack = ResolutionStack::new(10);
		stack.enter(Signature::of::<A>()).unwrap();
		stack.enter(Signature::of::<B>()).unwrap();
		stack.enter(Signature::of::<C>()).unwrap();

		// Act
		let error = stack.enter(Signature::of::<B>()).unwrap_err();

		// Assert
		assert_eq!(
			error.cycle_path().unwrap().signatures(),
			&[Signature::of::<B>(), Signature::of::<C>(), Signature::of::<B>()]
		);
		assert_eq!(stack.depth(), 3);
	}

	#[rstest]
	fn stack_enforces_depth_limit() {
		// Arrange
		let mut stack = ResolutionStack::new(2);
		stack.enter(Signature::of::<A>()).unwrap();
		stack.enter(Signature::of::<B>()).unwrap();

		// Act
		let result = stack.enter(Signature::of::<C>());

		// Assert
		assert!(matches!(result, Err(DiError::MaxDepthExceeded(3))));
		assert!(!stack.contains(&Signature::of::<C>()));
	}

	#[rstest]
	fn leaving_allows_reentry() {
		// Arrange
		let mut stack = ResolutionStack::new(4);
		stack.enter(Signature::of::<A>()).unwrap();

		// Act
		stack.leave();

		// Assert
		assert!(stack.enter(Signature::of::<A>()).is_ok());
	}

	#[rstest]
	fn probe_records_and_refuses() {
		// Arrange
		let mut requested = Vec::new();
		let mut injector = Injector::probe(&mut requested);

		// Act
		let first = injector.get::<A>();
		let second = injector.get_named::<B>("x");
		let probe = injector.is_probe();

		// Assert
		assert!(matches!(first, Err(DiError::DiscoveryProbe(_))));
		assert!(matches!(second, Err(DiError::DiscoveryProbe(_))));
		assert!(probe);
		assert_eq!(requested, vec![Signature::of::<A>(), Signature::named::<B>("x")]);
	}

	#[rstest]
	fn probe_try_get_does_not_hide_the_signal() {
		// Arrange
		let mut requested = Vec::new();
		let mut injector = Injector::probe(&mut requested);

		// Act
		let result = injector.try_get::<A>();

		// Assert
		assert!(matches!(result, Err(DiError::DiscoveryProbe(_))));
	}
}
