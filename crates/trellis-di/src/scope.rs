//! Scope families and scope instances
//!
//! A [`ScopeFamily`] is an interned lifecycle category such as `"request"`. Each
//! call to [`ScopeFamily::create_instance`] yields a fresh [`ScopeInstance`] with a
//! never-reused id and the state machine `Created -> Open -> Closed`.
//!
//! Instances of scoped bindings live in the caches of the containers that built
//! them, keyed by the scope id. Closing the scope (or dropping its last handle)
//! evicts those entries from every attached container.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::binding::Instance;
use crate::cache::InstanceCaches;
use crate::error::{DiError, DiResult};
use crate::intern::{SCOPE_FAMILIES, identity};
use crate::signature::Signature;

/// Named, interned lifecycle category.
///
/// # Examples
///
/// ```
/// use trellis_di::ScopeFamily;
///
/// let request = ScopeFamily::new("request");
/// assert_eq!(request, ScopeFamily::new("request"));
/// assert_ne!(request, ScopeFamily::new("session"));
/// ```
#[derive(Clone)]
pub struct ScopeFamily(Arc<str>);

impl ScopeFamily {
	pub fn new(name: &str) -> Self {
		Self(SCOPE_FAMILIES.intern(name))
	}

	pub fn name(&self) -> &str {
		&self.0
	}

	/// Issues a new scope instance in the `Created` state.
	pub fn create_instance(&self) -> ScopeInstance {
		let id = ScopeId::next();
		tracing::trace!(family = %self, scope = %id, "scope instance created");
		ScopeInstance {
			inner: Arc::new(ScopeInner {
				id,
				family: self.clone(),
				state: RwLock::new(ScopeState::Created),
				attached: Mutex::new(Vec::new()),
			}),
		}
	}
}

impl PartialEq for ScopeFamily {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for ScopeFamily {}

impl Hash for ScopeFamily {
	fn hash<H: Hasher>(&self, state: &mut H) {
		identity(&self.0).hash(state);
	}
}

impl fmt::Debug for ScopeFamily {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ScopeFamily({:?})", self.name())
	}
}

impl fmt::Display for ScopeFamily {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Process-unique scope instance id. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
	fn next() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(&self) -> u64 {
		self.0
	}
}

impl fmt::Display for ScopeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "scope-{}", self.0)
	}
}

/// Lifecycle state of a scope instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
	Created,
	Open,
	Closed,
}

struct ScopeInner {
	id: ScopeId,
	family: ScopeFamily,
	state: RwLock<ScopeState>,
	/// Containers holding cached instances for this scope.
	attached: Mutex<Vec<Weak<InstanceCaches>>>,
}

impl ScopeInner {
	/// Takes this scope's instances out of every attached cache. The caller drops
	/// them once it holds no lock.
	fn evict_attached(&self) -> Vec<Instance> {
		let attached = std::mem::take(&mut *self.attached.lock());
		attached
			.iter()
			.filter_map(Weak::upgrade)
			.flat_map(|caches| caches.evict_scope(self.id))
			.collect()
	}
}

impl Drop for ScopeInner {
	fn drop(&mut self) {
		let evicted = self.evict_attached();
		if !evicted.is_empty() {
			tracing::trace!(scope = %self.id, evicted = evicted.len(), "dropped scope released cached instances");
		}
	}
}

/// One lifetime window of a scope family.
///
/// Handles are cheap to clone and share the same state. A scope cannot be
/// reopened once closed; create a new instance from the family instead.
///
/// # Examples
///
/// ```
/// use trellis_di::{ScopeFamily, ScopeState};
///
/// let scope = ScopeFamily::new("request").create_instance();
/// assert_eq!(scope.state(), ScopeState::Created);
///
/// scope.open().unwrap();
/// assert!(scope.is_open());
///
/// scope.close();
/// assert_eq!(scope.state(), ScopeState::Closed);
/// assert!(scope.open().is_err());
/// ```
#[derive(Clone)]
pub struct ScopeInstance {
	inner: Arc<ScopeInner>,
}

impl ScopeInstance {
	pub fn id(&self) -> ScopeId {
		self.inner.id
	}

	pub fn family(&self) -> &ScopeFamily {
		&self.inner.family
	}

	pub fn state(&self) -> ScopeState {
		*self.inner.state.read()
	}

	pub fn is_open(&self) -> bool {
		self.state() == ScopeState::Open
	}

	/// Moves `Created -> Open`. Any other starting state is rejected.
	pub fn open(&self) -> DiResult<()> {
		let mut state = self.inner.state.write();
		match *state {
			ScopeState::Created => {
				*state = ScopeState::Open;
				tracing::debug!(family = %self.inner.family, scope = %self.inner.id, "scope opened");
				Ok(())
			}
			from => Err(DiError::ScopeTransition {
				scope: self.inner.id,
				from,
				to: ScopeState::Open,
			}),
		}
	}

	/// Moves to `Closed` and evicts every instance cached for this scope.
	///
	/// Closing an already closed scope does nothing.
	pub fn close(&self) {
		let evicted = {
			let mut state = self.inner.state.write();
			if *state == ScopeState::Closed {
				return;
			}
			*state = ScopeState::Closed;
			// Evict while still holding the write lock so no in-flight construction can
			// publish into the cache after this point.
			self.inner.evict_attached()
		};
		tracing::debug!(
			family = %self.inner.family,
			scope = %self.inner.id,
			evicted = evicted.len(),
			"scope closed"
		);
		// Instance destructors may close other scopes or query a container.
		drop(evicted);
	}

	/// Runs `f` while the scope is guaranteed to stay open.
	///
	/// Fails with `ScopeClosed` when the scope is not open. `f` must not touch this
	/// scope's state.
	pub(crate) fn while_open<R>(&self, signature: &Signature, f: impl FnOnce() -> R) -> DiResult<R> {
		let state = self.inner.state.read();
		if *state != ScopeState::Open {
			return Err(DiError::ScopeClosed {
				signature: signature.clone(),
				scope: self.inner.id,
				state: *state,
			});
		}
		Ok(f())
	}

	pub(crate) fn ensure_open(&self, signature: &Signature) -> DiResult<()> {
		self.while_open(signature, || ())
	}

	/// Records that `caches` holds entries for this scope.
	pub(crate) fn attach(&self, caches: &Arc<InstanceCaches>) {
		let mut attached = self.inner.attached.lock();
		let already = attached
			.iter()
			.any(|existing| std::ptr::eq(existing.as_ptr(), Arc::as_ptr(caches)));
		if !already {
			attached.retain(|existing| existing.strong_count() > 0);
			attached.push(Arc::downgrade(caches));
		}
	}
}

impl PartialEq for ScopeInstance {
	fn eq(&self, other: &Self) -> bool {
		self.inner.id == other.inner.id
	}
}

impl Eq for ScopeInstance {}

impl fmt::Debug for ScopeInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ScopeInstance")
			.field("id", &self.inner.id)
			.field("family", &self.inner.family)
			.field("state", &self.state())
			.finish()
	}
}
