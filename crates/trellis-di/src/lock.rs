//! Per-binding construction locks with wait-for tracking
//!
//! Each resolution chain holds the lock of every cached binding it is building
//! until that binding is stored. Two chains that build each other's dependencies
//! through a cycle the planner never saw would block on each other forever. To
//! fail instead, every lock records its owning chain and every blocked chain
//! records the lock it waits for. A chain that finds itself at the end of the
//! resulting owner/waiter loop gives up with `Cycle`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::binding::{Binding, BindingId};
use crate::error::{CycleOrigin, CyclePath, DiError, DiResult};
use crate::signature::Signature;

/// How long a blocked chain sleeps on a lock before looking for a loop again.
const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Identity of one resolution call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChainId(u64);

impl ChainId {
	pub(crate) fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

#[derive(Default)]
struct WaitGraph {
	owners: HashMap<BindingId, ChainId>,
	waiting: HashMap<ChainId, (BindingId, Signature)>,
}

impl WaitGraph {
	/// Follows `chain -> wanted lock -> its owner -> ...`. Returns the signatures
	/// along the way when the walk comes back to `chain`.
	fn cycle_from(&self, chain: ChainId) -> Option<Vec<Signature>> {
		let mut path = Vec::new();
		let mut visited = HashSet::new();
		let mut current = chain;
		loop {
			let (binding, signature) = self.waiting.get(&current)?;
			path.push(signature.clone());
			let owner = *self.owners.get(binding)?;
			if owner == chain {
				path.push(path[0].clone());
				return Some(path);
			}
			if !visited.insert(owner) {
				// A loop among other chains; one of them reports it.
				return None;
			}
			current = owner;
		}
	}
}

/// Wait-for bookkeeping shared by the construction locks of one container.
#[derive(Default)]
pub(crate) struct ConstructionLocks {
	graph: Mutex<WaitGraph>,
}

impl ConstructionLocks {
	/// Takes `binding`'s construction lock for `chain`.
	///
	/// Fails with a `Cycle` when waiting would close a loop of chains that each
	/// hold a lock another one needs.
	pub(crate) fn acquire<'b>(&'b self, binding: &'b Binding, chain: ChainId) -> DiResult<ConstructionGuard<'b>> {
		let guard = match binding.lock.try_lock() {
			Some(guard) => guard,
			None => self.wait(binding, chain)?,
		};
		self.graph.lock().owners.insert(binding.id, chain);
		Ok(ConstructionGuard {
			locks: self,
			binding: binding.id,
			_guard: guard,
		})
	}

	fn wait<'b>(&self, binding: &'b Binding, chain: ChainId) -> DiResult<MutexGuard<'b, ()>> {
		self.graph
			.lock()
			.waiting
			.insert(chain, (binding.id, binding.signature.clone()));

		let outcome = loop {
			let cycle = self.graph.lock().cycle_from(chain);
			if let Some(path) = cycle {
				tracing::debug!(
					signature = %binding.signature,
					path = %CyclePath(path.clone()),
					"construction locks form a cycle"
				);
				break Err(DiError::Cycle {
					path: CyclePath(path),
					detected_by: CycleOrigin::Resolver,
				});
			}
			if let Some(guard) = binding.lock.try_lock_for(WAIT_SLICE) {
				break Ok(guard);
			}
		};

		self.graph.lock().waiting.remove(&chain);
		outcome
	}

	fn release(&self, binding: BindingId) {
		self.graph.lock().owners.remove(&binding);
	}
}

/// Held while a cached binding is being built. Releases ownership before the
/// lock itself.
pub(crate) struct ConstructionGuard<'b> {
	locks: &'b ConstructionLocks,
	binding: BindingId,
	_guard: MutexGuard<'b, ()>,
}

impl Drop for ConstructionGuard<'_> {
	fn drop(&mut self) {
		self.locks.release(self.binding);
	}
}
