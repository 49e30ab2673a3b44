//! Instance caches owned by a container
//!
//! Singletons are keyed by canonical signature. Scoped instances are keyed by scope
//! instance id first, then canonical signature. Every slot remembers which binding
//! produced it, so a slot written by a binding that has since been unregistered is
//! never served to its replacement.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::binding::{BindingId, Instance};
use crate::scope::ScopeId;
use crate::signature::Signature;

struct CacheSlot {
	binding: BindingId,
	instance: Instance,
}

#[derive(Default)]
pub(crate) struct InstanceCaches {
	singletons: RwLock<HashMap<Signature, CacheSlot>>,
	scoped: RwLock<HashMap<ScopeId, HashMap<Signature, CacheSlot>>>,
}

impl InstanceCaches {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn singleton(&self, signature: &Signature, binding: BindingId) -> Option<Instance> {
		self.singletons
			.read()
			.get(signature)
			.filter(|slot| slot.binding == binding)
			.map(|slot| slot.instance.clone())
	}

	/// Stores a singleton. An existing slot of the same binding wins.
	pub(crate) fn store_singleton(
		&self,
		signature: &Signature,
		binding: BindingId,
		instance: Instance,
	) -> Instance {
		let replaced = {
			let mut singletons = self.singletons.write();
			match singletons.get(signature) {
				Some(slot) if slot.binding == binding => return slot.instance.clone(),
				_ => singletons.insert(
					signature.clone(),
					CacheSlot {
						binding,
						instance: instance.clone(),
					},
				),
			}
		};
		drop(replaced);
		instance
	}

	pub(crate) fn scoped(
		&self,
		scope: ScopeId,
		signature: &Signature,
		binding: BindingId,
	) -> Option<Instance> {
		self.scoped
			.read()
			.get(&scope)
			.and_then(|slots| slots.get(signature))
			.filter(|slot| slot.binding == binding)
			.map(|slot| slot.instance.clone())
	}

	/// Stores a scoped instance. An existing slot of the same binding wins.
	pub(crate) fn store_scoped(
		&self,
		scope: ScopeId,
		signature: &Signature,
		binding: BindingId,
		instance: Instance,
	) -> Instance {
		let replaced = {
			let mut scoped = self.scoped.write();
			let slots = scoped.entry(scope).or_default();
			match slots.get(signature) {
				Some(slot) if slot.binding == binding => return slot.instance.clone(),
				_ => slots.insert(
					signature.clone(),
					CacheSlot {
						binding,
						instance: instance.clone(),
					},
				),
			}
		};
		drop(replaced);
		instance
	}

	/// Takes every instance cached for `scope` out of the cache.
	///
	/// The instances are returned instead of dropped: their `Drop` may re-enter the
	/// cache, so callers release them once no guard is held.
	pub(crate) fn evict_scope(&self, scope: ScopeId) -> Vec<Instance> {
		let removed = self.scoped.write().remove(&scope);
		removed
			.map(|slots| slots.into_values().map(|slot| slot.instance).collect())
			.unwrap_or_default()
	}

	/// Drops the instances `binding` cached under `signature`, in every cache.
	/// Returns the number evicted.
	pub(crate) fn evict_binding(&self, signature: &Signature, binding: BindingId) -> usize {
		let mut removed: Vec<CacheSlot> = Vec::new();
		{
			let mut singletons = self.singletons.write();
			if singletons.get(signature).is_some_and(|slot| slot.binding == binding) {
				removed.extend(singletons.remove(signature));
			}
		}
		{
			let mut scoped = self.scoped.write();
			for slots in scoped.values_mut() {
				if slots.get(signature).is_some_and(|slot| slot.binding == binding) {
					removed.extend(slots.remove(signature));
				}
			}
			scoped.retain(|_, slots| !slots.is_empty());
		}
		let evicted = removed.len();
		drop(removed);
		evicted
	}

	pub(crate) fn clear(&self) {
		let singletons = std::mem::take(&mut *self.singletons.write());
		let scoped = std::mem::take(&mut *self.scoped.write());
		drop(singletons);
		drop(scoped);
	}

	#[cfg(test)]
	pub(crate) fn singleton_count(&self) -> usize {
		self.singletons.read().len()
	}

	#[cfg(test)]
	pub(crate) fn scoped_count(&self, scope: ScopeId) -> usize {
		self.scoped.read().get(&scope).map_or(0, HashMap::len)
	}
}
