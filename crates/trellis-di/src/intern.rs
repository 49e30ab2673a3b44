//! Process-wide intern pools
//!
//! Qualifiers and scope family names are interned so that two values built from the
//! same label share one allocation and compare by pointer.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Pool of interned labels.
pub(crate) struct InternPool {
	entries: RwLock<HashSet<Arc<str>>>,
}

impl InternPool {
	fn new() -> Self {
		Self {
			entries: RwLock::new(HashSet::new()),
		}
	}

	/// Returns the canonical allocation for `label`, inserting it on first use.
	pub(crate) fn intern(&self, label: &str) -> Arc<str> {
		if let Some(existing) = self.entries.read().get(label) {
			return existing.clone();
		}

		let mut entries = self.entries.write();
		// Another thread may have inserted between the read and write locks
		if let Some(existing) = entries.get(label) {
			return existing.clone();
		}
		let interned: Arc<str> = Arc::from(label);
		entries.insert(interned.clone());
		interned
	}

	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.entries.read().len()
	}
}

/// Pool backing [`crate::Qualifier`].
pub(crate) static QUALIFIERS: Lazy<InternPool> = Lazy::new(InternPool::new);

/// Pool backing [`crate::ScopeFamily`].
pub(crate) static SCOPE_FAMILIES: Lazy<InternPool> = Lazy::new(InternPool::new);

/// Address of an interned label, used for identity hashing.
pub(crate) fn identity(label: &Arc<str>) -> usize {
	Arc::as_ptr(label) as *const u8 as usize
}
