//! Binding table of a container
//!
//! The registry maps every registered signature, aliases included, to an [`Entry`]
//! pointing at its canonical [`Binding`]. It also remembers which module owns which
//! bindings and carries the version counter that stamps plans.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::{Binding, Entry};
use crate::error::{DiError, DiResult, MissingReason};
use crate::module::{Module, ModuleId};
use crate::signature::Signature;

/// Bindings contributed by one registered module.
pub(crate) struct ModuleRecord {
	pub(crate) name: Arc<str>,
	pub(crate) signatures: Vec<Signature>,
	pub(crate) bindings: Vec<Arc<Binding>>,
}

#[derive(Default)]
pub(crate) struct Registry {
	entries: HashMap<Signature, Arc<Entry>>,
	modules: HashMap<ModuleId, ModuleRecord>,
	version: u64,
}

impl Registry {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn version(&self) -> u64 {
		self.version
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	pub(crate) fn lookup(&self, signature: &Signature) -> Option<Arc<Entry>> {
		self.entries.get(signature).cloned()
	}

	pub(crate) fn contains(&self, signature: &Signature) -> bool {
		self.entries.contains_key(signature)
	}

	pub(crate) fn entries(&self) -> impl Iterator<Item = &Arc<Entry>> {
		self.entries.values()
	}

	/// Canonical bindings of every registered module.
	pub(crate) fn bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
		self.modules.values().flat_map(|record| record.bindings.iter())
	}

	/// Builds the `MissingBinding` error for `signature`, listing the qualifiers its
	/// type is registered under.
	pub(crate) fn missing(&self, signature: &Signature) -> DiError {
		let type_key = signature.type_key();
		let mut available: Vec<Option<String>> = self
			.entries
			.keys()
			.filter(|candidate| candidate.type_key() == type_key)
			.map(|candidate| candidate.qualifier().map(|q| q.label().to_string()))
			.collect();
		available.sort();
		available.dedup();

		let reason = if available.is_empty() {
			MissingReason::UnknownType
		} else {
			MissingReason::UnknownQualifier { available }
		};
		DiError::MissingBinding {
			signature: signature.clone(),
			reason,
		}
	}

	/// Registers a batch of modules atomically.
	///
	/// Every signature of the batch is checked against the table and against the
	/// rest of the batch before anything is inserted. On success the version moves
	/// forward once and the bindings flagged eager are returned in declaration order.
	pub(crate) fn insert_batch(&mut self, modules: &[&Module]) -> DiResult<Vec<Arc<Binding>>> {
		let mut claimed: HashMap<&Signature, &str> = HashMap::new();
		for module in modules {
			for declaration in module.declarations() {
				for signature in declaration.signatures() {
					if let Some(existing) = self.entries.get(signature) {
						return Err(DiError::DuplicateBinding {
							signature: signature.clone(),
							existing_module: existing.binding.module_name.to_string(),
							module: module.name().to_string(),
						});
					}
					if let Some(existing) = claimed.insert(signature, module.name()) {
						return Err(DiError::DuplicateBinding {
							signature: signature.clone(),
							existing_module: existing.to_string(),
							module: module.name().to_string(),
						});
					}
				}
			}
		}

		let mut eager = Vec::new();
		for module in modules {
			let mut record = ModuleRecord {
				name: module.shared_name(),
				signatures: Vec::new(),
				bindings: Vec::new(),
			};
			for declaration in module.declarations() {
				let binding = Arc::new(Binding::from_declaration(declaration, module.shared_name()));
				self.insert_entry(&mut record, Entry {
					signature: declaration.signature.clone(),
					binding: binding.clone(),
					projection: declaration.projection.clone(),
				});
				for alias in &declaration.aliases {
					self.insert_entry(&mut record, Entry {
						signature: alias.signature.clone(),
						binding: binding.clone(),
						projection: alias.projection.clone(),
					});
				}
				if binding.eager {
					eager.push(binding.clone());
				}
				record.bindings.push(binding);
			}
			self.modules.insert(module.id(), record);
		}

		self.version += 1;
		Ok(eager)
	}

	fn insert_entry(&mut self, record: &mut ModuleRecord, entry: Entry) {
		record.signatures.push(entry.signature.clone());
		self.entries.insert(entry.signature.clone(), Arc::new(entry));
	}

	/// Removes a module and every signature it registered. `None` if the module is
	/// not registered.
	pub(crate) fn remove_module(&mut self, module: ModuleId) -> Option<ModuleRecord> {
		let record = self.take_module(module)?;
		self.version += 1;
		Some(record)
	}

	/// Removes several modules under a single version bump. The version is left
	/// alone when none of them was registered.
	pub(crate) fn remove_batch(&mut self, modules: &[ModuleId]) -> Vec<ModuleRecord> {
		let removed: Vec<_> = modules.iter().filter_map(|id| self.take_module(*id)).collect();
		if !removed.is_empty() {
			self.version += 1;
		}
		removed
	}

	fn take_module(&mut self, module: ModuleId) -> Option<ModuleRecord> {
		let record = self.modules.remove(&module)?;
		for signature in &record.signatures {
			self.entries.remove(signature);
		}
		Some(record)
	}

	/// Drops every binding. Returns the number of modules removed.
	pub(crate) fn clear(&mut self) -> usize {
		let removed = self.modules.len();
		self.entries.clear();
		self.modules.clear();
		self.version += 1;
		removed
	}
}
