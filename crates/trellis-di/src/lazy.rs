//! Deferred resolution handles

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::container::Container;
use crate::error::DiResult;
use crate::scope::ScopeInstance;
use crate::signature::Signature;

/// Handle that resolves its binding on first observation.
///
/// Creating the handle never fails. Missing bindings, closed scopes and cycles are
/// reported by [`Deferred::get`]. A successful result is memoized; failures are not,
/// so a later call can succeed once the binding is registered or the scope opened.
///
/// # Examples
///
/// ```
/// use trellis_di::{Container, Module};
///
/// #[derive(Debug)]
/// struct Mailer;
///
/// let container = Container::new();
/// let mailer = container.lazy_of::<Mailer>(None, None);
/// assert!(mailer.get().unwrap_err().is_missing_binding());
///
/// let mut module = Module::new("mail");
/// module.singleton(|_| Ok(Mailer));
/// container.register([&module]).unwrap();
/// assert!(mailer.get().is_ok());
/// ```
pub struct Deferred<'c, T: ?Sized> {
	container: &'c Container,
	signature: Signature,
	scope: Option<ScopeInstance>,
	value: OnceCell<Arc<T>>,
}

impl<'c, T> Deferred<'c, T>
where
	T: ?Sized + Send + Sync + 'static,
{
	pub(crate) fn new(container: &'c Container, signature: Signature, scope: Option<ScopeInstance>) -> Self {
		Self {
			container,
			signature,
			scope,
			value: OnceCell::new(),
		}
	}

	/// Resolves the binding, or returns the value resolved earlier.
	pub fn get(&self) -> DiResult<Arc<T>> {
		if let Some(value) = self.value.get() {
			return Ok(value.clone());
		}
		let resolved = self.container.resolve::<T>(&self.signature, self.scope.as_ref())?;
		Ok(self.value.get_or_init(|| resolved).clone())
	}

	pub fn is_resolved(&self) -> bool {
		self.value.get().is_some()
	}

	pub fn signature(&self) -> &Signature {
		&self.signature
	}
}

impl<T: ?Sized> fmt::Debug for Deferred<'_, T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Deferred")
			.field("signature", &self.signature)
			.field("scope", &self.scope.as_ref().map(ScopeInstance::id))
			.field("resolved", &self.value.get().is_some())
			.finish()
	}
}
