//! Binding identity: type keys, qualifiers and signatures

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::intern::{QUALIFIERS, identity};

/// Identity of a requested type.
///
/// Equality and hashing use the [`TypeId`]; the name is kept for error messages.
#[derive(Clone, Copy)]
pub struct TypeKey {
	id: TypeId,
	name: &'static str,
}

impl TypeKey {
	/// Type key for `T`. Unsized types such as `dyn Trait` are accepted.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	pub fn id(&self) -> TypeId {
		self.id
	}

	/// Fully qualified type name as reported by the compiler.
	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl PartialEq for TypeKey {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

/// Interned disambiguator between bindings of the same type.
///
/// Two qualifiers built from the same label are the same allocation, so comparison
/// is a pointer check.
///
/// # Examples
///
/// ```
/// use trellis_di::Qualifier;
///
/// let a = Qualifier::new("primary");
/// let b: Qualifier = "primary".into();
/// assert_eq!(a, b);
/// assert_eq!(a.label(), "primary");
/// ```
#[derive(Clone)]
pub struct Qualifier(Arc<str>);

impl Qualifier {
	pub fn new(label: &str) -> Self {
		Self(QUALIFIERS.intern(label))
	}

	pub fn label(&self) -> &str {
		&self.0
	}
}

impl PartialEq for Qualifier {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for Qualifier {}

impl Hash for Qualifier {
	fn hash<H: Hasher>(&self, state: &mut H) {
		identity(&self.0).hash(state);
	}
}

impl fmt::Debug for Qualifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Qualifier({:?})", self.label())
	}
}

impl fmt::Display for Qualifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl From<&str> for Qualifier {
	fn from(label: &str) -> Self {
		Self::new(label)
	}
}

impl From<String> for Qualifier {
	fn from(label: String) -> Self {
		Self::new(&label)
	}
}

impl From<&Qualifier> for Qualifier {
	fn from(qualifier: &Qualifier) -> Self {
		qualifier.clone()
	}
}

/// Lookup key of a binding: requested type plus optional qualifier.
///
/// # Examples
///
/// ```
/// use trellis_di::Signature;
///
/// struct Database;
///
/// let plain = Signature::of::<Database>();
/// let replica = Signature::named::<Database>("replica");
/// assert_ne!(plain, replica);
/// assert_eq!(replica.qualifier().map(|q| q.label()), Some("replica"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
	type_key: TypeKey,
	qualifier: Option<Qualifier>,
}

impl Signature {
	pub fn new(type_key: TypeKey, qualifier: Option<Qualifier>) -> Self {
		Self {
			type_key,
			qualifier,
		}
	}

	/// Unqualified signature of `T`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self::new(TypeKey::of::<T>(), None)
	}

	/// Signature of `T` disambiguated by `qualifier`.
	pub fn named<T: ?Sized + 'static>(qualifier: impl Into<Qualifier>) -> Self {
		Self::new(TypeKey::of::<T>(), Some(qualifier.into()))
	}

	pub fn type_key(&self) -> TypeKey {
		self.type_key
	}

	pub fn qualifier(&self) -> Option<&Qualifier> {
		self.qualifier.as_ref()
	}

	/// Returns a copy of this signature carrying `qualifier` instead.
	pub fn with_qualifier(&self, qualifier: Option<Qualifier>) -> Self {
		Self::new(self.type_key, qualifier)
	}
}

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.qualifier {
			Some(qualifier) => write!(f, "{}@{}", self.type_key, qualifier),
			None => write!(f, "{}", self.type_key),
		}
	}
}
