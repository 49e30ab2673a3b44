//! Error types for dependency resolution and registration.
//!
//! Every error is raised synchronously at the offending call and never retried.
//! `MissingBinding` and `ScopeClosed` may be caught to implement optional
//! dependencies; duplicates and cycles are configuration defects.

use std::fmt;

use thiserror::Error;

use crate::scope::{ScopeFamily, ScopeId, ScopeState};
use crate::signature::Signature;

/// Why a lookup found no binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
	/// No binding of the requested type exists at all.
	UnknownType,
	/// The type is bound, but not under the requested qualifier.
	UnknownQualifier {
		/// Qualifiers registered for the type (`None` is the unqualified binding),
		/// sorted by label.
		available: Vec<Option<String>>,
	},
}

impl fmt::Display for MissingReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MissingReason::UnknownType => f.write_str("type is not registered"),
			MissingReason::UnknownQualifier { available } => {
				let labels: Vec<&str> = available
					.iter()
					.map(|label| label.as_deref().unwrap_or("<unqualified>"))
					.collect();
				write!(f, "qualifier is not registered, available: [{}]", labels.join(", "))
			}
		}
	}
}

/// Which guard reported a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOrigin {
	/// Whole-subgraph check while building a plan.
	Planner,
	/// Per-call resolution stack.
	Resolver,
}

/// Ordered signatures forming a cycle; the first and last entries are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Vec<Signature>);

impl CyclePath {
	pub fn signatures(&self) -> &[Signature] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for CyclePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
		f.write_str(&parts.join(" -> "))
	}
}

/// Dependency injection error
#[derive(Debug, Error)]
pub enum DiError {
	#[error("No binding for {signature}: {reason}")]
	MissingBinding {
		signature: Signature,
		reason: MissingReason,
	},

	#[error(
		"Duplicate binding for {signature}: already registered by module '{existing_module}', rejected from '{module}'"
	)]
	DuplicateBinding {
		signature: Signature,
		existing_module: String,
		module: String,
	},

	#[error("Circular dependency detected ({detected_by:?})\n  Path: {path}\nThis forms a cycle that cannot be resolved.")]
	Cycle {
		path: CyclePath,
		detected_by: CycleOrigin,
	},

	#[error("Scope {scope} is {state:?}, cannot resolve {signature}")]
	ScopeClosed {
		signature: Signature,
		scope: ScopeId,
		state: ScopeState,
	},

	#[error("{signature} belongs to scope family '{expected}', but a '{actual}' scope was supplied")]
	WrongScope {
		signature: Signature,
		expected: ScopeFamily,
		actual: ScopeFamily,
	},

	#[error("{signature} is scoped to '{family}' and needs a scope instance")]
	ScopeRequired {
		signature: Signature,
		family: ScopeFamily,
	},

	#[error("Scope {scope} cannot move from {from:?} to {to:?}")]
	ScopeTransition {
		scope: ScopeId,
		from: ScopeState,
		to: ScopeState,
	},

	/// Maximum resolution depth exceeded
	#[error(
		"Maximum resolution depth exceeded: {0}\nThis likely indicates an extremely deep or circular dependency chain."
	)]
	MaxDepthExceeded(usize),

	#[error("Instance bound to {signature} is not a {expected}")]
	TypeMismatch {
		signature: Signature,
		expected: &'static str,
	},

	/// A construction closure failed with its own error.
	#[error("Failed to construct {signature}: {source}")]
	Construction {
		signature: Signature,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	/// A construction closure returned an error that is not tied to a binding yet.
	#[error("{0}")]
	Custom(Box<dyn std::error::Error + Send + Sync>),

	/// Control signal handed to closures during traced dependency discovery.
	///
	/// Closures propagate it with `?`; it is consumed by the planner and never
	/// reaches callers of `get`.
	#[error("Dependency probe for {0}")]
	DiscoveryProbe(Signature),
}

impl DiError {
	/// Wraps an arbitrary error raised inside a construction closure.
	pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
		DiError::Custom(error.into())
	}

	pub fn is_missing_binding(&self) -> bool {
		matches!(self, DiError::MissingBinding { .. })
	}

	pub fn is_scope_closed(&self) -> bool {
		matches!(self, DiError::ScopeClosed { .. })
	}

	pub fn is_cycle(&self) -> bool {
		matches!(self, DiError::Cycle { .. })
	}

	/// Cycle path carried by a `Cycle` error.
	pub fn cycle_path(&self) -> Option<&CyclePath> {
		match self {
			DiError::Cycle { path, .. } => Some(path),
			_ => None,
		}
	}

	/// Attaches the failing signature to a closure error. Engine errors pass through.
	pub(crate) fn in_construction_of(self, signature: &Signature) -> Self {
		match self {
			DiError::Custom(source) => DiError::Construction {
				signature: signature.clone(),
				source,
			},
			other => other,
		}
	}
}

/// Result alias used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	struct Service;

	#[rstest]
	fn cycle_path_display_joins_with_arrows() {
		// Arrange
		let a = Signature::of::<u8>();
		let b = Signature::of::<u16>();

		// Act
		let path = CyclePath(vec![a.clone(), b, a]);

		// Assert
		assert_eq!(path.to_string(), "u8 -> u16 -> u8");
		assert_eq!(path.len(), 3);
	}

	#[rstest]
	fn unknown_qualifier_lists_alternatives() {
		// Arrange
		let reason = MissingReason::UnknownQualifier {
			available: vec![None, Some("replica".to_string())],
		};

		// Act
		let message = reason.to_string();

		// Assert
		assert!(message.contains("<unqualified>"));
		assert!(message.contains("replica"));
	}

	#[rstest]
	fn custom_errors_gain_signature_context() {
		// Arrange
		let error = DiError::custom("connection refused");

		// Act
		let wrapped = error.in_construction_of(&Signature::of::<Service>());

		// Assert
		match wrapped {
			DiError::Construction { signature, source } => {
				assert_eq!(signature, Signature::of::<Service>());
				assert_eq!(source.to_string(), "connection refused");
			}
			other => panic!("Expected Construction, got {:?}", other),
		}
	}

	#[rstest]
	fn engine_errors_pass_through_construction_context() {
		// Arrange
		let error = DiError::MaxDepthExceeded(3);

		// Act
		let wrapped = error.in_construction_of(&Signature::of::<Service>());

		// Assert
		assert!(matches!(wrapped, DiError::MaxDepthExceeded(3)));
	}
}
