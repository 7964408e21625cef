//! Unary capability dispatch (equality, hashing).
//!
//! # Mental Model
//!
//! A [`CapabilityRegistry`] maps a runtime type to the implementation of one capability.
//! Resolution of a type `T`:
//!
//! 1. A cached bypass decision for `T` answers [`Resolution::NoOverride`] immediately.
//! 2. A slot for exactly `T` matches.
//! 3. Otherwise the first ancestor of `T` (walk order of
//!    [`TypeHierarchyCache`](strata_types::TypeHierarchyCache)) with a slot matches.
//! 4. If the match came from an interface and `T` declares the capability itself
//!    ([`Capability::NATIVE`]), `T` is marked bypass and gets `NoOverride`.
//! 5. An inherited match is copied into a compressed slot for `T`.
//! 6. No match: arrays get the structural implementation, everything else is marked bypass.
//!
//! # Invariants
//!
//! - Must return a registered implementation for its exact type.
//!   - Enforced in: [`CapabilityRegistry::resolve`] (exact probe before the walk).
//!   - Tested by: `invariants::test_exact_match_idempotence`
//!   - Failure symptom: an ancestor's implementation shadows a direct registration.
//!
//! - Must never return an unregistered implementation.
//!   - Enforced in: [`CapabilityRegistry::unregister`] (drops compressed slots derived from
//!     the removed type, and bypass decisions that overrode it).
//!   - Tested by: `invariants::test_removal_forgets_derived_slots`,
//!     `tests::unregistering_overridden_interface_exposes_class_match`
//!   - Failure symptom: subtypes keep dispatching to a removed implementation.
//!
//! - Must give every concurrent resolver of an unseen type the same answer.
//!   - Enforced in: [`CapabilityRegistry::resolve`] (two-phase locking, insert-if-absent,
//!     generation check).
//!   - Tested by: `invariants::test_concurrent_resolution`
//!   - Failure symptom: racing threads observe different implementations or a torn map.

mod equality;
mod hashing;
mod registry;

#[cfg(test)]
mod invariants;

use core::fmt;
use std::sync::Arc;

pub use equality::{EqualityContext, EqualsOp, StructuralArrayEquals};
pub use hashing::{HashContext, HashOp, StructuralArrayHash};
pub use registry::CapabilityRegistry;
use strata_types::NativeOps;

/// A capability dispatched per runtime type.
pub trait Capability: Send + Sync + 'static {
	/// Implementation handle stored in the registry.
	type Op: ?Sized + Send + Sync + 'static;

	/// Label used in logs.
	const NAME: &'static str;

	/// The [`NativeOps`] flag by which a type declares this capability itself.
	const NATIVE: NativeOps;

	/// Element-wise implementation used for array types without a registration.
	fn structural_array() -> Arc<Self::Op>;
}

/// Structural equality.
#[derive(Debug, Clone, Copy)]
pub struct Equality;

impl Capability for Equality {
	type Op = dyn EqualsOp;

	const NAME: &'static str = "equality";
	const NATIVE: NativeOps = NativeOps::EQUALS;

	fn structural_array() -> Arc<dyn EqualsOp> {
		Arc::new(StructuralArrayEquals)
	}
}

/// Hash-code computation.
#[derive(Debug, Clone, Copy)]
pub struct Hashing;

impl Capability for Hashing {
	type Op = dyn HashOp;

	const NAME: &'static str = "hashing";
	const NATIVE: NativeOps = NativeOps::HASH;

	fn structural_array() -> Arc<dyn HashOp> {
		Arc::new(StructuralArrayHash)
	}
}

/// Outcome of resolving a capability for a type.
pub enum Resolution<T: ?Sized> {
	/// Dispatch to this implementation.
	Implementation(Arc<T>),
	/// Use the type's own behavior.
	NoOverride,
}

impl<T: ?Sized> Resolution<T> {
	pub fn implementation(&self) -> Option<&Arc<T>> {
		match self {
			Self::Implementation(op) => Some(op),
			Self::NoOverride => None,
		}
	}

	pub fn into_implementation(self) -> Option<Arc<T>> {
		match self {
			Self::Implementation(op) => Some(op),
			Self::NoOverride => None,
		}
	}

	pub fn is_no_override(&self) -> bool {
		matches!(self, Self::NoOverride)
	}

	/// Whether this resolved to exactly `op` (same allocation).
	pub fn is(&self, op: &Arc<T>) -> bool {
		self.implementation().is_some_and(|found| Arc::ptr_eq(found, op))
	}
}

impl<T: ?Sized> Clone for Resolution<T> {
	fn clone(&self) -> Self {
		match self {
			Self::Implementation(op) => Self::Implementation(Arc::clone(op)),
			Self::NoOverride => Self::NoOverride,
		}
	}
}

impl<T: ?Sized> fmt::Debug for Resolution<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Implementation(op) => write!(f, "Implementation({:p})", Arc::as_ptr(op).cast::<()>()),
			Self::NoOverride => f.write_str("NoOverride"),
		}
	}
}

/// Result of a successful `register` call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterOutcome {
	/// The implementation is now registered for the type.
	Inserted,
	/// An explicit registration already existed; it was kept.
	KeptExisting,
}
