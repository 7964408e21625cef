//! Linearized type hierarchies.
//!
//! # Walk order
//!
//! `hierarchy_of(T)` yields `T`, then each declared interface of `T` walked depth-first left
//! to right, then the superclass of `T` walked the same way. Superclasses are not hoisted
//! ahead of interfaces and entries are not deduplicated: a diamond yields the shared ancestor
//! once per path. The order is a pure function of the declarations.
//!
//! # Retention
//!
//! Slots are keyed by [`TypeKey`] and anchored by a [`WeakType`]. The cached tail holds strong
//! handles to ancestors only; the head is the caller's handle, so a cached type can still be
//! dropped and its slot swept.

use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::retention::{self, Retained, SweepSchedule};
use crate::{RuntimeType, TypeKey, WeakType};

#[cfg(test)]
mod tests;

/// Linearized ancestor chain of one type. Always starts with the type itself.
#[derive(Debug, Clone)]
pub struct Hierarchy {
	head: RuntimeType,
	tail: Arc<[RuntimeType]>,
}

impl Hierarchy {
	/// The type the walk started from.
	pub fn head(&self) -> &RuntimeType {
		&self.head
	}

	/// Every entry after the head, in walk order.
	pub fn ancestors(&self) -> &[RuntimeType] {
		&self.tail
	}

	pub fn iter(&self) -> impl Iterator<Item = &RuntimeType> {
		core::iter::once(&self.head).chain(self.tail.iter())
	}

	/// Never zero.
	pub fn len(&self) -> usize {
		self.tail.len() + 1
	}

	pub fn is_empty(&self) -> bool {
		false
	}

	pub fn to_vec(&self) -> Vec<RuntimeType> {
		self.iter().cloned().collect()
	}
}

impl<'a> IntoIterator for &'a Hierarchy {
	type Item = &'a RuntimeType;
	type IntoIter = core::iter::Chain<core::iter::Once<&'a RuntimeType>, core::slice::Iter<'a, RuntimeType>>;

	fn into_iter(self) -> Self::IntoIter {
		core::iter::once(&self.head).chain(self.tail.iter())
	}
}

struct Slot {
	owner: WeakType,
	tail: Arc<[RuntimeType]>,
}

impl Retained for Slot {
	fn is_alive(&self) -> bool {
		self.owner.is_alive()
	}
}

static GLOBAL: LazyLock<Arc<TypeHierarchyCache>> = LazyLock::new(|| Arc::new(TypeHierarchyCache::new()));

/// Memoizes [`Hierarchy`] per type.
pub struct TypeHierarchyCache {
	slots: RwLock<FxHashMap<TypeKey, Slot>>,
	schedule: SweepSchedule,
}

impl TypeHierarchyCache {
	pub fn new() -> Self {
		Self::with_sweep_interval(retention::DEFAULT_SWEEP_INTERVAL)
	}

	pub fn with_sweep_interval(interval: usize) -> Self {
		Self {
			slots: RwLock::new(FxHashMap::default()),
			schedule: SweepSchedule::new(interval),
		}
	}

	/// Process-wide cache shared by the default dispatch instance.
	pub fn global() -> Arc<Self> {
		Arc::clone(&GLOBAL)
	}

	/// Returns the linearized hierarchy of `ty`, computing and caching it on first use.
	pub fn hierarchy_of(&self, ty: &RuntimeType) -> Hierarchy {
		if let Some(slot) = self.slots.read().get(&ty.key()) {
			return Hierarchy {
				head: ty.clone(),
				tail: Arc::clone(&slot.tail),
			};
		}

		let tail: Arc<[RuntimeType]> = linearize(ty).into();

		let mut slots = self.slots.write();
		let tail = Arc::clone(
			&slots
				.entry(ty.key())
				.or_insert_with(|| Slot {
					owner: ty.downgrade(),
					tail,
				})
				.tail,
		);
		if self.schedule.tick() {
			retention::sweep(&mut *slots);
		}

		Hierarchy { head: ty.clone(), tail }
	}

	/// Whether `ty` has a cached hierarchy.
	pub fn is_cached(&self, ty: &RuntimeType) -> bool {
		self.slots.read().contains_key(&ty.key())
	}

	/// Number of cached slots, including dead ones not yet swept.
	pub fn len(&self) -> usize {
		self.slots.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.read().is_empty()
	}

	/// Drops slots whose type is gone. Returns how many were removed.
	pub fn sweep(&self) -> usize {
		retention::sweep(&mut *self.slots.write())
	}

	pub fn clear(&self) {
		self.slots.write().clear();
	}
}

impl Default for TypeHierarchyCache {
	fn default() -> Self {
		Self::new()
	}
}

impl core::fmt::Debug for TypeHierarchyCache {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("TypeHierarchyCache")
			.field("slots", &self.len())
			.field("sweep_interval", &self.schedule.interval())
			.finish()
	}
}

/// Walk order without the head.
fn linearize(ty: &RuntimeType) -> Vec<RuntimeType> {
	fn walk(ty: &RuntimeType, out: &mut Vec<RuntimeType>) {
		for iface in ty.interfaces() {
			out.push(iface.clone());
			walk(iface, out);
		}
		if let Some(parent) = ty.superclass() {
			out.push(parent.clone());
			walk(parent, out);
		}
	}

	let mut out = Vec::new();
	walk(ty, &mut out);
	out
}
