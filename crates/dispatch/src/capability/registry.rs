//! Type-keyed registry for one unary capability.
//!
//! # Concurrency
//!
//! - **Reads:** `resolve` probes under the read lock. The hierarchy walk re-acquires it after
//!   fetching the hierarchy so this lock is never held across the hierarchy cache's lock.
//! - **Derived writes:** compression and bypass decisions take the write lock afterwards
//!   (two-phase, never upgraded), insert only if absent, and are skipped if a registration or
//!   removal bumped the generation in between.
//! - **Explicit writes:** `register`/`unregister` hold the write lock for their whole duration.

use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use strata_types::retention::{self, Retained, SweepSchedule};
use strata_types::{RuntimeType, TypeHierarchyCache, TypeKey, WeakType};
use tracing::{debug, trace, warn};

use super::{Capability, RegisterOutcome, Resolution};
use crate::error::{InvalidArgument, Result};

enum Origin {
	/// Registered through the API or a plugin.
	Explicit,
	/// Copied from the registration of `from`, an ancestor of the slot's type.
	Compressed { from: RuntimeType },
}

struct Slot<Op: ?Sized> {
	owner: WeakType,
	origin: Origin,
	implementation: Arc<Op>,
}

impl<Op: ?Sized> Slot<Op> {
	fn is_explicit(&self) -> bool {
		matches!(self.origin, Origin::Explicit)
	}

	fn derived_from(&self, key: TypeKey) -> bool {
		matches!(&self.origin, Origin::Compressed { from } if from.key() == key)
	}
}

impl<Op: ?Sized> Retained for Slot<Op> {
	fn is_alive(&self) -> bool {
		self.owner.is_alive()
	}
}

/// A type resolved to "use your own behavior".
struct Bypass {
	owner: WeakType,
	/// The interface whose match the type's native declaration overrode. `None` when nothing
	/// matched at all.
	overrides: Option<TypeKey>,
}

impl Retained for Bypass {
	fn is_alive(&self) -> bool {
		self.owner.is_alive()
	}
}

struct State<Op: ?Sized> {
	slots: FxHashMap<TypeKey, Slot<Op>>,
	bypass: FxHashMap<TypeKey, Bypass>,
	/// Bumped by every explicit mutation; derived writes computed under an older generation
	/// are dropped.
	generation: u64,
}

impl<Op: ?Sized> State<Op> {
	fn purge_derived(&mut self) {
		self.slots.retain(|_, slot| slot.is_explicit());
		self.bypass.clear();
		self.generation += 1;
	}
}

/// What the read phase decided to cache.
enum Decision<Op: ?Sized> {
	None,
	Bypass { overrides: Option<TypeKey> },
	Compress { from: RuntimeType, implementation: Arc<Op> },
}

/// Registry of implementations of capability `C`, keyed by runtime type.
pub struct CapabilityRegistry<C: Capability> {
	hierarchy: Arc<TypeHierarchyCache>,
	state: RwLock<State<C::Op>>,
	array: Arc<C::Op>,
	schedule: SweepSchedule,
	_capability: PhantomData<fn() -> C>,
}

impl<C: Capability> CapabilityRegistry<C> {
	pub fn new(hierarchy: Arc<TypeHierarchyCache>) -> Self {
		Self::with_sweep_interval(hierarchy, retention::DEFAULT_SWEEP_INTERVAL)
	}

	pub fn with_sweep_interval(hierarchy: Arc<TypeHierarchyCache>, interval: usize) -> Self {
		Self {
			hierarchy,
			state: RwLock::new(State {
				slots: FxHashMap::default(),
				bypass: FxHashMap::default(),
				generation: 0,
			}),
			array: C::structural_array(),
			schedule: SweepSchedule::new(interval),
			_capability: PhantomData,
		}
	}

	/// Registers `implementation` for exactly `ty`.
	///
	/// Fails for the root type. An existing explicit registration is kept (with a warning);
	/// registries are append-only unless [`Self::unregister`] is called first.
	pub fn register(&self, ty: &RuntimeType, implementation: Arc<C::Op>) -> Result<RegisterOutcome> {
		if ty.is_root() {
			return Err(InvalidArgument::RootType.into());
		}

		let mut state = self.state.write();
		if state.slots.get(&ty.key()).is_some_and(Slot::is_explicit) {
			warn!(capability = C::NAME, ty = %ty, "implementation already registered; keeping existing");
			return Ok(RegisterOutcome::KeptExisting);
		}

		state.slots.insert(
			ty.key(),
			Slot {
				owner: ty.downgrade(),
				origin: Origin::Explicit,
				implementation,
			},
		);
		// Cached walks may now have a nearer match.
		state.purge_derived();
		debug!(capability = C::NAME, ty = %ty, "registered implementation");
		self.after_write(&mut state);
		Ok(RegisterOutcome::Inserted)
	}

	/// Removes the explicit registration for exactly `ty`. Returns whether one existed.
	///
	/// Compressed slots copied from it are dropped too, as are bypass decisions that overrode
	/// it. Other bypass decisions stay: removal cannot create a match where there was none.
	pub fn unregister(&self, ty: &RuntimeType) -> bool {
		let key = ty.key();
		let mut state = self.state.write();
		if !state.slots.get(&key).is_some_and(Slot::is_explicit) {
			return false;
		}

		state.slots.remove(&key);
		state.slots.retain(|_, slot| !slot.derived_from(key));
		state.bypass.retain(|_, bypass| bypass.overrides != Some(key));
		state.generation += 1;
		debug!(capability = C::NAME, ty = %ty, "unregistered implementation");
		true
	}

	/// Finds the implementation that applies to `ty`. Never fails.
	pub fn resolve(&self, ty: &RuntimeType) -> Resolution<C::Op> {
		let key = ty.key();

		{
			let state = self.state.read();
			if state.bypass.contains_key(&key) {
				return Resolution::NoOverride;
			}
			if let Some(slot) = state.slots.get(&key) {
				let matched = match &slot.origin {
					Origin::Explicit => ty,
					Origin::Compressed { from } => from,
				};
				if !self.native_wins(ty, matched) {
					return Resolution::Implementation(Arc::clone(&slot.implementation));
				}
			}
		}

		let hierarchy = self.hierarchy.hierarchy_of(ty);

		let (resolution, decision, generation) = {
			let state = self.state.read();
			let found = state.slots.get(&key).map(|slot| (ty, slot)).or_else(|| {
				hierarchy
					.ancestors()
					.iter()
					.find_map(|ancestor| state.slots.get(&ancestor.key()).map(|slot| (ancestor, slot)))
			});

			let (resolution, decision) = match found {
				Some((holder, slot)) => {
					let matched = match &slot.origin {
						Origin::Explicit => holder,
						Origin::Compressed { from } => from,
					};
					if self.native_wins(ty, matched) {
						trace!(capability = C::NAME, ty = %ty, matched = %matched, "type declares its own implementation");
						(
							Resolution::NoOverride,
							Decision::Bypass {
								overrides: Some(matched.key()),
							},
						)
					} else if holder == ty {
						(Resolution::Implementation(Arc::clone(&slot.implementation)), Decision::None)
					} else {
						(
							Resolution::Implementation(Arc::clone(&slot.implementation)),
							Decision::Compress {
								from: matched.clone(),
								implementation: Arc::clone(&slot.implementation),
							},
						)
					}
				}
				None if ty.is_array() => (Resolution::Implementation(Arc::clone(&self.array)), Decision::None),
				None => (Resolution::NoOverride, Decision::Bypass { overrides: None }),
			};
			(resolution, decision, state.generation)
		};

		if !matches!(decision, Decision::None) {
			self.record(ty, decision, generation);
		}
		resolution
	}

	/// Whether a slot (explicit or compressed) exists for exactly `ty`.
	pub fn contains(&self, ty: &RuntimeType) -> bool {
		self.state.read().slots.contains_key(&ty.key())
	}

	pub fn is_explicit(&self, ty: &RuntimeType) -> bool {
		self.state.read().slots.get(&ty.key()).is_some_and(Slot::is_explicit)
	}

	/// Whether `ty` holds a slot copied from an ancestor by a previous resolution.
	pub fn is_compressed(&self, ty: &RuntimeType) -> bool {
		self.state.read().slots.get(&ty.key()).is_some_and(|slot| !slot.is_explicit())
	}

	pub fn is_bypassed(&self, ty: &RuntimeType) -> bool {
		self.state.read().bypass.contains_key(&ty.key())
	}

	/// Number of slots, explicit and compressed.
	pub fn len(&self) -> usize {
		self.state.read().slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.read().slots.is_empty()
	}

	/// Drops compressed slots and bypass decisions. Only affects performance.
	pub fn clear_derived(&self) {
		self.state.write().purge_derived();
	}

	/// Drops slots and decisions whose type is gone. Returns how many were removed.
	pub fn sweep(&self) -> usize {
		let mut state = self.state.write();
		retention::sweep(&mut state.slots) + retention::sweep(&mut state.bypass)
	}

	/// The type's own declaration beats a match inherited from an interface, never its own
	/// registration.
	fn native_wins(&self, ty: &RuntimeType, matched: &RuntimeType) -> bool {
		matched != ty && matched.is_interface() && ty.declares(C::NATIVE)
	}

	fn record(&self, ty: &RuntimeType, decision: Decision<C::Op>, generation: u64) {
		let mut state = self.state.write();
		if state.generation != generation {
			trace!(capability = C::NAME, ty = %ty, "registry changed during resolution; not caching");
			return;
		}

		match decision {
			Decision::None => return,
			Decision::Bypass { overrides } => {
				state.bypass.entry(ty.key()).or_insert_with(|| Bypass {
					owner: ty.downgrade(),
					overrides,
				});
			}
			Decision::Compress { from, implementation } => {
				trace!(capability = C::NAME, ty = %ty, from = %from, "compressed inherited implementation");
				state.slots.entry(ty.key()).or_insert_with(|| Slot {
					owner: ty.downgrade(),
					origin: Origin::Compressed { from },
					implementation,
				});
			}
		}
		self.after_write(&mut state);
	}

	fn after_write(&self, state: &mut State<C::Op>) {
		if self.schedule.tick() {
			retention::sweep(&mut state.slots);
			retention::sweep(&mut state.bypass);
		}
	}
}

impl<C: Capability> fmt::Debug for CapabilityRegistry<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.read();
		f.debug_struct("CapabilityRegistry")
			.field("capability", &C::NAME)
			.field("slots", &state.slots.len())
			.field("bypass", &state.bypass.len())
			.field("generation", &state.generation)
			.finish()
	}
}
