use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use strata_types::retention::{self, Retained, SweepSchedule};
use strata_types::{Hierarchy, RuntimeType, TypeHierarchyCache, TypeKey, WeakType};
use tracing::{debug, warn};

use super::{ConversionCandidate, Converter};
use crate::error::{InvalidArgument, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey {
	from: TypeKey,
	to: TypeKey,
}

impl PairKey {
	fn new(from: &RuntimeType, to: &RuntimeType) -> Self {
		Self {
			from: from.key(),
			to: to.key(),
		}
	}
}

struct Slot {
	from: WeakType,
	to: WeakType,
	/// Destination the converter was registered with. Same as `to` for explicit slots, a
	/// subtype of `to` for up-cast slots.
	target: WeakType,
	/// Registration order of the converter; up-cast entries are rebuilt in this order.
	seq: u64,
	converter: Arc<dyn Converter>,
}

impl Retained for Slot {
	fn is_alive(&self) -> bool {
		self.from.is_alive() && self.to.is_alive() && self.target.is_alive()
	}
}

#[derive(Default)]
struct State {
	explicit: FxHashMap<PairKey, Slot>,
	upcast: FxHashMap<PairKey, Slot>,
	next_seq: u64,
}

impl State {
	/// Records `from -> ancestor` up-cast entries for every ancestor of the converter's target.
	fn record_upcasts(
		&mut self,
		from: &RuntimeType,
		target: &RuntimeType,
		destinations: &Hierarchy,
		seq: u64,
		converter: &Arc<dyn Converter>,
	) -> usize {
		let mut added = 0;
		for ancestor in destinations.ancestors() {
			if ancestor == from {
				continue;
			}
			let key = PairKey::new(from, ancestor);
			if self.explicit.contains_key(&key) || self.upcast.contains_key(&key) {
				continue;
			}
			self.upcast.insert(
				key,
				Slot {
					from: from.downgrade(),
					to: ancestor.downgrade(),
					target: target.downgrade(),
					seq,
					converter: Arc::clone(converter),
				},
			);
			added += 1;
		}
		added
	}

	/// A converter from exactly `from` to exactly `to`, explicit or up-cast.
	fn direct(&self, from: &RuntimeType, to: &RuntimeType) -> Option<&Slot> {
		let key = PairKey::new(from, to);
		self.explicit
			.get(&key)
			.or_else(|| self.upcast.get(&key).filter(|slot| slot.is_alive()))
	}
}

/// Registry of converters keyed by (source, destination).
pub struct ConversionRegistry {
	hierarchy: Arc<TypeHierarchyCache>,
	state: RwLock<State>,
	diagnostics: bool,
	schedule: SweepSchedule,
}

impl ConversionRegistry {
	pub fn new(hierarchy: Arc<TypeHierarchyCache>) -> Self {
		Self::with_options(hierarchy, false, retention::DEFAULT_SWEEP_INTERVAL)
	}

	/// `diagnostics` enables ambiguity warnings during [`Self::resolve`].
	pub fn with_options(hierarchy: Arc<TypeHierarchyCache>, diagnostics: bool, sweep_interval: usize) -> Self {
		Self {
			hierarchy,
			state: RwLock::new(State::default()),
			diagnostics,
			schedule: SweepSchedule::new(sweep_interval),
		}
	}

	/// Registers `converter` for `from -> to`, and as an up-cast candidate for every ancestor
	/// of `to`.
	///
	/// Fails if `from == to` or if a converter is already registered for the exact pair.
	pub fn register(&self, from: &RuntimeType, to: &RuntimeType, converter: Arc<dyn Converter>) -> Result<()> {
		if from == to {
			return Err(InvalidArgument::SameSourceAndDestination { ty: from.clone() }.into());
		}

		let destinations = self.hierarchy.hierarchy_of(to);
		let key = PairKey::new(from, to);

		let mut state = self.state.write();
		if state.explicit.contains_key(&key) {
			return Err(InvalidArgument::DuplicateConversion {
				from: from.clone(),
				to: to.clone(),
			}
			.into());
		}

		let seq = state.next_seq;
		state.next_seq += 1;
		state.explicit.insert(
			key,
			Slot {
				from: from.downgrade(),
				to: to.downgrade(),
				target: to.downgrade(),
				seq,
				converter: Arc::clone(&converter),
			},
		);
		let upcasts = state.record_upcasts(from, to, &destinations, seq, &converter);
		debug!(from = %from, to = %to, upcasts, "registered converter");

		if self.schedule.tick() {
			retention::sweep(&mut state.explicit);
			retention::sweep(&mut state.upcast);
		}
		Ok(())
	}

	/// Removes the explicit converter for exactly `from -> to` and the up-cast entries it
	/// produced. Returns whether one existed.
	pub fn unregister(&self, from: &RuntimeType, to: &RuntimeType) -> bool {
		let mut state = self.state.write();
		if state.explicit.remove(&PairKey::new(from, to)).is_none() {
			return false;
		}

		// Entries the removed converter shadowed must become visible again, so rebuild every
		// up-cast entry of this source in registration order.
		let source = from.key();
		state.upcast.retain(|key, _| key.from != source);
		let mut remaining: Vec<(u64, RuntimeType, Arc<dyn Converter>)> = state
			.explicit
			.iter()
			.filter(|(key, _)| key.from == source)
			.filter_map(|(_, slot)| Some((slot.seq, slot.to.upgrade()?, Arc::clone(&slot.converter))))
			.collect();
		remaining.sort_by_key(|(seq, ..)| *seq);

		for (seq, target, converter) in remaining {
			let destinations = self.hierarchy.hierarchy_of(&target);
			state.record_upcasts(from, &target, &destinations, seq, &converter);
		}

		debug!(from = %from, to = %to, "unregistered converter");
		true
	}

	/// Finds a converter for `from -> to`, or `None` when nothing applies. Never fails.
	///
	/// The last resort is a converter from `from` to an ancestor of `to`, so the produced value
	/// may be a supertype of the requested destination.
	pub fn resolve(&self, from: &RuntimeType, to: &RuntimeType) -> Option<Arc<dyn Converter>> {
		let sources = self.hierarchy.hierarchy_of(from);
		let destinations = self.hierarchy.hierarchy_of(to);
		let state = self.state.read();

		let found = sources
			.iter()
			.find_map(|s| state.explicit.get(&PairKey::new(s, to)))
			.or_else(|| {
				sources
					.iter()
					.find_map(|s| state.upcast.get(&PairKey::new(s, to)).filter(|slot| slot.is_alive()))
			})
			.or_else(|| destinations.ancestors().iter().find_map(|a| state.direct(from, a)))
			.map(|slot| Arc::clone(&slot.converter));

		if self.diagnostics {
			let candidates = collect_candidates(&state, &sources, &destinations);
			if candidates.len() > 1 {
				let listed: Vec<String> = candidates.iter().map(ToString::to_string).collect();
				warn!(
					from = %from,
					to = %to,
					candidates = %listed.join(", "),
					"ambiguous conversion; using the first candidate"
				);
			}
		}

		found
	}

	/// Every distinct way of satisfying `from -> to`, in resolution order.
	pub fn candidates(&self, from: &RuntimeType, to: &RuntimeType) -> Vec<ConversionCandidate> {
		let sources = self.hierarchy.hierarchy_of(from);
		let destinations = self.hierarchy.hierarchy_of(to);
		collect_candidates(&self.state.read(), &sources, &destinations)
	}

	/// Whether an explicit converter exists for exactly `from -> to`.
	pub fn contains(&self, from: &RuntimeType, to: &RuntimeType) -> bool {
		self.state.read().explicit.contains_key(&PairKey::new(from, to))
	}

	/// Whether `from -> to` is served by an up-cast entry.
	pub fn has_upcast(&self, from: &RuntimeType, to: &RuntimeType) -> bool {
		self.state.read().upcast.contains_key(&PairKey::new(from, to))
	}

	/// Number of explicit registrations.
	pub fn len(&self) -> usize {
		self.state.read().explicit.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.read().explicit.is_empty()
	}

	pub fn diagnostics(&self) -> bool {
		self.diagnostics
	}

	/// Drops entries involving a type that is gone. Returns how many were removed.
	pub fn sweep(&self) -> usize {
		let mut state = self.state.write();
		retention::sweep(&mut state.explicit) + retention::sweep(&mut state.upcast)
	}
}

fn collect_candidates(state: &State, sources: &Hierarchy, destinations: &Hierarchy) -> Vec<ConversionCandidate> {
	let to = destinations.head();
	let exact = sources.iter().filter_map(|s| {
		state.explicit.get(&PairKey::new(s, to)).map(|slot| ConversionCandidate {
			from: s.clone(),
			to: to.clone(),
			upcast: false,
			converter: Arc::clone(&slot.converter),
		})
	});
	let widened = sources.iter().filter_map(|s| {
		let slot = state.upcast.get(&PairKey::new(s, to))?;
		Some(ConversionCandidate {
			from: s.clone(),
			to: slot.target.upgrade()?,
			upcast: true,
			converter: Arc::clone(&slot.converter),
		})
	});

	let from = sources.head();
	let toward_ancestors = destinations.ancestors().iter().filter_map(|a| {
		let slot = state.direct(from, a)?;
		Some(ConversionCandidate {
			from: from.clone(),
			to: slot.target.upgrade()?,
			upcast: true,
			converter: Arc::clone(&slot.converter),
		})
	});

	let mut out: Vec<ConversionCandidate> = Vec::new();
	for candidate in exact.chain(widened).chain(toward_ancestors) {
		if !out.iter().any(|c| c.from == candidate.from && c.to == candidate.to) {
			out.push(candidate);
		}
	}
	out
}

impl fmt::Debug for ConversionRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.read();
		f.debug_struct("ConversionRegistry")
			.field("explicit", &state.explicit.len())
			.field("upcast", &state.upcast.len())
			.field("diagnostics", &self.diagnostics)
			.finish()
	}
}
