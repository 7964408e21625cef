//! Weak-key retention for derived caches.
//!
//! Cache slots hold a [`WeakType`](crate::WeakType) anchor instead of a strong handle, so a
//! cache is never the reason a declaration stays alive. Dead slots are dropped by a sweep that
//! runs every `interval` writes, or on demand.

use core::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;

/// Default number of cache writes between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: usize = 1024;

/// A cache value that can tell whether its key's declaration is still alive.
pub trait Retained {
	fn is_alive(&self) -> bool;
}

impl Retained for crate::WeakType {
	fn is_alive(&self) -> bool {
		crate::WeakType::is_alive(self)
	}
}

/// Counts writes and signals when a sweep is due.
#[derive(Debug)]
pub struct SweepSchedule {
	interval: usize,
	writes: AtomicUsize,
}

impl SweepSchedule {
	/// Creates a schedule firing every `interval` writes; `0` disables scheduled sweeps.
	pub const fn new(interval: usize) -> Self {
		Self {
			interval,
			writes: AtomicUsize::new(0),
		}
	}

	pub fn interval(&self) -> usize {
		self.interval
	}

	/// Records one write. Returns `true` when this write completes an interval.
	pub fn tick(&self) -> bool {
		if self.interval == 0 {
			return false;
		}
		let n = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
		n % self.interval == 0
	}
}

impl Default for SweepSchedule {
	fn default() -> Self {
		Self::new(DEFAULT_SWEEP_INTERVAL)
	}
}

/// Drops every slot whose declaration is gone. Returns how many were removed.
pub fn sweep<K, V>(map: &mut FxHashMap<K, V>) -> usize
where
	K: Eq + Hash,
	V: Retained,
{
	let before = map.len();
	map.retain(|_, slot| slot.is_alive());
	let removed = before - map.len();
	if removed > 0 {
		tracing::trace!(removed, remaining = map.len(), "swept dead cache slots");
	}
	removed
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Flag(bool);

	impl Retained for Flag {
		fn is_alive(&self) -> bool {
			self.0
		}
	}

	#[test]
	fn schedule_fires_every_interval() {
		let schedule = SweepSchedule::new(3);
		let fired: Vec<bool> = (0..6).map(|_| schedule.tick()).collect();
		assert_eq!(fired, [false, false, true, false, false, true]);
	}

	#[test]
	fn zero_interval_never_fires() {
		let schedule = SweepSchedule::new(0);
		assert!((0..10).all(|_| !schedule.tick()));
	}

	#[test]
	fn sweep_drops_dead_slots() {
		let mut map = FxHashMap::default();
		map.insert(1, Flag(true));
		map.insert(2, Flag(false));
		map.insert(3, Flag(false));
		assert_eq!(sweep(&mut map), 2);
		assert!(map.contains_key(&1));
		assert_eq!(map.len(), 1);
	}
}
