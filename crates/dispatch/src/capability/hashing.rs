use strata_types::Instance;

use super::{CapabilityRegistry, Hashing, Resolution};

/// Hash contributed by a value that is already being hashed further up.
const CYCLE_HASH: u64 = 0;

/// A registered hash-code implementation.
pub trait HashOp: Send + Sync {
	/// Hashes `value`. Nested values should be hashed through `cx`.
	fn hash(&self, cx: &mut HashContext<'_>, value: &dyn Instance) -> u64;
}

impl<F> HashOp for F
where
	F: Fn(&mut HashContext<'_>, &dyn Instance) -> u64 + Send + Sync,
{
	fn hash(&self, cx: &mut HashContext<'_>, value: &dyn Instance) -> u64 {
		self(cx, value)
	}
}

/// State of one deep hash computation.
pub struct HashContext<'a> {
	registry: &'a CapabilityRegistry<Hashing>,
	max_depth: usize,
	in_progress: Vec<usize>,
}

impl<'a> HashContext<'a> {
	pub fn new(registry: &'a CapabilityRegistry<Hashing>, max_depth: usize) -> Self {
		Self {
			registry,
			max_depth,
			in_progress: Vec::new(),
		}
	}

	/// Hashes a value, dispatching on its runtime type.
	pub fn hash(&mut self, value: &dyn Instance) -> u64 {
		match self.registry.resolve(&value.runtime_type()) {
			Resolution::Implementation(op) => op.hash(self, value),
			Resolution::NoOverride => value.native_hash(),
		}
	}

	/// Runs `compute` one nesting level deeper; see
	/// [`EqualityContext::descend`](super::EqualityContext::descend).
	pub fn descend(&mut self, value: &dyn Instance, compute: impl FnOnce(&mut Self) -> u64) -> u64 {
		let addr = core::ptr::from_ref(value).cast::<()>() as usize;
		if self.in_progress.contains(&addr) {
			return CYCLE_HASH;
		}
		if self.in_progress.len() >= self.max_depth {
			tracing::debug!(depth = self.max_depth, "hash nesting limit reached; using native hash");
			return value.native_hash();
		}

		self.in_progress.push(addr);
		let hash = compute(self);
		self.in_progress.pop();
		hash
	}

	pub fn depth(&self) -> usize {
		self.in_progress.len()
	}
}

/// Element-wise hash for array values: `31 * h + hash(element)`, seeded with 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralArrayHash;

impl HashOp for StructuralArrayHash {
	fn hash(&self, cx: &mut HashContext<'_>, value: &dyn Instance) -> u64 {
		let Some(items) = value.elements() else {
			return value.native_hash();
		};
		cx.descend(value, |cx| {
			items
				.iter()
				.fold(1u64, |h, item| h.wrapping_mul(31).wrapping_add(cx.hash(&**item)))
		})
	}
}
