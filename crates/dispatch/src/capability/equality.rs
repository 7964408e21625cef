use strata_types::Instance;

use super::{CapabilityRegistry, Equality, Resolution};

/// A registered equality implementation.
pub trait EqualsOp: Send + Sync {
	/// Compares `a` (whose type selected this implementation) with `b`.
	///
	/// Nested values should be compared through `cx` so they dispatch on their own types.
	fn equals(&self, cx: &mut EqualityContext<'_>, a: &dyn Instance, b: &dyn Instance) -> bool;
}

impl<F> EqualsOp for F
where
	F: Fn(&mut EqualityContext<'_>, &dyn Instance, &dyn Instance) -> bool + Send + Sync,
{
	fn equals(&self, cx: &mut EqualityContext<'_>, a: &dyn Instance, b: &dyn Instance) -> bool {
		self(cx, a, b)
	}
}

/// State of one deep comparison.
pub struct EqualityContext<'a> {
	registry: &'a CapabilityRegistry<Equality>,
	max_depth: usize,
	/// Address pairs currently being compared, innermost last.
	in_progress: Vec<(usize, usize)>,
}

impl<'a> EqualityContext<'a> {
	pub fn new(registry: &'a CapabilityRegistry<Equality>, max_depth: usize) -> Self {
		Self {
			registry,
			max_depth,
			in_progress: Vec::new(),
		}
	}

	/// Compares two values, dispatching on the runtime type of `a`.
	pub fn equals(&mut self, a: &dyn Instance, b: &dyn Instance) -> bool {
		if core::ptr::addr_eq(a, b) {
			return true;
		}
		match self.registry.resolve(&a.runtime_type()) {
			Resolution::Implementation(op) => op.equals(self, a, b),
			Resolution::NoOverride => a.native_eq(b),
		}
	}

	/// Runs `compare` one nesting level deeper.
	///
	/// A pair already being compared further up is treated as equal, which terminates
	/// self-referential structures. Beyond `max_depth` the pair falls back to native equality.
	pub fn descend(&mut self, a: &dyn Instance, b: &dyn Instance, compare: impl FnOnce(&mut Self) -> bool) -> bool {
		let pair = (address(a), address(b));
		if self.in_progress.contains(&pair) {
			return true;
		}
		if self.in_progress.len() >= self.max_depth {
			tracing::debug!(depth = self.max_depth, "equality nesting limit reached; using native equality");
			return a.native_eq(b);
		}

		self.in_progress.push(pair);
		let equal = compare(self);
		self.in_progress.pop();
		equal
	}

	pub fn depth(&self) -> usize {
		self.in_progress.len()
	}
}

fn address(value: &dyn Instance) -> usize {
	core::ptr::from_ref(value).cast::<()>() as usize
}

/// Element-wise equality for array values.
///
/// Two arrays are equal when they have the same length and every pair of elements is equal
/// under the elements' own registrations.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralArrayEquals;

impl EqualsOp for StructuralArrayEquals {
	fn equals(&self, cx: &mut EqualityContext<'_>, a: &dyn Instance, b: &dyn Instance) -> bool {
		let (Some(xs), Some(ys)) = (a.elements(), b.elements()) else {
			return false;
		};
		if xs.len() != ys.len() {
			return false;
		}
		cx.descend(a, b, |cx| xs.iter().zip(&ys).all(|(x, y)| cx.equals(&**x, &**y)))
	}
}
