use core::fmt;
use core::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a declared type.
///
/// Keys are allocated once per [`TypeDescriptor`](crate::TypeDescriptor) and never reused,
/// so a cache entry keyed by a dead type can never alias a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(NonZeroU64);

impl TypeKey {
	pub(crate) fn next() -> Self {
		let raw = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
		Self(NonZeroU64::new(raw).expect("type key counter wrapped"))
	}

	/// Returns the raw key value.
	pub const fn get(self) -> u64 {
		self.0.get()
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_are_unique_and_increasing() {
		let a = TypeKey::next();
		let b = TypeKey::next();
		assert!(a.get() >= 1);
		assert!(b > a);
		assert_eq!(a.to_string(), format!("#{}", a.get()));
	}
}
