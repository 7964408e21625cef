use std::sync::{Arc, Barrier};
use std::thread;

use proptest::prelude::*;
use strata_types::{RuntimeType, TypeHierarchyCache};

use super::{CapabilityRegistry, Equality, EqualsOp};
use crate::test_fixtures::{by_last_digit, by_value, class, interface, registry};

const THREADS: usize = 8;

/// Invariant: a registered implementation MUST be what its exact type resolves to.
pub(crate) fn inv_exact_match_idempotence(depth: usize) {
	let reg = registry::<Equality>();
	let mut ty = class("T0");
	let mut chain = vec![ty.clone()];
	for i in 1..=depth {
		ty = RuntimeType::class(format!("T{i}")).extends(&ty).build().unwrap();
		chain.push(ty.clone());
	}

	let ops: Vec<Arc<dyn EqualsOp>> = chain.iter().map(|_| by_value()).collect();
	// Resolve the leaf first so later registrations must displace compressed slots.
	reg.register(&chain[0], ops[0].clone()).unwrap();
	reg.resolve(chain.last().unwrap());

	for (ty, op) in chain.iter().zip(&ops) {
		reg.register(ty, op.clone()).unwrap();
		assert!(reg.resolve(ty).is(op), "{ty} did not resolve to its own registration");
	}
}

#[cfg_attr(test, test)]
pub(crate) fn test_exact_match_idempotence() {
	inv_exact_match_idempotence(4)
}

proptest! {
	#[test]
	fn prop_exact_match_idempotence(depth in 0usize..12) {
		inv_exact_match_idempotence(depth);
	}
}

/// Invariant: after `unregister(T)`, no type MAY resolve to T's implementation.
pub(crate) fn inv_removal_forgets_derived_slots() {
	let reg = registry::<Equality>();
	let top = interface("Top");
	let mid = RuntimeType::class("Mid").implements(&top).build().unwrap();
	let leaves: Vec<RuntimeType> = (0..4)
		.map(|i| RuntimeType::class(format!("Leaf{i}")).extends(&mid).build().unwrap())
		.collect();

	let fallback = by_last_digit();
	let removed = by_value();
	reg.register(&top, fallback.clone()).unwrap();
	reg.register(&mid, removed.clone()).unwrap();
	for leaf in &leaves {
		assert!(reg.resolve(leaf).is(&removed));
		assert!(reg.is_compressed(leaf));
	}

	assert!(reg.unregister(&mid));
	for leaf in &leaves {
		let resolved = reg.resolve(leaf);
		assert!(!resolved.is(&removed), "{leaf} still resolves to the removed implementation");
		assert!(resolved.is(&fallback));
	}
}

#[cfg_attr(test, test)]
pub(crate) fn test_removal_forgets_derived_slots() {
	inv_removal_forgets_derived_slots()
}

/// Invariant: concurrent resolvers of an unseen type MUST agree and leave one compressed slot.
pub(crate) fn inv_concurrent_resolution() {
	let reg = Arc::new(CapabilityRegistry::<Equality>::new(Arc::new(TypeHierarchyCache::new())));
	let shape = interface("Shape");
	let op = by_value();
	reg.register(&shape, op.clone()).unwrap();

	let types: Vec<RuntimeType> = (0..16)
		.map(|i| RuntimeType::class(format!("Fresh{i}")).implements(&shape).build().unwrap())
		.collect();

	let barrier = Arc::new(Barrier::new(THREADS));
	let handles: Vec<_> = (0..THREADS)
		.map(|_| {
			let reg = Arc::clone(&reg);
			let barrier = Arc::clone(&barrier);
			let types = types.clone();
			thread::spawn(move || {
				barrier.wait();
				types.iter().map(|ty| reg.resolve(ty).into_implementation()).collect::<Vec<_>>()
			})
		})
		.collect();

	for handle in handles {
		let results = handle.join().expect("resolver thread panicked");
		for found in results {
			let found = found.expect("every fresh type inherits the Shape implementation");
			assert!(Arc::ptr_eq(&found, &op));
		}
	}

	// One slot for Shape plus exactly one compressed slot per fresh type.
	assert_eq!(reg.len(), 1 + types.len());
	for ty in &types {
		assert!(reg.is_compressed(ty));
		assert!(reg.resolve(ty).is(&op));
	}
}

#[cfg_attr(test, test)]
pub(crate) fn test_concurrent_resolution() {
	inv_concurrent_resolution()
}

/// Invariant: registrations racing with resolutions MUST NOT be shadowed by stale caches.
pub(crate) fn inv_registration_during_resolution() {
	let reg = Arc::new(registry::<Equality>());
	let parent = class("Parent");
	let children: Vec<RuntimeType> = (0..32)
		.map(|i| RuntimeType::class(format!("Child{i}")).extends(&parent).build().unwrap())
		.collect();
	let op = by_value();

	let barrier = Arc::new(Barrier::new(2));
	let resolver = {
		let reg = Arc::clone(&reg);
		let barrier = Arc::clone(&barrier);
		let children = children.clone();
		thread::spawn(move || {
			barrier.wait();
			for _ in 0..50 {
				for child in &children {
					reg.resolve(child);
				}
			}
		})
	};

	barrier.wait();
	reg.register(&parent, op.clone()).unwrap();
	resolver.join().expect("resolver thread panicked");

	for child in &children {
		assert!(reg.resolve(child).is(&op), "{child} kept a stale decision");
	}
}

#[cfg_attr(test, test)]
pub(crate) fn test_registration_during_resolution() {
	inv_registration_during_resolution()
}
