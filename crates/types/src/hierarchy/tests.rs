use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn names(h: &Hierarchy) -> Vec<String> {
	h.iter().map(|t| t.name().to_owned()).collect()
}

#[test]
fn interfaces_come_before_superclass() {
	let a = RuntimeType::interface("A").build().unwrap();
	let b = RuntimeType::interface("B").implements(&a).build().unwrap();
	let c = RuntimeType::interface("C").build().unwrap();
	let base = RuntimeType::class("Base").implements(&c).build().unwrap();
	let leaf = RuntimeType::class("Leaf").extends(&base).implements(&b).implements(&c).build().unwrap();

	let cache = TypeHierarchyCache::new();
	let h = cache.hierarchy_of(&leaf);

	assert_eq!(names(&h), ["Leaf", "B", "A", "C", "Base", "C", "Object"]);
	assert_eq!(h.head(), &leaf);
	assert_eq!(h.len(), 7);
}

#[test]
fn diamond_is_not_deduplicated() {
	let root = RuntimeType::interface("Root").build().unwrap();
	let left = RuntimeType::interface("Left").implements(&root).build().unwrap();
	let right = RuntimeType::interface("Right").implements(&root).build().unwrap();
	let both = RuntimeType::interface("Both").implements(&left).implements(&right).build().unwrap();

	let h = TypeHierarchyCache::new().hierarchy_of(&both);
	assert_eq!(names(&h), ["Both", "Left", "Root", "Right", "Root"]);
}

#[test]
fn root_hierarchy_is_itself() {
	let h = TypeHierarchyCache::new().hierarchy_of(&RuntimeType::object());
	assert_eq!(h.len(), 1);
	assert!(h.ancestors().is_empty());
}

#[test]
fn array_hierarchy_ends_at_root() {
	let elem = RuntimeType::class("E").build().unwrap();
	let array = RuntimeType::array_of(&elem);
	let h = TypeHierarchyCache::new().hierarchy_of(&array);
	assert_eq!(names(&h), ["E[]", "Object"]);
}

#[test]
fn cache_hit_shares_tail() {
	let ty = RuntimeType::class("Cached").build().unwrap();
	let cache = TypeHierarchyCache::new();
	let first = cache.hierarchy_of(&ty);
	assert!(cache.is_cached(&ty));
	let second = cache.hierarchy_of(&ty);
	assert!(Arc::ptr_eq(&first.tail, &second.tail));
}

#[test]
fn cache_does_not_keep_type_alive() {
	let cache = TypeHierarchyCache::new();
	let ty = RuntimeType::class("Transient").build().unwrap();
	let weak = ty.downgrade();
	drop(cache.hierarchy_of(&ty));
	assert_eq!(ty.strong_count(), 1);

	drop(ty);
	assert!(!weak.is_alive());
	assert_eq!(cache.len(), 1);
	assert_eq!(cache.sweep(), 1);
	assert!(cache.is_empty());
}

#[test]
fn scheduled_sweep_drops_dead_slots() {
	let cache = TypeHierarchyCache::with_sweep_interval(2);
	{
		let gone = RuntimeType::class("Gone").build().unwrap();
		cache.hierarchy_of(&gone);
	}
	let kept = RuntimeType::class("Kept").build().unwrap();
	cache.hierarchy_of(&kept);

	assert_eq!(cache.len(), 1);
	assert!(cache.is_cached(&kept));
}

fn arb_chain() -> impl Strategy<Value = Vec<(bool, usize)>> {
	prop::collection::vec((any::<bool>(), 0usize..4), 1..8)
}

/// Builds a class chain where each level optionally declares an interface that extends one
/// of the previously declared interfaces.
fn build_chain(shape: &[(bool, usize)]) -> RuntimeType {
	let mut ifaces: Vec<RuntimeType> = Vec::new();
	let mut current = RuntimeType::class("L0").build().unwrap();
	for (depth, (declare, parent)) in shape.iter().enumerate() {
		let mut builder = RuntimeType::class(format!("L{}", depth + 1)).extends(&current);
		if *declare {
			let mut iface = RuntimeType::interface(format!("I{depth}"));
			if let Some(p) = ifaces.get(*parent) {
				iface = iface.implements(p);
			}
			let iface = iface.build().unwrap();
			builder = builder.implements(&iface);
			ifaces.push(iface);
		}
		current = builder.build().unwrap();
	}
	current
}

proptest! {
	/// Walks are deterministic, start at the head, and only contain supertypes.
	#[test]
	fn prop_hierarchy_is_deterministic(shape in arb_chain()) {
		let leaf = build_chain(&shape);
		let a = TypeHierarchyCache::new().hierarchy_of(&leaf).to_vec();
		let b = TypeHierarchyCache::new().hierarchy_of(&leaf).to_vec();

		prop_assert_eq!(&a, &b);
		prop_assert_eq!(&a[0], &leaf);
		prop_assert_eq!(a.last(), Some(&RuntimeType::object()));
		for ty in &a {
			prop_assert!(leaf.is_subtype_of(ty), "{} is not a supertype of {}", ty, leaf);
		}
	}
}
