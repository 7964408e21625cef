//! Dynamically typed values.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::RuntimeType;

/// Shared handle to a dynamically typed value.
pub type Value = Arc<dyn Instance>;

/// A value that knows its declared runtime type.
///
/// The `native_*` methods are the type's own behavior, used whenever dispatch reports no
/// override. Types that override them should declare the matching
/// [`NativeOps`](crate::NativeOps) flag so dispatch can give them precedence over
/// interface-level registrations.
pub trait Instance: Any + Send + Sync + fmt::Debug {
	fn runtime_type(&self) -> RuntimeType;

	/// Defaults to identity.
	fn native_eq(&self, other: &dyn Instance) -> bool {
		core::ptr::addr_eq(self, other)
	}

	/// Defaults to the address, consistent with identity equality.
	fn native_hash(&self) -> u64 {
		(self as *const Self).cast::<()>() as usize as u64
	}

	/// Element snapshot for array values; `None` for everything else.
	fn elements(&self) -> Option<Vec<Value>> {
		None
	}
}

impl dyn Instance {
	pub fn is<T: Instance>(&self) -> bool {
		let any: &dyn Any = self;
		any.is::<T>()
	}

	pub fn downcast_ref<T: Instance>(&self) -> Option<&T> {
		let any: &dyn Any = self;
		any.downcast_ref::<T>()
	}
}

/// Array instance with a fixed runtime type and replaceable slots.
///
/// Slots sit behind a lock so an array can be made to contain itself.
pub struct ArrayValue {
	ty: RuntimeType,
	items: RwLock<Vec<Value>>,
}

impl ArrayValue {
	/// Creates an array of `element` type holding `items`.
	pub fn new(element: &RuntimeType, items: Vec<Value>) -> Self {
		Self {
			ty: RuntimeType::array_of(element),
			items: RwLock::new(items),
		}
	}

	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.read().is_empty()
	}

	pub fn get(&self, index: usize) -> Option<Value> {
		self.items.read().get(index).cloned()
	}

	/// Replaces slot `index`. Returns the previous value, or `None` if out of bounds.
	pub fn set(&self, index: usize, value: Value) -> Option<Value> {
		let mut items = self.items.write();
		let slot = items.get_mut(index)?;
		Some(core::mem::replace(slot, value))
	}

	pub fn push(&self, value: Value) {
		self.items.write().push(value);
	}
}

impl fmt::Debug for ArrayValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// Elements may contain this array; print the shape only.
		f.debug_struct("ArrayValue")
			.field("ty", &self.ty)
			.field("len", &self.len())
			.finish()
	}
}

impl Instance for ArrayValue {
	fn runtime_type(&self) -> RuntimeType {
		self.ty.clone()
	}

	fn elements(&self) -> Option<Vec<Value>> {
		Some(self.items.read().clone())
	}
}
