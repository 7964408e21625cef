//! Shared types and values for unit tests.

use std::sync::Arc;

use strata_types::{Instance, NativeOps, RuntimeType, TypeHierarchyCache, Value};

use crate::capability::{CapabilityRegistry, EqualityContext, EqualsOp, HashContext, HashOp};
use crate::conversion::Converter;
use crate::error::ConversionError;

/// Integer-carrying value. Native equality/hash compare by value only when its type declares
/// them; otherwise identity.
#[derive(Debug)]
pub(crate) struct Obj {
	pub ty: RuntimeType,
	pub value: i64,
}

impl Instance for Obj {
	fn runtime_type(&self) -> RuntimeType {
		self.ty.clone()
	}

	fn native_eq(&self, other: &dyn Instance) -> bool {
		if self.ty.declares(NativeOps::EQUALS) {
			other.downcast_ref::<Obj>().is_some_and(|o| o.ty == self.ty && o.value == self.value)
		} else {
			core::ptr::addr_eq(self, other)
		}
	}

	fn native_hash(&self) -> u64 {
		if self.ty.declares(NativeOps::HASH) {
			self.value as u64
		} else {
			core::ptr::from_ref(self).cast::<()>() as usize as u64
		}
	}
}

pub(crate) fn obj(ty: &RuntimeType, value: i64) -> Value {
	Arc::new(Obj { ty: ty.clone(), value })
}

pub(crate) fn value_of(v: &dyn Instance) -> Option<i64> {
	v.downcast_ref::<Obj>().map(|o| o.value)
}

/// Equal when both carry the same integer, regardless of type.
pub(crate) fn by_value() -> Arc<dyn EqualsOp> {
	Arc::new(|_: &mut EqualityContext<'_>, a: &dyn Instance, b: &dyn Instance| {
		value_of(a).is_some() && value_of(a) == value_of(b)
	})
}

/// Equal when both integers agree modulo 10.
pub(crate) fn by_last_digit() -> Arc<dyn EqualsOp> {
	Arc::new(|_: &mut EqualityContext<'_>, a: &dyn Instance, b: &dyn Instance| match (value_of(a), value_of(b)) {
		(Some(x), Some(y)) => x.rem_euclid(10) == y.rem_euclid(10),
		_ => false,
	})
}

pub(crate) fn value_hash() -> Arc<dyn HashOp> {
	Arc::new(|_: &mut HashContext<'_>, v: &dyn Instance| value_of(v).map_or(0, |x| x as u64))
}

/// Converter producing an [`Obj`] of `target` carrying the source value plus `offset`.
pub(crate) fn shift_into(target: &RuntimeType, offset: i64) -> Arc<dyn Converter> {
	let target = target.clone();
	Arc::new(move |v: &dyn Instance, _to: &RuntimeType| match value_of(v) {
		Some(x) => Ok(obj(&target, x + offset)),
		None => Err(ConversionError::Unsupported {
			value_type: v.runtime_type(),
			to: target.clone(),
		}),
	})
}

pub(crate) fn class(name: &str) -> RuntimeType {
	RuntimeType::class(name).build().unwrap()
}

pub(crate) fn interface(name: &str) -> RuntimeType {
	RuntimeType::interface(name).build().unwrap()
}

pub(crate) fn registry<C: crate::capability::Capability>() -> CapabilityRegistry<C> {
	CapabilityRegistry::new(Arc::new(TypeHierarchyCache::new()))
}

/// `Shape` with a self-implementing `Circle`, a plain `Square` and a `Polygon` base class.
pub(crate) struct Shapes {
	pub shape: RuntimeType,
	pub polygon: RuntimeType,
	pub square: RuntimeType,
	pub circle: RuntimeType,
}

impl Shapes {
	pub(crate) fn new() -> Self {
		let shape = interface("Shape");
		let polygon = RuntimeType::class("Polygon").implements(&shape).build().unwrap();
		let square = RuntimeType::class("Square").extends(&polygon).build().unwrap();
		let circle = RuntimeType::class("Circle")
			.implements(&shape)
			.native(NativeOps::EQUALS | NativeOps::HASH)
			.build()
			.unwrap();
		Self {
			shape,
			polygon,
			square,
			circle,
		}
	}
}

/// `Integer -> Number`, `BigNumber -> Number`, `Number -> Object`, with `Comparable` on
/// `BigNumber`.
pub(crate) struct Numbers {
	pub comparable: RuntimeType,
	pub number: RuntimeType,
	pub integer: RuntimeType,
	pub big_number: RuntimeType,
	pub text: RuntimeType,
}

impl Numbers {
	pub(crate) fn new() -> Self {
		let comparable = interface("Comparable");
		let number = class("Number");
		let integer = RuntimeType::class("Integer").extends(&number).build().unwrap();
		let big_number = RuntimeType::class("BigNumber")
			.extends(&number)
			.implements(&comparable)
			.build()
			.unwrap();
		let text = class("Text");
		Self {
			comparable,
			number,
			integer,
			big_number,
			text,
		}
	}
}
