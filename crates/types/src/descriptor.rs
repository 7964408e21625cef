//! Declared type descriptors.
//!
//! A [`RuntimeType`] is a shared handle to an immutable [`TypeDescriptor`]. Descriptors
//! are built bottom-up with [`TypeBuilder`], which only accepts already-built parents, so
//! the extends/implements graph is acyclic by construction.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::TypeKey;

bitflags::bitflags! {
	/// Capability operations a type implements itself rather than inheriting.
	///
	/// Declared once when the type is built; dispatch never probes for it at call time.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct NativeOps: u8 {
		/// The type defines its own equality.
		const EQUALS = 1 << 0;
		/// The type defines its own hash code.
		const HASH = 1 << 1;
	}
}

/// Shape of a declared type.
#[derive(Debug, Clone)]
pub enum TypeKind {
	/// A concrete (or abstract) class with at most one superclass.
	Class,
	/// An interface; may extend any number of other interfaces.
	Interface,
	/// Array of `element`. Array types are created on demand by [`RuntimeType::array_of`].
	Array {
		/// Component type.
		element: RuntimeType,
	},
}

/// Errors raised while declaring a type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
	#[error("{name}: superclass {parent} is not a class")]
	SuperclassNotClass { name: String, parent: String },
	#[error("{name}: {parent} is not an interface")]
	NotAnInterface { name: String, parent: String },
	#[error("{name}: interfaces cannot extend a class")]
	InterfaceWithSuperclass { name: String },
}

/// Immutable description of one declared type.
pub struct TypeDescriptor {
	key: TypeKey,
	name: Box<str>,
	kind: TypeKind,
	superclass: Option<RuntimeType>,
	interfaces: Box<[RuntimeType]>,
	native: NativeOps,
	/// Interned `array_of(self)`, held weakly so the element does not pin its array type.
	array: Mutex<Weak<TypeDescriptor>>,
}

impl fmt::Debug for TypeDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypeDescriptor")
			.field("key", &self.key)
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("superclass", &self.superclass)
			.field("interfaces", &self.interfaces)
			.field("native", &self.native)
			.finish_non_exhaustive()
	}
}

static OBJECT: LazyLock<RuntimeType> = LazyLock::new(|| {
	RuntimeType::from_descriptor(TypeDescriptor {
		key: TypeKey::next(),
		name: "Object".into(),
		kind: TypeKind::Class,
		superclass: None,
		interfaces: Box::new([]),
		native: NativeOps::empty(),
		array: Mutex::new(Weak::new()),
	})
});

/// Shared handle to a declared type.
///
/// Two handles are equal iff they denote the same declaration.
#[derive(Clone)]
pub struct RuntimeType(Arc<TypeDescriptor>);

impl RuntimeType {
	fn from_descriptor(desc: TypeDescriptor) -> Self {
		Self(Arc::new(desc))
	}

	/// The universal root type every class (and every array) ultimately extends.
	pub fn object() -> Self {
		OBJECT.clone()
	}

	/// Starts declaring a class. Without [`TypeBuilder::extends`] it extends [`Self::object`].
	pub fn class(name: impl Into<Box<str>>) -> TypeBuilder {
		TypeBuilder::new(name.into(), false)
	}

	/// Starts declaring an interface.
	pub fn interface(name: impl Into<Box<str>>) -> TypeBuilder {
		TypeBuilder::new(name.into(), true)
	}

	/// Returns the array type whose component is `element`.
	///
	/// Interned per element: repeated calls yield equal types while the array type is alive.
	pub fn array_of(element: &Self) -> Self {
		let mut slot = element.0.array.lock();
		if let Some(existing) = slot.upgrade() {
			return Self(existing);
		}
		let array = Self::from_descriptor(TypeDescriptor {
			key: TypeKey::next(),
			name: format!("{}[]", element.name()).into(),
			kind: TypeKind::Array {
				element: element.clone(),
			},
			superclass: Some(Self::object()),
			interfaces: Box::new([]),
			native: NativeOps::empty(),
			array: Mutex::new(Weak::new()),
		});
		*slot = Arc::downgrade(&array.0);
		array
	}

	pub fn key(&self) -> TypeKey {
		self.0.key
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	pub fn kind(&self) -> &TypeKind {
		&self.0.kind
	}

	pub fn superclass(&self) -> Option<&Self> {
		self.0.superclass.as_ref()
	}

	pub fn interfaces(&self) -> &[Self] {
		&self.0.interfaces
	}

	pub fn native(&self) -> NativeOps {
		self.0.native
	}

	/// Whether this type itself declares every operation in `ops`.
	pub fn declares(&self, ops: NativeOps) -> bool {
		!ops.is_empty() && self.0.native.contains(ops)
	}

	pub fn is_interface(&self) -> bool {
		matches!(self.0.kind, TypeKind::Interface)
	}

	pub fn is_array(&self) -> bool {
		matches!(self.0.kind, TypeKind::Array { .. })
	}

	pub fn is_root(&self) -> bool {
		self.key() == OBJECT.key()
	}

	/// Component type of an array type.
	pub fn element(&self) -> Option<&Self> {
		match &self.0.kind {
			TypeKind::Array { element } => Some(element),
			_ => None,
		}
	}

	/// Whether `self` is `other` or reachable from it through extends/implements edges.
	pub fn is_subtype_of(&self, other: &Self) -> bool {
		let mut stack: SmallVec<[&Self; 16]> = SmallVec::new();
		stack.push(self);
		while let Some(ty) = stack.pop() {
			if ty == other {
				return true;
			}
			stack.extend(ty.interfaces());
			stack.extend(ty.superclass());
		}
		false
	}

	pub fn downgrade(&self) -> WeakType {
		WeakType {
			key: self.key(),
			ptr: Arc::downgrade(&self.0),
		}
	}

	/// Number of live handles to this declaration.
	pub fn strong_count(&self) -> usize {
		Arc::strong_count(&self.0)
	}
}

impl PartialEq for RuntimeType {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl Eq for RuntimeType {}

impl Hash for RuntimeType {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key().hash(state);
	}
}

impl fmt::Debug for RuntimeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.name(), self.key())
	}
}

impl fmt::Display for RuntimeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Non-owning handle to a declared type, used as a cache key anchor.
#[derive(Debug, Clone)]
pub struct WeakType {
	key: TypeKey,
	ptr: Weak<TypeDescriptor>,
}

impl WeakType {
	pub fn key(&self) -> TypeKey {
		self.key
	}

	pub fn upgrade(&self) -> Option<RuntimeType> {
		self.ptr.upgrade().map(RuntimeType)
	}

	/// Whether the declaration still has a live [`RuntimeType`] handle somewhere.
	pub fn is_alive(&self) -> bool {
		self.ptr.strong_count() > 0
	}
}

/// Declares a class or interface.
#[derive(Debug)]
pub struct TypeBuilder {
	name: Box<str>,
	interface: bool,
	superclass: Option<RuntimeType>,
	interfaces: Vec<RuntimeType>,
	native: NativeOps,
}

impl TypeBuilder {
	fn new(name: Box<str>, interface: bool) -> Self {
		Self {
			name,
			interface,
			superclass: None,
			interfaces: Vec::new(),
			native: NativeOps::empty(),
		}
	}

	/// Sets the superclass. Classes only.
	pub fn extends(mut self, parent: &RuntimeType) -> Self {
		self.superclass = Some(parent.clone());
		self
	}

	/// Appends a directly implemented (or, for interfaces, extended) interface.
	pub fn implements(mut self, parent: &RuntimeType) -> Self {
		self.interfaces.push(parent.clone());
		self
	}

	/// Declares operations the type implements itself.
	pub fn native(mut self, ops: NativeOps) -> Self {
		self.native |= ops;
		self
	}

	pub fn build(self) -> Result<RuntimeType, TypeError> {
		if let Some(parent) = self.interfaces.iter().find(|p| !p.is_interface()) {
			return Err(TypeError::NotAnInterface {
				name: self.name.into(),
				parent: parent.name().to_owned(),
			});
		}

		let superclass = if self.interface {
			if self.superclass.is_some() {
				return Err(TypeError::InterfaceWithSuperclass { name: self.name.into() });
			}
			None
		} else {
			match self.superclass {
				Some(parent) if !matches!(parent.kind(), TypeKind::Class) => {
					return Err(TypeError::SuperclassNotClass {
						name: self.name.into(),
						parent: parent.name().to_owned(),
					});
				}
				Some(parent) => Some(parent),
				None => Some(RuntimeType::object()),
			}
		};

		Ok(RuntimeType::from_descriptor(TypeDescriptor {
			key: TypeKey::next(),
			name: self.name,
			kind: if self.interface { TypeKind::Interface } else { TypeKind::Class },
			superclass,
			interfaces: self.interfaces.into_boxed_slice(),
			native: self.native,
			array: Mutex::new(Weak::new()),
		}))
	}
}
