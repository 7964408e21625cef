//! Runtime type model for strata.
//!
//! Declared types are explicit [`TypeDescriptor`]s shared through [`RuntimeType`] handles.
//! [`TypeHierarchyCache`] linearizes and memoizes each type's ancestor chain, and
//! [`Instance`] ties dynamically typed values back to their declarations.
//!
//! Every cache in this crate and in `strata-dispatch` keys on [`TypeKey`] and anchors its
//! slots with a [`WeakType`], see [`retention`].

mod descriptor;
mod hierarchy;
mod instance;
mod key;
pub mod retention;

pub use descriptor::{NativeOps, RuntimeType, TypeBuilder, TypeDescriptor, TypeError, TypeKind, WeakType};
pub use hierarchy::{Hierarchy, TypeHierarchyCache};
pub use instance::{ArrayValue, Instance, Value};
pub use key::TypeKey;
