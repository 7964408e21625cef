//! Binary dispatch: converters keyed by (source type, destination type).
//!
//! # Precedence Contract
//!
//! 1. **Source walk:** an explicit converter from the source (or the nearest ancestor of the
//!    source, in hierarchy walk order) to exactly the requested destination.
//! 2. **Up-cast:** a converter registered for a subtype of the requested destination, found
//!    through the up-cast entries recorded at registration time, again walking the source
//!    hierarchy.
//! 3. **Destination walk:** a converter from the source itself to an ancestor of the requested
//!    destination, nearest ancestor first. The result may be a supertype of the destination.
//! 4. Nothing: the caller decides.
//!
//! Registering `S -> D` records up-cast entries `S -> A` for every ancestor `A` of `D` that has
//! no explicit converter and no earlier up-cast entry. Up-cast entries never shadow explicit
//! registrations, whichever came first.

mod registry;


use core::fmt;
use std::sync::Arc;

pub use registry::ConversionRegistry;
use strata_types::{Instance, RuntimeType, Value};

use crate::error::ConversionError;

/// Converts values into a target type.
pub trait Converter: Send + Sync {
	/// Converts `value` for a request targeting `to`. The result may be a subtype of `to`.
	fn convert(&self, value: &dyn Instance, to: &RuntimeType) -> Result<Value, ConversionError>;
}

impl<F> Converter for F
where
	F: Fn(&dyn Instance, &RuntimeType) -> Result<Value, ConversionError> + Send + Sync,
{
	fn convert(&self, value: &dyn Instance, to: &RuntimeType) -> Result<Value, ConversionError> {
		self(value, to)
	}
}

/// One way of satisfying a conversion request, as reported by
/// [`ConversionRegistry::candidates`].
#[derive(Clone)]
pub struct ConversionCandidate {
	/// The source-hierarchy entry the converter is registered for.
	pub from: RuntimeType,
	/// The destination the converter was registered with.
	pub to: RuntimeType,
	/// Registered for a destination other than the requested one.
	pub upcast: bool,
	pub converter: Arc<dyn Converter>,
}

impl fmt::Debug for ConversionCandidate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConversionCandidate")
			.field("from", &self.from)
			.field("to", &self.to)
			.field("upcast", &self.upcast)
			.finish_non_exhaustive()
	}
}

impl fmt::Display for ConversionCandidate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} -> {}", self.from, self.to)?;
		if self.upcast {
			f.write_str(" (up-cast)")?;
		}
		Ok(())
	}
}
