//! Type-keyed capability dispatch.
//!
//! A [`Dispatch`] answers three questions for runtime types declared with `strata-types`:
//! how two values of a type compare ([`Equality`]), how a value hashes ([`Hashing`]), and how
//! a value becomes another type ([`ConversionRegistry`]). Answers come from registrations on
//! the type or its nearest ancestor, and are cached per type.
//!
//! # Modules
//!
//! - [`capability`] - unary dispatch registries and the deep equality/hash contexts
//! - [`conversion`] - binary dispatch with up-cast inference
//! - [`plugin`] - link-time and injected registration sources
//! - [`config`] - tunables loaded from TOML
//!
//! # Plugins
//!
//! Registrations contributed with [`plugin!`] or [`DispatchBuilder::registrar`] run once,
//! on first use of a [`Dispatch`]. A failing plugin is logged and reported in
//! [`BootstrapReport`]; the rest still load.

mod bootstrap;
pub mod capability;
pub mod config;
pub mod conversion;
mod dispatch;
mod error;
pub mod plugin;

#[cfg(test)]
mod test_fixtures;

pub use bootstrap::BootstrapReport;
pub use capability::{
	Capability, CapabilityRegistry, Equality, EqualityContext, EqualsOp, HashContext, HashOp, Hashing, RegisterOutcome,
	Resolution,
};
pub use config::DispatchConfig;
pub use conversion::{ConversionCandidate, ConversionRegistry, Converter};
pub use dispatch::{Dispatch, DispatchBuilder, global, install_global};
pub use error::{ConversionError, DispatchError, InvalidArgument, Result};
#[doc(hidden)]
pub use inventory;
pub use plugin::{PluginDef, PluginMeta, PluginSource, Registrar, Registrations};
