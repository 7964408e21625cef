//! Plugin discovery.
//!
//! Crates contribute registrations at link time with [`plugin!`](crate::plugin!), collected
//! through `inventory`. Hosts can also inject [`Registrar`] objects through
//! [`DispatchBuilder::registrar`](crate::DispatchBuilder::registrar). Both run once, on first
//! use of the [`Dispatch`] that discovers them.

use core::fmt;
use std::sync::Arc;

use strata_types::{RuntimeType, TypeHierarchyCache};

use crate::Dispatch;
use crate::capability::{EqualsOp, HashOp, RegisterOutcome};
use crate::config::DispatchConfig;
use crate::conversion::Converter;
use crate::error::Result;

/// Represents where a plugin was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginSource {
	/// Shipped with this crate.
	Builtin,
	/// Submitted by a library crate.
	Crate(&'static str),
	/// Injected by the host at runtime.
	Runtime,
}

impl PluginSource {
	/// Returns the ordering rank of the source (lower runs first).
	pub const fn rank(self) -> u8 {
		match self {
			Self::Builtin => 0,
			Self::Crate(_) => 1,
			Self::Runtime => 2,
		}
	}
}

impl fmt::Display for PluginSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Builtin => write!(f, "builtin"),
			Self::Crate(name) => write!(f, "crate:{name}"),
			Self::Runtime => write!(f, "runtime"),
		}
	}
}

/// Static metadata for a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginMeta {
	pub id: &'static str,
	pub description: &'static str,
	/// Lower priorities run first.
	pub priority: i16,
	pub source: PluginSource,
}

impl PluginMeta {
	pub const fn new(id: &'static str, description: &'static str) -> Self {
		Self {
			id,
			description,
			priority: 0,
			source: PluginSource::Builtin,
		}
	}

	pub const fn with_priority(mut self, priority: i16) -> Self {
		self.priority = priority;
		self
	}

	pub const fn with_source(mut self, source: PluginSource) -> Self {
		self.source = source;
		self
	}
}

/// A plugin descriptor that registers capabilities and converters.
pub struct PluginDef {
	pub meta: PluginMeta,
	/// Called once during bootstrap. Register through the given handle only: waiting on
	/// another thread that uses the same [`Dispatch`](crate::Dispatch) deadlocks.
	pub register: fn(&Registrations<'_>) -> Result<()>,
}

inventory::collect!(PluginDef);

impl PluginDef {
	pub const fn new(meta: PluginMeta, register: fn(&Registrations<'_>) -> Result<()>) -> Self {
		Self { meta, register }
	}
}

impl fmt::Debug for PluginDef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PluginDef").field("meta", &self.meta).finish_non_exhaustive()
	}
}

/// Linked plugins in run order: priority, then source rank, then id.
pub(crate) fn discovered() -> Vec<&'static PluginDef> {
	let mut plugins: Vec<&'static PluginDef> = inventory::iter::<PluginDef>.into_iter().collect();
	plugins.sort_by(|a, b| {
		a.meta
			.priority
			.cmp(&b.meta.priority)
			.then_with(|| a.meta.source.rank().cmp(&b.meta.source.rank()))
			.then_with(|| a.meta.id.cmp(b.meta.id))
	});
	plugins
}

/// A registration source supplied by the host instead of discovered at link time.
pub trait Registrar: Send + Sync {
	/// Name used in logs and [`BootstrapReport`](crate::BootstrapReport).
	fn name(&self) -> &str;

	/// Called once during bootstrap. Register through `registrations` only; neither
	/// [`global`](crate::global) nor the [`Dispatch`](crate::Dispatch) being bootstrapped
	/// has its plugins loaded yet.
	fn register(&self, registrations: &Registrations<'_>) -> Result<()>;
}

/// Mutation surface handed to plugins during bootstrap.
///
/// Writes go straight to the registries of the dispatch being bootstrapped, so plugins never
/// wait on their own bootstrap.
pub struct Registrations<'a> {
	dispatch: &'a Dispatch,
}

impl<'a> Registrations<'a> {
	pub(crate) fn new(dispatch: &'a Dispatch) -> Self {
		Self { dispatch }
	}

	pub fn register_equality(&self, ty: &RuntimeType, op: Arc<dyn EqualsOp>) -> Result<RegisterOutcome> {
		self.dispatch.equality.register(ty, op)
	}

	pub fn register_hash(&self, ty: &RuntimeType, op: Arc<dyn HashOp>) -> Result<RegisterOutcome> {
		self.dispatch.hashing.register(ty, op)
	}

	pub fn register_conversion(&self, from: &RuntimeType, to: &RuntimeType, converter: Arc<dyn Converter>) -> Result<()> {
		self.dispatch.conversion.register(from, to, converter)
	}

	pub fn hierarchy(&self) -> &TypeHierarchyCache {
		self.dispatch.hierarchy()
	}

	pub fn config(&self) -> &DispatchConfig {
		self.dispatch.config()
	}
}

/// Submits a [`PluginDef`] for link-time discovery.
///
/// ```ignore
/// strata_dispatch::plugin!(money, {
///     description: "Currency-aware equality",
///     priority: -10,
/// }, register: |r| {
///     r.register_equality(&MONEY, Arc::new(money_eq))?;
///     Ok(())
/// });
/// ```
#[macro_export]
macro_rules! plugin {
	($name:ident, {
		description: $desc:expr
		$(, priority: $priority:expr)?
		$(,)?
	}, register: $register:expr) => {
		$crate::inventory::submit! {
			$crate::plugin::PluginDef {
				meta: $crate::plugin::PluginMeta {
					id: concat!(env!("CARGO_PKG_NAME"), "::", stringify!($name)),
					description: $desc,
					priority: $crate::__plugin_opt!($({$priority})?, 0),
					source: $crate::plugin::PluginSource::Crate(env!("CARGO_PKG_NAME")),
				},
				register: $register,
			}
		}
	};
}

#[macro_export]
#[doc(hidden)]
macro_rules! __plugin_opt {
	(, $default:expr) => {
		$default
	};
	({$val:expr}, $default:expr) => {
		$val
	};
}
