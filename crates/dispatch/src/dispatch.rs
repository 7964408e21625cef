use core::fmt;
use std::sync::{Arc, OnceLock};

use strata_types::{Instance, RuntimeType, TypeHierarchyCache, Value};

use crate::bootstrap::{self, BootstrapReport};
use crate::capability::{
	CapabilityRegistry, Equality, EqualityContext, EqualsOp, HashContext, HashOp, Hashing, RegisterOutcome, Resolution,
};
use crate::config::DispatchConfig;
use crate::conversion::{ConversionCandidate, ConversionRegistry, Converter};
use crate::error::{ConversionError, DispatchError, Result};
use crate::plugin::Registrar;


/// Equality, hashing and conversion registries sharing one hierarchy cache.
///
/// Plugins run once, on the first call to any query or mutation method. Accessors
/// ([`Self::config`], [`Self::hierarchy`]) never trigger bootstrap.
pub struct Dispatch {
	config: DispatchConfig,
	hierarchy: Arc<TypeHierarchyCache>,
	pub(crate) equality: CapabilityRegistry<Equality>,
	pub(crate) hashing: CapabilityRegistry<Hashing>,
	pub(crate) conversion: ConversionRegistry,
	pub(crate) registrars: Vec<Arc<dyn Registrar>>,
	pub(crate) discover: bool,
	bootstrap: OnceLock<BootstrapReport>,
}

impl Dispatch {
	pub fn builder() -> DispatchBuilder {
		DispatchBuilder::default()
	}

	/// Isolated instance with default config, its own hierarchy cache and plugin discovery.
	pub fn new() -> Self {
		Self::builder().build()
	}

	/// Runs bootstrap on first use. A plugin reaching this instance from inside its own
	/// registration (through [`global`], say) skips the wait and sees the registrations made
	/// so far.
	fn bootstrapped(&self) -> &Self {
		if self.bootstrap.get().is_none() && !bootstrap::is_running(self) {
			self.bootstrap.get_or_init(|| bootstrap::run(self));
		}
		self
	}

	/// Outcome of plugin bootstrap, running it if it has not run yet.
	///
	/// Must not be called from a plugin during bootstrap of the same instance: the report does
	/// not exist yet and the call blocks forever.
	pub fn bootstrap_report(&self) -> &BootstrapReport {
		self.bootstrap.get_or_init(|| bootstrap::run(self))
	}

	pub fn is_bootstrapped(&self) -> bool {
		self.bootstrap.get().is_some()
	}

	pub fn config(&self) -> &DispatchConfig {
		&self.config
	}

	pub fn hierarchy(&self) -> &TypeHierarchyCache {
		&self.hierarchy
	}

	pub fn resolve_equality(&self, ty: &RuntimeType) -> Resolution<dyn EqualsOp> {
		self.bootstrapped().equality.resolve(ty)
	}

	pub fn resolve_hash(&self, ty: &RuntimeType) -> Resolution<dyn HashOp> {
		self.bootstrapped().hashing.resolve(ty)
	}

	pub fn resolve_conversion(&self, from: &RuntimeType, to: &RuntimeType) -> Option<Arc<dyn Converter>> {
		self.bootstrapped().conversion.resolve(from, to)
	}

	/// Every distinct converter that could satisfy `from -> to`, first one wins.
	pub fn conversion_candidates(&self, from: &RuntimeType, to: &RuntimeType) -> Vec<ConversionCandidate> {
		self.bootstrapped().conversion.candidates(from, to)
	}

	pub fn register_equality(&self, ty: &RuntimeType, op: Arc<dyn EqualsOp>) -> Result<RegisterOutcome> {
		self.bootstrapped().equality.register(ty, op)
	}

	pub fn register_hash(&self, ty: &RuntimeType, op: Arc<dyn HashOp>) -> Result<RegisterOutcome> {
		self.bootstrapped().hashing.register(ty, op)
	}

	pub fn register_conversion(&self, from: &RuntimeType, to: &RuntimeType, converter: Arc<dyn Converter>) -> Result<()> {
		self.bootstrapped().conversion.register(from, to, converter)
	}

	pub fn unregister_equality(&self, ty: &RuntimeType) -> bool {
		self.bootstrapped().equality.unregister(ty)
	}

	pub fn unregister_hash(&self, ty: &RuntimeType) -> bool {
		self.bootstrapped().hashing.unregister(ty)
	}

	pub fn unregister_conversion(&self, from: &RuntimeType, to: &RuntimeType) -> bool {
		self.bootstrapped().conversion.unregister(from, to)
	}

	/// Structural equality dispatched on the runtime type of `a`.
	pub fn deep_equals(&self, a: &dyn Instance, b: &dyn Instance) -> bool {
		EqualityContext::new(&self.bootstrapped().equality, self.config.max_depth).equals(a, b)
	}

	/// Hash consistent with [`Self::deep_equals`] for registered implementations.
	pub fn deep_hash(&self, value: &dyn Instance) -> u64 {
		HashContext::new(&self.bootstrapped().hashing, self.config.max_depth).hash(value)
	}

	/// Converts `value` into `to` with the best registered converter.
	pub fn convert(&self, value: &dyn Instance, to: &RuntimeType) -> Result<Value, ConversionError> {
		let from = value.runtime_type();
		match self.resolve_conversion(&from, to) {
			Some(converter) => converter.convert(value, to),
			None => Err(ConversionError::NoConversion { from, to: to.clone() }),
		}
	}

	/// Drops entries for dead types from every registry and the hierarchy cache.
	pub fn sweep(&self) -> usize {
		self.equality.sweep() + self.hashing.sweep() + self.conversion.sweep() + self.hierarchy.sweep()
	}
}

impl Default for Dispatch {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Dispatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatch")
			.field("config", &self.config)
			.field("equality", &self.equality)
			.field("hashing", &self.hashing)
			.field("conversion", &self.conversion)
			.field("registrars", &self.registrars.len())
			.field("bootstrapped", &self.is_bootstrapped())
			.finish_non_exhaustive()
	}
}

/// Builder for [`Dispatch`].
pub struct DispatchBuilder {
	config: DispatchConfig,
	hierarchy: Option<Arc<TypeHierarchyCache>>,
	registrars: Vec<Arc<dyn Registrar>>,
	discover: bool,
}

impl Default for DispatchBuilder {
	fn default() -> Self {
		Self {
			config: DispatchConfig::default(),
			hierarchy: None,
			registrars: Vec::new(),
			discover: true,
		}
	}
}

impl DispatchBuilder {
	pub fn config(mut self, config: DispatchConfig) -> Self {
		self.config = config;
		self
	}

	/// Shares an existing hierarchy cache instead of creating one.
	pub fn hierarchy(mut self, hierarchy: Arc<TypeHierarchyCache>) -> Self {
		self.hierarchy = Some(hierarchy);
		self
	}

	/// Adds a registrar that runs before linked plugins, in the order added.
	pub fn registrar(mut self, registrar: impl Registrar + 'static) -> Self {
		self.registrars.push(Arc::new(registrar));
		self
	}

	/// Whether plugins submitted with [`plugin!`](crate::plugin!) run. On by default.
	pub fn discover_plugins(mut self, enabled: bool) -> Self {
		self.discover = enabled;
		self
	}

	pub fn build(self) -> Dispatch {
		let hierarchy = self
			.hierarchy
			.unwrap_or_else(|| Arc::new(TypeHierarchyCache::with_sweep_interval(self.config.sweep_interval)));
		let interval = self.config.sweep_interval;
		Dispatch {
			equality: CapabilityRegistry::with_sweep_interval(Arc::clone(&hierarchy), interval),
			hashing: CapabilityRegistry::with_sweep_interval(Arc::clone(&hierarchy), interval),
			conversion: ConversionRegistry::with_options(Arc::clone(&hierarchy), self.config.diagnostics, interval),
			hierarchy,
			config: self.config,
			registrars: self.registrars,
			discover: self.discover,
			bootstrap: OnceLock::new(),
		}
	}
}

static GLOBAL: OnceLock<Dispatch> = OnceLock::new();

/// The process-wide instance, created on first access with default config and the shared
/// [`TypeHierarchyCache::global`].
///
/// Plugins should register through the [`Registrations`](crate::Registrations) handle they
/// are given rather than through this instance.
pub fn global() -> &'static Dispatch {
	GLOBAL.get_or_init(|| Dispatch::builder().hierarchy(TypeHierarchyCache::global()).build())
}

/// Installs `dispatch` as the process-wide instance. Fails once [`global`] has been used or
/// another instance was installed.
pub fn install_global(dispatch: Dispatch) -> Result<()> {
	GLOBAL.set(dispatch).map_err(|_| DispatchError::AlreadyInitialized)
}
