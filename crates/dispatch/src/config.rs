//! Engine configuration.
//!
//! ```toml
//! diagnostics = true
//! sweep_interval = 512
//! max_depth = 128
//! ```

use serde::Deserialize;
use strata_types::retention::DEFAULT_SWEEP_INTERVAL;

use crate::error::{DispatchError, Result};

/// Default recursion limit for structural equality and hashing.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Tunables for a [`Dispatch`](crate::Dispatch) instance. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
	/// Report ambiguous conversion graphs with `tracing::warn!`.
	pub diagnostics: bool,
	/// Writes between sweeps of dead weak keys; `0` disables scheduled sweeps.
	pub sweep_interval: usize,
	/// Nesting limit for structural array equality and hashing before falling back to native
	/// behavior.
	pub max_depth: usize,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			diagnostics: cfg!(debug_assertions),
			sweep_interval: DEFAULT_SWEEP_INTERVAL,
			max_depth: DEFAULT_MAX_DEPTH,
		}
	}
}

impl DispatchConfig {
	pub fn from_toml_str(src: &str) -> Result<Self> {
		toml::from_str(src).map_err(|e| DispatchError::Config(e.to_string()))
	}

	pub fn with_diagnostics(mut self, enabled: bool) -> Self {
		self.diagnostics = enabled;
		self
	}

	pub fn with_sweep_interval(mut self, interval: usize) -> Self {
		self.sweep_interval = interval;
		self
	}

	pub fn with_max_depth(mut self, depth: usize) -> Self {
		self.max_depth = depth;
		self
	}
}
