use strata_types::RuntimeType;

/// Caller errors detected while registering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgument {
	/// Capabilities cannot be registered for the universal root type.
	#[error("cannot register a capability for the root type")]
	RootType,
	/// A conversion from a type to itself.
	#[error("conversion from {ty} to itself")]
	SameSourceAndDestination { ty: RuntimeType },
	/// A converter already exists for the exact pair.
	#[error("duplicate conversion: {from} -> {to}")]
	DuplicateConversion { from: RuntimeType, to: RuntimeType },
}

/// Errors surfaced by registration, bootstrap and configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
	#[error("invalid argument: {0}")]
	InvalidArgument(#[from] InvalidArgument),

	/// One plugin failed; other plugins are unaffected.
	#[error("plugin '{plugin}' failed to load: {reason}")]
	PluginLoad { plugin: String, reason: String },

	#[error("configuration error: {0}")]
	Config(String),

	#[error("global dispatch already initialized")]
	AlreadyInitialized,
}

/// Failure while converting a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
	/// Nothing is registered that converts `from` into `to`.
	#[error("no conversion from {from} to {to}")]
	NoConversion { from: RuntimeType, to: RuntimeType },
	/// The converter does not accept this particular value.
	#[error("converter cannot handle {value_type} -> {to}")]
	Unsupported { value_type: RuntimeType, to: RuntimeType },
	#[error("conversion failed: {0}")]
	Failed(String),
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
