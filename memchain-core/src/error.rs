use crate::cache::CacheError;

/// Errors from model operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
	/// A text fragment matched none of the token classes.
	///
	/// The splitter and the classes are kept exhaustive together, so
	/// hitting this indicates a configuration bug rather than an
	/// expected runtime condition. Fatal to the tokenize call that
	/// produced it.
	#[error("unknown token kind: {0:?}")]
	UnknownTokenKind(String),

	/// A configuration value was out of range.
	#[error("invalid configuration: {0}")]
	Config(String),

	/// A cache operation failed in transit.
	///
	/// Transient; the store's primitives are idempotent or commutative,
	/// so retrying the surrounding operation is safe.
	#[error(transparent)]
	Cache(#[from] CacheError),
}

/// Result type for model operations.
pub type ChainResult<T> = std::result::Result<T, ChainError>;
