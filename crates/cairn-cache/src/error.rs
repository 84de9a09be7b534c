use cairn_core::CodecError;
use cairn_core::KeyValueStoreError;
use thiserror::Error;

/// Boxed error returned by a cache loader.
pub type LoaderError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("shared cache layer failed: {0}")]
    Storage(#[from] KeyValueStoreError),

    #[error("cached value for '{key}' could not be encoded or decoded: {source}")]
    Codec {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("loader for '{key}' failed: {source}")]
    Loader {
        key: String,
        #[source]
        source: LoaderError,
    },

    #[error("invalid cache key: {reason}")]
    InvalidKey { reason: String },
}

impl CacheError {
    /// True when the shared layer could not be reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CacheError::Storage(e) if e.is_connectivity())
    }
}
