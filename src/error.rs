//! Error types for the serving-graph cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by topology store implementations
pub type TopoResult<T> = std::result::Result<T, TopoError>;

/// Failures reported by the underlying topology store.
///
/// The cache treats every variant the same way; the distinction only matters
/// to callers that inspect the source of an [`Error::Uncached`].
/// `Clone` so that a single failed fetch can be handed to every coalesced caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopoError {
    /// Node does not exist in the serving graph
    #[error("node doesn't exist: {path}")]
    NoNode { path: String },

    /// Store call timed out
    #[error("deadline exceeded")]
    Timeout,

    /// Store call was interrupted
    #[error("interrupted")]
    Interrupted,

    /// Store is unreachable or refused the request
    #[error("topology store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot could not be read
    #[error("I/O error reading {path}: {reason}")]
    Io { path: String, reason: String },

    /// Snapshot could not be decoded
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl TopoError {
    /// Create a no-node error for the given serving-graph path
    pub fn no_node(path: impl Into<String>) -> Self {
        TopoError::NoNode { path: path.into() }
    }

    /// Check if this is a no-node error
    pub fn is_no_node(&self) -> bool {
        matches!(self, TopoError::NoNode { .. })
    }
}

/// Errors surfaced to callers of the resilient cache
#[derive(Error, Debug)]
pub enum Error {
    /// The store failed and no value was ever cached for this key
    #[error("{resource} failed: {source} (no cached value)")]
    Uncached {
        resource: String,
        #[source]
        source: TopoError,
    },

    /// Unknown tablet type name
    #[error("Invalid tablet type: {0}")]
    InvalidTabletType(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// The upstream failure behind an uncached error, if any
    pub fn topo_source(&self) -> Option<&TopoError> {
        match self {
            Error::Uncached { source, .. } => Some(source),
            _ => None,
        }
    }
}
