//! Error types for the index crate.

use w3ml_store::StoreError;
use w3ml_types::{ReplayHash, TypeError};

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The replay is already catalogued.
    #[error("replay {hash} already present at index {index}")]
    Duplicate { hash: ReplayHash, index: u64 },

    /// No catalogued replay matches the token.
    #[error("no replay matches {0:?}")]
    NotFound(String),

    /// A numeric index past the end of the catalog.
    #[error("index {index} out of range ({len} replays)")]
    OutOfRange { index: u64, len: u64 },

    /// The row's hash does not match the bytes being added.
    #[error("row hash {row} does not match content hash {content}")]
    HashMismatch { row: ReplayHash, content: ReplayHash },

    /// Underlying storage failure. Fatal.
    #[error("storage error: {0}")]
    Storage(StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfRange { index, len } => Self::OutOfRange { index, len },
            other => Self::Storage(other),
        }
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(StoreError::Io(err))
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
