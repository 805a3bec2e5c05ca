//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the engine returns [`IndexError`]. Batch
//! operations skip malformed single inputs and report them via counts
//! instead of failing the whole batch; structural failures (corrupt
//! snapshots, dimension mismatches at training) are fatal to the operation.

use std::fmt;
use std::io;

/// Error type for all index operations.
#[derive(Debug)]
pub enum IndexError {
    /// Vector has the wrong dimension or contains non-finite values.
    InvalidVector(String),
    /// Quantizer operation attempted before a codebook was trained.
    NotTrained,
    /// Operation on an unknown or deleted vector id.
    NotFound(u64),
    /// Serialized blob failed structural validation.
    CorruptState(String),
    /// A persistence load/save operation failed.
    Persistence(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::InvalidVector(msg) => write!(f, "invalid vector: {msg}"),
            IndexError::NotTrained => write!(f, "quantizer has not been trained"),
            IndexError::NotFound(id) => write!(f, "vector id {id} not found"),
            IndexError::CorruptState(msg) => write!(f, "corrupt index state: {msg}"),
            IndexError::Persistence(msg) => write!(f, "persistence failure: {msg}"),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<io::Error> for IndexError {
    fn from(e: io::Error) -> Self {
        IndexError::Persistence(e.to_string())
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        IndexError::CorruptState(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = IndexError::InvalidVector("expected dimension 4, got 3".into());
        assert!(e.to_string().contains("expected dimension 4"));
        assert_eq!(
            IndexError::NotTrained.to_string(),
            "quantizer has not been trained"
        );
        assert!(IndexError::NotFound(42).to_string().contains("42"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let e: IndexError = io_err.into();
        assert!(matches!(e, IndexError::Persistence(_)));
    }
}
