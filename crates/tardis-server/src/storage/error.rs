//! Storage error types.
//!
//! - `Conflict`: append at a position other than the archive length
//! - `Serialization`: failed to encode/decode a stored value
//! - `Io`: underlying storage system errors
//! - `Corrupted`: stored data violates a structural invariant

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Append position conflict (gap or overwrite)
    ///
    /// Occurs when a batch appends a message at a position that doesn't match
    /// the next free slot. For example, appending at position 5 when only 3
    /// messages are stored (expected position 3).
    #[error("append position conflict: expected {expected}, got {got}")]
    Conflict {
        /// Expected position (current archive length)
        expected: u64,
        /// Provided position
        got: u64,
    },

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored data is structurally invalid
    #[error("corrupted storage: {0}")]
    Corrupted(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        insta::assert_snapshot!(
            StorageError::Conflict { expected: 3, got: 5 },
            @"append position conflict: expected 3, got 5"
        );
        insta::assert_snapshot!(
            StorageError::Corrupted("id index points past end".into()),
            @"corrupted storage: id index points past end"
        );
    }
}
