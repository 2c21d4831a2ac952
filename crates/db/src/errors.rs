//! Errors returned by the retry store.

use thiserror::Error;

/// Errors that can occur when interacting with the retry store.
#[derive(Debug, Error)]
pub enum DbError {
    /// The underlying storage failed (I/O, corruption detected by sled, ...).
    #[error("storage: {0}")]
    Storage(#[from] sled::Error),

    /// A retry payload is not valid hex.
    #[error("decode: {0}")]
    Decode(#[from] hex::FromHexError),

    /// A scan of the retry records read more bytes than allowed.
    ///
    /// Nothing is modified when this is returned; the whole scan should be retried later.
    #[error("read {read} bytes from db, but oversize {max}")]
    OverReadSize {
        /// Number of key bytes read when the scan was aborted.
        read: u64,

        /// Configured maximum.
        max: u64,
    },

    /// There are no pending retry records.
    #[error("no tx in db")]
    NoRecords,

    /// A blocking store operation panicked or was cancelled.
    #[error("task: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The store was opened with an unusable configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type of all store operations.
pub type DbResult<T> = Result<T, DbError>;
