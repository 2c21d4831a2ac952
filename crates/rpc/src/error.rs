//! Classification of remote call failures.

use thiserror::Error;

/// Errors returned by the chain clients.
///
/// The variants form a closed taxonomy that callers switch on:
///
/// - [`ClientError::Transport`] is always retried with a fixed backoff.
/// - [`ClientError::NeedsRetry`] is recoverable by the remote node later and gets a durable retry.
/// - everything else is permanent for the item at hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The node could not be reached, the call timed out or the node is not ready yet.
    #[error("transport: {0}")]
    Transport(String),

    /// The node rejected the call for a reason that may go away, e.g. a transaction whose inputs
    /// are not yet known to it.
    #[error("needs retry (code {code}): {message}")]
    NeedsRetry {
        /// RPC error code.
        code: i64,

        /// Message reported by the node.
        message: String,
    },

    /// The node rejected the call for good.
    #[error("rpc error (code {code}): {message}")]
    Permanent {
        /// RPC error code.
        code: i64,

        /// Message reported by the node.
        message: String,
    },

    /// The node answered with something that could not be understood.
    #[error("decode: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether the failure happened at the transport level.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the remote side asked for the call to be retried later.
    pub const fn needs_retry(&self) -> bool {
        matches!(self, Self::NeedsRetry { .. })
    }
}

/// Result type of every client call.
pub type ClientResult<T> = Result<T, ClientError>;
