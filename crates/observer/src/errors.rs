//! Errors that stop an observer.

use thiserror::Error;

/// The only condition under which an observer gives up.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// The consumer of the outbound queue is gone.
    #[error("outbound queue closed")]
    QueueClosed,
}
