//! Runtime configuration of the relay coordinator.

use std::time::Duration;

/// Parameters of the three relay loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Id of the Bitcoin chain as registered in the alliance cross-chain manager.
    pub chain_id: u64,

    /// Alliance account on whose behalf deposits are imported.
    pub submitter: String,

    /// Delay before an item whose submission hit a transport failure is put back on its queue.
    pub resend_delay: Duration,

    /// Pause before a transport failure while draining the retry store is retried.
    pub backoff: Duration,

    /// Period of the retry store drain.
    pub retry_period: Duration,
}
