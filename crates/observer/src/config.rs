//! Runtime configuration of the observers.

use std::time::Duration;

use crate::filter::DepositFilter;

/// Configuration of the Bitcoin observer.
#[derive(Debug, Clone)]
pub struct BtcObserverConfig {
    /// Network name, used to look up the starting checkpoint.
    pub network: String,

    /// Time between two polls of the chain tip.
    pub poll_interval: Duration,

    /// Number of blocks (including its own) a block needs before it is scanned.
    ///
    /// A value of 1 scans the tip itself.
    pub confirmations: u32,

    /// Distance in heights after which the watermark is persisted even without activity.
    pub waiting_cycle: u32,

    /// Pause before a failed fetch is retried.
    pub backoff: Duration,

    /// Predicate selecting the bridge deposits.
    pub filter: DepositFilter,
}

/// Configuration of the alliance observer.
#[derive(Debug, Clone)]
pub struct AllianceObserverConfig {
    /// Network name, used to look up the starting checkpoint.
    pub network: String,

    /// Time between two polls of the chain tip.
    pub poll_interval: Duration,

    /// First state field of the notifications carrying a transaction to broadcast.
    pub watched_key: String,

    /// Distance in heights after which the watermark is persisted even without activity.
    pub waiting_cycle: u32,

    /// Pause before a failed fetch is retried.
    pub backoff: Duration,
}
