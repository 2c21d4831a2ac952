//! Interfaces through which the observers and the relay coordinator reach the store.

use async_trait::async_trait;
use btc_relayer_primitives::chain::Chain;

use crate::errors::DbResult;

/// Persistence of the last height each observer has fully processed.
#[async_trait]
pub trait WatermarkDb {
    /// Returns the persisted watermark of `chain`, or 0 if none was ever written.
    ///
    /// Read failures are logged and reported as 0 so that the checkpoint floor applies.
    async fn get_height(&self, chain: Chain) -> u32;

    /// Durably records `height` as the watermark of `chain`.
    async fn set_height(&self, chain: Chain, height: u32) -> DbResult<()>;
}

/// Durable queue of raw transactions whose broadcast must be retried a bounded number of times.
#[async_trait]
pub trait RetryQueueDb {
    /// Inserts `tx_hex`, or resets its remaining attempts if it is already pending.
    async fn put(&self, tx_hex: &str) -> DbResult<()>;

    /// Returns every pending transaction, consuming one attempt from each of them.
    async fn get_all(&self) -> DbResult<Vec<String>>;

    /// Removes `tx_hex`. Removing an absent record is not an error.
    async fn delete(&self, tx_hex: &str) -> DbResult<()>;

    /// Number of pending records.
    async fn pending(&self) -> DbResult<usize>;
}
