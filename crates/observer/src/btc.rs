//! Observer of the Bitcoin chain.
//!
//! Every tick the observer compares the chain tip against its watermark. Once blocks have been
//! buried under enough confirmations they are scanned for bridge deposits, which are paired with
//! their inclusion proof and handed to the relay coordinator as [`CrossChainItem`]s.

use std::{ops::RangeInclusive, sync::Arc};

use bitcoin::Txid;
use btc_relayer_db::tracker::WatermarkDb;
use btc_relayer_primitives::{chain::Chain, checkpoints::CheckpointTable, items::CrossChainItem};
use btc_relayer_rpc::traits::BitcoinRpc;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, trace, warn};

use crate::{config::BtcObserverConfig, errors::ObserverError, persistence::Watermark};

/// Returns the heights that became final when the tip moved from `watermark` to `tip`.
///
/// A block is final once it has `confirmations` blocks on top of it, itself included. The window
/// is computed relative to the previous watermark so that consecutive windows are contiguous and
/// never overlap. Returns `None` if the tip did not move forward or nothing is final yet.
pub fn scan_range(watermark: u32, tip: u32, confirmations: u32) -> Option<RangeInclusive<u32>> {
    if tip <= watermark {
        return None;
    }

    let confirmations = confirmations.max(1);
    let start = watermark.saturating_add(2).saturating_sub(confirmations);
    let end = tip.saturating_add(1).checked_sub(confirmations)?;

    (start <= end).then_some(start..=end)
}

/// Watches the Bitcoin chain for deposits into the bridge.
#[derive(Debug)]
pub struct BtcObserver<R, D> {
    config: BtcObserverConfig,
    rpc: Arc<R>,
    db: Arc<D>,
    watermark: Watermark,
}

impl<R, D> BtcObserver<R, D>
where
    R: BitcoinRpc,
    D: WatermarkDb + Send + Sync,
{
    /// Creates an observer resuming from the persisted watermark, floored at the checkpoint of
    /// the configured network.
    pub async fn new(
        config: BtcObserverConfig,
        rpc: Arc<R>,
        db: Arc<D>,
        checkpoints: &CheckpointTable,
    ) -> Self {
        let persisted = db.get_height(Chain::Bitcoin).await;
        let start = checkpoints.start_height(Chain::Bitcoin, &config.network, persisted);
        if start != persisted {
            info!(network = %config.network, %persisted, checkpoint = %start, "starting from checkpoint");
        }

        let watermark = Watermark::new(Chain::Bitcoin, start, config.waiting_cycle);

        Self {
            config,
            rpc,
            db,
            watermark,
        }
    }

    /// Height up to which the chain has been processed.
    pub fn watermark(&self) -> u32 {
        self.watermark.height()
    }

    /// Polls the chain forever, sending every deposit found to `items`.
    ///
    /// Only returns if the receiving side of `items` is dropped.
    pub async fn run(mut self, items: mpsc::Sender<CrossChainItem>) -> Result<(), ObserverError> {
        info!(watermark = %self.watermark(), confirmations = %self.config.confirmations, "starting bitcoin observer");

        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.poll(&items).await?;
        }
    }

    /// Runs one tick: scans every newly final block and moves the watermark to the tip.
    ///
    /// Returns the number of items sent.
    pub async fn poll(
        &mut self,
        items: &mpsc::Sender<CrossChainItem>,
    ) -> Result<usize, ObserverError> {
        let (tip, tip_hash) = match self.rpc.get_current_height_and_hash().await {
            Ok(tip) => tip,
            Err(err) => {
                warn!(%err, "could not fetch bitcoin tip");
                return Ok(0);
            }
        };

        let watermark = self.watermark();
        if tip <= watermark {
            trace!(%tip, %watermark, "no new bitcoin blocks");
            return Ok(0);
        }

        let mut found = 0;
        if let Some(range) = scan_range(watermark, tip, self.config.confirmations) {
            debug!(%tip, %tip_hash, start = %range.start(), end = %range.end(), "scanning bitcoin blocks");

            for height in range {
                found += self.scan_height(height, items).await?;
            }
        }

        self.watermark.advance(self.db.as_ref(), tip, found).await;
        Ok(found)
    }

    async fn scan_height(
        &self,
        height: u32,
        items: &mpsc::Sender<CrossChainItem>,
    ) -> Result<usize, ObserverError> {
        let (txs, block_hash) = loop {
            match self.rpc.get_transactions_in_block_by_height(height).await {
                Ok(block) => break block,
                Err(err) => {
                    warn!(%height, %err, "could not fetch block, retrying");
                    time::sleep(self.config.backoff).await;
                }
            }
        };
        trace!(%height, %block_hash, txs = %txs.len(), "scanning block");

        let mut found = 0;
        for tx in txs.iter().filter(|tx| self.config.filter.matches(tx)) {
            let txid = tx.compute_txid();
            let Some(proof) = self.inclusion_proof(txid).await else {
                continue;
            };

            info!(%txid, %height, "found deposit");
            items
                .send(CrossChainItem::new(tx, proof, height))
                .await
                .map_err(|_| ObserverError::QueueClosed)?;
            found += 1;
        }

        Ok(found)
    }

    /// Fetches the proof of `txid`, retrying transport failures. `None` if it cannot be proven.
    async fn inclusion_proof(&self, txid: Txid) -> Option<Vec<u8>> {
        loop {
            match self.rpc.get_inclusion_proof(txid).await {
                Ok(proof) => return Some(proof),
                Err(err) if err.is_transport() => {
                    warn!(%txid, %err, "could not fetch inclusion proof, retrying");
                    time::sleep(self.config.backoff).await;
                }
                Err(err) => {
                    error!(%txid, %err, "could not prove deposit, skipping");
                    return None;
                }
            }
        }
    }
}
