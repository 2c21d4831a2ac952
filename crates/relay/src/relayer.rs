//! The three relay loops.

use std::{sync::Arc, time::Duration};

use btc_relayer_db::{errors::DbError, tracker::RetryQueueDb};
use btc_relayer_primitives::items::{abbrev_hex, CrossChainItem, FromAllianceItem};
use btc_relayer_rpc::traits::{AllianceRpc, BitcoinRpc};
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;

/// What became of an item after one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Delivered,
    Requeue,
    Stored,
    Dropped,
}

/// Submits observed items to the opposite chain.
///
/// The relayer is cheap to clone; clones share the clients and the store.
#[derive(Debug)]
pub struct Relayer<B, A, D> {
    config: Arc<RelayConfig>,
    btc: Arc<B>,
    alliance: Arc<A>,
    db: Arc<D>,
}

impl<B, A, D> Clone for Relayer<B, A, D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            btc: self.btc.clone(),
            alliance: self.alliance.clone(),
            db: self.db.clone(),
        }
    }
}

impl<B, A, D> Relayer<B, A, D>
where
    B: BitcoinRpc,
    A: AllianceRpc,
    D: RetryQueueDb + Send + Sync,
{
    /// Creates a relayer over the given clients and retry store.
    pub fn new(config: RelayConfig, btc: Arc<B>, alliance: Arc<A>, db: Arc<D>) -> Self {
        Self {
            config: Arc::new(config),
            btc,
            alliance,
            db,
        }
    }

    /// Imports every deposit received on `items` into the alliance chain.
    ///
    /// Deposits that hit a transport failure are put back on the queue through `requeue` after
    /// the resend delay, without limit. Returns once `items` is closed.
    pub async fn relay(
        &self,
        mut items: mpsc::Receiver<CrossChainItem>,
        requeue: mpsc::Sender<CrossChainItem>,
    ) {
        info!("starting relay");

        while let Some(item) = items.recv().await {
            if self.relay_item(&item).await == Disposition::Requeue {
                resend(&requeue, item, self.config.resend_delay);
            }
        }

        warn!("deposit queue closed, relay stopped");
    }

    /// Broadcasts every transaction received on `items` on Bitcoin.
    ///
    /// Transactions the node asks to retry later are parked in the retry store; transport
    /// failures go back on the queue through `requeue`. Returns once `items` is closed.
    pub async fn broadcast(
        &self,
        mut items: mpsc::Receiver<FromAllianceItem>,
        requeue: mpsc::Sender<FromAllianceItem>,
    ) {
        info!("starting broadcast");

        while let Some(item) = items.recv().await {
            if self.broadcast_item(&item).await == Disposition::Requeue {
                resend(&requeue, item, self.config.resend_delay);
            }
        }

        warn!("broadcast queue closed, broadcast stopped");
    }

    /// Drains the retry store every retry period, forever.
    pub async fn rebroadcast(&self) {
        let period = self.config.retry_period;
        info!(?period, "starting rebroadcast");

        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.drain_retry_store().await;
        }
    }

    async fn relay_item(&self, item: &CrossChainItem) -> Disposition {
        let CrossChainItem {
            raw_tx,
            inclusion_proof,
            height,
            txid,
        } = item;

        let result = self
            .alliance
            .submit_cross_chain_deposit(
                self.config.chain_id,
                *txid,
                raw_tx,
                *height,
                inclusion_proof,
                &self.config.submitter,
            )
            .await;

        match result {
            Ok(alliance_tx) => {
                info!(%txid, %height, %alliance_tx, "relayed deposit");
                Disposition::Delivered
            }
            Err(err) if err.is_transport() => {
                warn!(%txid, %err, "could not reach alliance node, requeueing deposit");
                Disposition::Requeue
            }
            Err(err) => {
                error!(%txid, %height, %err, "could not relay deposit, dropping");
                Disposition::Dropped
            }
        }
    }

    async fn broadcast_item(&self, item: &FromAllianceItem) -> Disposition {
        let tx = item.abbrev();

        match self.btc.broadcast_raw_tx(&item.raw_tx_hex).await {
            Ok(txid) => {
                info!(%txid, "broadcast transaction");
                Disposition::Delivered
            }
            Err(err) if err.needs_retry() => {
                match self.db.put(&item.raw_tx_hex).await {
                    Ok(()) => info!(%tx, %err, "broadcast rejected for now, stored for retry"),
                    Err(db_err) => error!(%tx, %err, %db_err, "could not store transaction for retry"),
                }
                Disposition::Stored
            }
            Err(err) if err.is_transport() => {
                warn!(%tx, %err, "could not reach bitcoin node, requeueing transaction");
                Disposition::Requeue
            }
            Err(err) => {
                error!(%tx, %err, "could not broadcast transaction, dropping");
                Disposition::Dropped
            }
        }
    }

    /// Runs one pass over the retry store and returns the number of records resolved.
    pub async fn drain_retry_store(&self) -> usize {
        let pending = match self.db.get_all().await {
            Ok(pending) => pending,
            Err(DbError::NoRecords) => {
                debug!("nothing to rebroadcast");
                return 0;
            }
            Err(err @ DbError::OverReadSize { .. }) => {
                warn!(%err, "retry backlog too large, skipping cycle");
                return 0;
            }
            Err(err) => {
                error!(%err, "could not read retry store");
                return 0;
            }
        };
        info!(count = %pending.len(), "rebroadcasting stored transactions");

        let mut resolved = 0;
        for tx_hex in &pending {
            if self.rebroadcast_one(tx_hex).await {
                resolved += 1;
            }
        }

        match self.db.pending().await {
            Ok(backlog) => info!(%resolved, %backlog, "rebroadcast cycle done"),
            Err(err) => warn!(%resolved, %err, "could not measure retry backlog"),
        }

        resolved
    }

    /// Resubmits one stored transaction. Returns whether its record was resolved.
    async fn rebroadcast_one(&self, tx_hex: &str) -> bool {
        let tx = abbrev_hex(tx_hex);

        loop {
            match self.btc.broadcast_raw_tx(tx_hex).await {
                Ok(txid) => {
                    info!(%txid, "rebroadcast transaction");
                    break;
                }
                Err(err) if err.is_transport() => {
                    warn!(%tx, %err, "could not reach bitcoin node, retrying");
                    time::sleep(self.config.backoff).await;
                }
                Err(err) if err.needs_retry() => {
                    debug!(%tx, %err, "still rejected, keeping for next cycle");
                    return false;
                }
                Err(err) => {
                    warn!(%tx, %err, "rebroadcast rejected for good, forgetting");
                    break;
                }
            }
        }

        if let Err(err) = self.db.delete(tx_hex).await {
            error!(%tx, %err, "could not remove transaction from retry store");
        }
        true
    }
}

/// Puts `item` back on `queue` after `delay` without blocking the caller.
///
/// The caller usually consumes `queue` itself, so waiting for capacity inline could deadlock.
fn resend<T: Send + 'static>(queue: &mpsc::Sender<T>, item: T, delay: Duration) {
    let queue = queue.clone();

    tokio::spawn(async move {
        time::sleep(delay).await;
        if queue.send(item).await.is_err() {
            warn!("queue closed before resend");
        }
    });
}
