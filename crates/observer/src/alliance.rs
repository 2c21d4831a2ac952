//! Observer of the alliance chain.
//!
//! The alliance chain is final on inclusion, so every block above the watermark is scanned as
//! soon as it appears. Notifications tagged with the watched key carry a fully signed Bitcoin
//! transaction that is forwarded verbatim as a [`FromAllianceItem`].

use std::sync::Arc;

use btc_relayer_db::tracker::WatermarkDb;
use btc_relayer_primitives::{
    chain::Chain, checkpoints::CheckpointTable, items::FromAllianceItem,
};
use btc_relayer_rpc::{traits::AllianceRpc, types::ContractEvent};
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, trace, warn};

use crate::{config::AllianceObserverConfig, errors::ObserverError, persistence::Watermark};

/// Payloads of the notifications in `events` whose first state field is `key`.
///
/// Notifications with a matching key but no string payload are logged and skipped.
pub fn watched_payloads<'a>(
    events: &'a [ContractEvent],
    key: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    events
        .iter()
        .flat_map(|event| event.notify.iter().map(move |n| (event, n)))
        .filter(move |(_, notification)| notification.state_str(0) == Some(key))
        .filter_map(|(event, notification)| {
            let payload = notification.state_str(1);
            if payload.is_none() {
                warn!(tx_hash = %event.tx_hash, "watched notification without payload");
            }
            payload
        })
}

/// Watches the alliance chain for transactions to broadcast on Bitcoin.
#[derive(Debug)]
pub struct AllianceObserver<R, D> {
    config: AllianceObserverConfig,
    rpc: Arc<R>,
    db: Arc<D>,
    watermark: Watermark,
}

impl<R, D> AllianceObserver<R, D>
where
    R: AllianceRpc,
    D: WatermarkDb + Send + Sync,
{
    /// Creates an observer resuming from the persisted watermark, floored at the checkpoint of
    /// the configured network.
    pub async fn new(
        config: AllianceObserverConfig,
        rpc: Arc<R>,
        db: Arc<D>,
        checkpoints: &CheckpointTable,
    ) -> Self {
        let persisted = db.get_height(Chain::Alliance).await;
        let start = checkpoints.start_height(Chain::Alliance, &config.network, persisted);
        let watermark = Watermark::new(Chain::Alliance, start, config.waiting_cycle);

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

    /// Polls the chain forever, sending every watched payload to `items`.
    ///
    /// Only returns if the receiving side of `items` is dropped.
    pub async fn run(
        mut self,
        items: mpsc::Sender<FromAllianceItem>,
    ) -> Result<(), ObserverError> {
        info!(watermark = %self.watermark(), key = %self.config.watched_key, "starting alliance observer");

        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.poll(&items).await?;
        }
    }

    /// Runs one tick: scans every block above the watermark and moves it to the tip.
    ///
    /// Returns the number of items sent.
    pub async fn poll(
        &mut self,
        items: &mpsc::Sender<FromAllianceItem>,
    ) -> Result<usize, ObserverError> {
        let tip = match self.rpc.get_current_block_height().await {
            Ok(tip) => tip,
            Err(err) => {
                warn!(%err, "could not fetch alliance tip");
                return Ok(0);
            }
        };

        let watermark = self.watermark();
        if tip <= watermark {
            trace!(%tip, %watermark, "no new alliance blocks");
            return Ok(0);
        }
        debug!(start = %(watermark + 1), end = %tip, "scanning alliance blocks");

        let mut found = 0;
        for height in watermark + 1..=tip {
            let events = self.events_at(height).await;

            for payload in watched_payloads(&events, &self.config.watched_key) {
                let item = FromAllianceItem::new(payload);
                info!(%height, tx = %item.abbrev(), "found transaction to broadcast");

                items
                    .send(item)
                    .await
                    .map_err(|_| ObserverError::QueueClosed)?;
                found += 1;
            }
        }

        self.watermark.advance(self.db.as_ref(), tip, found).await;
        Ok(found)
    }

    async fn events_at(&self, height: u32) -> Vec<ContractEvent> {
        loop {
            match self.rpc.get_contract_events(height).await {
                Ok(events) => return events,
                Err(err) => {
                    warn!(%height, %err, "could not fetch contract events, retrying");
                    time::sleep(self.config.backoff).await;
                }
            }
        }
    }
}
