//! Watermark bookkeeping shared by both observers.

use btc_relayer_db::tracker::WatermarkDb;
use btc_relayer_primitives::chain::Chain;
use tracing::{debug, error};

/// In-memory watermark of an observer together with its flush policy.
///
/// The watermark is flushed to the store whenever a batch produced items, or once it has moved
/// `waiting_cycle` heights past the last flushed value. A crash therefore re-scans at most
/// `waiting_cycle` heights that produced nothing.
#[derive(Debug, Clone)]
pub(crate) struct Watermark {
    chain: Chain,
    height: u32,
    last_persisted: u32,
    waiting_cycle: u32,
}

impl Watermark {
    pub(crate) fn new(chain: Chain, height: u32, waiting_cycle: u32) -> Self {
        Self {
            chain,
            height,
            last_persisted: height,
            waiting_cycle,
        }
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    /// Moves the watermark to `tip` once all heights up to it have been scanned.
    pub(crate) async fn advance<D>(&mut self, db: &D, tip: u32, found: usize)
    where
        D: WatermarkDb + ?Sized,
    {
        if tip <= self.height {
            return;
        }
        self.height = tip;

        if found == 0 && tip.saturating_sub(self.last_persisted) < self.waiting_cycle {
            return;
        }

        match db.set_height(self.chain, tip).await {
            Ok(()) => {
                debug!(chain = %self.chain, height = %tip, "watermark persisted");
                self.last_persisted = tip;
            }
            Err(err) => {
                // the next successful write catches up
                error!(chain = %self.chain, height = %tip, %err, "failed to persist watermark");
            }
        }
    }
}
