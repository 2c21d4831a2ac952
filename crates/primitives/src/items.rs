//! Canonical items produced by the observers and consumed by the relay coordinator.

use bitcoin::{consensus, Transaction, Txid};
use serde::{Deserialize, Serialize};

/// A Bitcoin deposit that must be imported into the alliance chain.
///
/// Items are immutable once constructed. A failed submission re-queues a clone of the item; items
/// are never persisted since a restart re-discovers the same deposit from chain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainItem {
    /// Consensus-encoded deposit transaction.
    pub raw_tx: Vec<u8>,

    /// Merkle proof that the transaction is included in the block at `height`.
    pub inclusion_proof: Vec<u8>,

    /// Height of the block containing the transaction.
    pub height: u32,

    /// Id of the deposit transaction.
    pub txid: Txid,
}

impl CrossChainItem {
    /// Builds an item out of a matched transaction and its inclusion proof.
    pub fn new(tx: &Transaction, inclusion_proof: Vec<u8>, height: u32) -> Self {
        Self {
            raw_tx: consensus::serialize(tx),
            inclusion_proof,
            height,
            txid: tx.compute_txid(),
        }
    }
}

/// A fully signed Bitcoin transaction emitted by the alliance chain that must be broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromAllianceItem {
    /// Hex-encoded raw transaction, exactly as it appeared in the notification.
    pub raw_tx_hex: String,
}

impl FromAllianceItem {
    /// Creates a new item.
    pub fn new(raw_tx_hex: impl Into<String>) -> Self {
        Self {
            raw_tx_hex: raw_tx_hex.into(),
        }
    }

    /// Short `prefix...suffix` form of the payload for log lines.
    pub fn abbrev(&self) -> String {
        abbrev_hex(&self.raw_tx_hex)
    }
}

/// Shortens long hex payloads to their first and last six characters.
pub fn abbrev_hex(s: &str) -> String {
    const KEEP: usize = 6;

    if s.len() <= 2 * KEEP || !s.is_ascii() {
        return s.to_string();
    }
    format!("{}...{}", &s[..KEEP], &s[s.len() - KEEP..])
}
