//! Identifies the two ledgers bridged by the relayer.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One of the two chains the relayer watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// The Bitcoin-style UTXO chain deposits originate from.
    Bitcoin,

    /// The alliance chain that deposits are relayed to.
    Alliance,
}

impl Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Bitcoin => write!(f, "bitcoin"),
            Chain::Alliance => write!(f, "alliance"),
        }
    }
}
