//! Per-network starting heights.
//!
//! A checkpoint is only ever used as a lower bound: an observer starts scanning from the greater
//! of its persisted watermark and the checkpoint of the network it is connected to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chain::Chain;

/// Immutable table of starting heights, keyed by chain and network name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointTable {
    btc: BTreeMap<String, u32>,
    alliance: BTreeMap<String, u32>,
}

impl Default for CheckpointTable {
    fn default() -> Self {
        let btc = [("regtest", 5), ("mainnet", 602_805), ("testnet3", 1_607_304)]
            .into_iter()
            .map(|(name, height)| (name.to_string(), height))
            .collect();

        let alliance = [("testnet", 1), ("regtest", 1)]
            .into_iter()
            .map(|(name, height)| (name.to_string(), height))
            .collect();

        Self { btc, alliance }
    }
}

impl CheckpointTable {
    /// Returns the checkpoint height of `network` on `chain`, or 0 if the network is unknown.
    pub fn height(&self, chain: Chain, network: &str) -> u32 {
        self.table(chain).get(network).copied().unwrap_or_default()
    }

    /// Returns a new table where the given heights replace (or extend) the ones for `chain`.
    pub fn with_overrides(mut self, chain: Chain, overrides: &BTreeMap<String, u32>) -> Self {
        let table = match chain {
            Chain::Bitcoin => &mut self.btc,
            Chain::Alliance => &mut self.alliance,
        };
        table.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        self
    }

    /// Returns the floor an observer must start from given what was persisted.
    pub fn start_height(&self, chain: Chain, network: &str, persisted: u32) -> u32 {
        persisted.max(self.height(chain, network))
    }

    fn table(&self, chain: Chain) -> &BTreeMap<String, u32> {
        match chain {
            Chain::Bitcoin => &self.btc,
            Chain::Alliance => &self.alliance,
        }
    }
}
