//! Interfaces of the chain clients consumed by the observers and the relay coordinator.

use async_trait::async_trait;
use bitcoin::{BlockHash, ScriptBuf, Transaction, Txid};

use crate::{error::ClientResult, types::ContractEvent};

/// Calls made against the Bitcoin node.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// Returns the height and hash of the active chain tip.
    async fn get_current_height_and_hash(&self) -> ClientResult<(u32, BlockHash)>;

    /// Returns the transactions of the block at `height` along with its hash.
    async fn get_transactions_in_block_by_height(
        &self,
        height: u32,
    ) -> ClientResult<(Vec<Transaction>, BlockHash)>;

    /// Returns the serialized merkle proof of `txid`'s inclusion in its block.
    async fn get_inclusion_proof(&self, txid: Txid) -> ClientResult<Vec<u8>>;

    /// Returns the locking script of output `index` of `txid`.
    async fn get_previous_output_script(&self, txid: Txid, index: u32) -> ClientResult<ScriptBuf>;

    /// Submits a hex-encoded raw transaction to the network.
    async fn broadcast_raw_tx(&self, tx_hex: &str) -> ClientResult<Txid>;
}

/// Calls made against the alliance chain.
#[async_trait]
pub trait AllianceRpc: Send + Sync {
    /// Returns the height of the latest block.
    async fn get_current_block_height(&self) -> ClientResult<u32>;

    /// Returns the contract events emitted by the block at `height`.
    async fn get_contract_events(&self, height: u32) -> ClientResult<Vec<ContractEvent>>;

    /// Imports a Bitcoin deposit into the alliance chain and returns the alliance tx hash.
    async fn submit_cross_chain_deposit(
        &self,
        chain_id: u64,
        txid: Txid,
        raw_tx: &[u8],
        height: u32,
        proof: &[u8],
        submitter: &str,
    ) -> ClientResult<String>;
}
