//! Scripted chain clients for the relay tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use bitcoin::{hashes::Hash, BlockHash, ScriptBuf, Transaction, Txid};
use btc_relayer_rpc::{
    error::{ClientError, ClientResult},
    traits::{AllianceRpc, BitcoinRpc},
    types::ContractEvent,
};

fn unsupported<T>() -> ClientResult<T> {
    Err(ClientError::Permanent {
        code: 0,
        message: "not served by this mock".to_string(),
    })
}

/// Bitcoin node whose broadcast results are scripted per payload. Unscripted broadcasts succeed.
#[derive(Debug, Default)]
pub(crate) struct MockBitcoin {
    results: Mutex<HashMap<String, VecDeque<ClientResult<Txid>>>>,
    calls: Mutex<Vec<String>>,
}

impl MockBitcoin {
    pub(crate) fn script(
        &self,
        tx_hex: &str,
        results: impl IntoIterator<Item = ClientResult<Txid>>,
    ) {
        self.results
            .lock()
            .unwrap()
            .entry(tx_hex.to_string())
            .or_default()
            .extend(results);
    }

    /// Payloads of every broadcast attempt, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BitcoinRpc for MockBitcoin {
    async fn get_current_height_and_hash(&self) -> ClientResult<(u32, BlockHash)> {
        unsupported()
    }

    async fn get_transactions_in_block_by_height(
        &self,
        _height: u32,
    ) -> ClientResult<(Vec<Transaction>, BlockHash)> {
        unsupported()
    }

    async fn get_inclusion_proof(&self, _txid: Txid) -> ClientResult<Vec<u8>> {
        unsupported()
    }

    async fn get_previous_output_script(
        &self,
        _txid: Txid,
        _index: u32,
    ) -> ClientResult<ScriptBuf> {
        unsupported()
    }

    async fn broadcast_raw_tx(&self, tx_hex: &str) -> ClientResult<Txid> {
        self.calls.lock().unwrap().push(tx_hex.to_string());

        self.results
            .lock()
            .unwrap()
            .get_mut(tx_hex)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Txid::all_zeros()))
    }
}

/// Arguments of one deposit import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubmitCall {
    pub(crate) chain_id: u64,
    pub(crate) txid: Txid,
    pub(crate) height: u32,
    pub(crate) submitter: String,
}

/// Alliance node answering deposit imports from a script. Once exhausted, imports succeed.
#[derive(Debug, Default)]
pub(crate) struct MockAlliance {
    results: Mutex<VecDeque<ClientResult<String>>>,
    calls: Mutex<Vec<SubmitCall>>,
}

impl MockAlliance {
    pub(crate) fn script(&self, results: impl IntoIterator<Item = ClientResult<String>>) {
        self.results.lock().unwrap().extend(results);
    }

    pub(crate) fn calls(&self) -> Vec<SubmitCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AllianceRpc for MockAlliance {
    async fn get_current_block_height(&self) -> ClientResult<u32> {
        unsupported()
    }

    async fn get_contract_events(&self, _height: u32) -> ClientResult<Vec<ContractEvent>> {
        unsupported()
    }

    async fn submit_cross_chain_deposit(
        &self,
        chain_id: u64,
        txid: Txid,
        _raw_tx: &[u8],
        height: u32,
        _proof: &[u8],
        submitter: &str,
    ) -> ClientResult<String> {
        self.calls.lock().unwrap().push(SubmitCall {
            chain_id,
            txid,
            height,
            submitter: submitter.to_string(),
        });

        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("{:064x}", height)))
    }
}
