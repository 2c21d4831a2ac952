//! Scripted chain clients for the observer tests.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use bitcoin::{
    absolute::LockTime, hashes::Hash, transaction::Version, Amount, BlockHash, ScriptBuf,
    Transaction, TxIn, TxOut, Txid,
};
use btc_relayer_primitives::constants::OP_RETURN_SCRIPT_FLAG;
use btc_relayer_rpc::{
    error::{ClientError, ClientResult},
    traits::{AllianceRpc, BitcoinRpc},
    types::{ContractEvent, Notification},
};
use serde_json::json;

pub(crate) fn redeem_script() -> ScriptBuf {
    // OP_1 <pk> OP_1 OP_CHECKMULTISIG with a dummy key
    let mut bytes = vec![0x51, 0x21, 0x02];
    bytes.extend([0x11; 32]);
    bytes.extend([0x51, 0xae]);
    ScriptBuf::from_bytes(bytes)
}

pub(crate) fn op_return(flag: u8) -> ScriptBuf {
    ScriptBuf::from_bytes(vec![0x6a, 0x03, flag, 0x01, 0x02])
}

fn tx_with_outputs(nonce: u32, output: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::from_consensus(nonce),
        input: vec![TxIn::default()],
        output,
    }
}

pub(crate) fn plain_tx(nonce: u32) -> Transaction {
    tx_with_outputs(
        nonce,
        vec![TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
        }],
    )
}

pub(crate) fn deposit_tx(lock: ScriptBuf, sats: u64, nonce: u32) -> Transaction {
    tx_with_outputs(
        nonce,
        vec![
            TxOut {
                value: Amount::from_sat(sats),
                script_pubkey: lock,
            },
            TxOut {
                value: Amount::ZERO,
                script_pubkey: op_return(OP_RETURN_SCRIPT_FLAG),
            },
        ],
    )
}

#[derive(Debug, Default)]
struct BitcoinState {
    tip: u32,
    blocks: HashMap<u32, Vec<Transaction>>,
    fetched: Vec<u32>,
    block_failures: HashMap<u32, usize>,
    proof_failures: HashMap<Txid, VecDeque<ClientError>>,
}

/// In-memory Bitcoin node. Blocks that were never added are empty.
#[derive(Debug, Default)]
pub(crate) struct MockBitcoin {
    state: Mutex<BitcoinState>,
}

impl MockBitcoin {
    pub(crate) fn with_tip(tip: u32) -> Self {
        let mock = Self::default();
        mock.set_tip(tip);
        mock
    }

    pub(crate) fn set_tip(&self, tip: u32) {
        self.state.lock().unwrap().tip = tip;
    }

    pub(crate) fn add_tx(&self, height: u32, tx: Transaction) {
        self.state
            .lock()
            .unwrap()
            .blocks
            .entry(height)
            .or_default()
            .push(tx);
    }

    /// Makes the next `times` fetches of the block at `height` fail at the transport level.
    pub(crate) fn fail_block(&self, height: u32, times: usize) {
        self.state
            .lock()
            .unwrap()
            .block_failures
            .insert(height, times);
    }

    /// Queues errors returned by the next proof requests for `txid`.
    pub(crate) fn fail_proof(&self, txid: Txid, errors: impl IntoIterator<Item = ClientError>) {
        self.state
            .lock()
            .unwrap()
            .proof_failures
            .entry(txid)
            .or_default()
            .extend(errors);
    }

    /// Heights of every block fetch, failed ones included.
    pub(crate) fn fetched(&self) -> Vec<u32> {
        self.state.lock().unwrap().fetched.clone()
    }

    pub(crate) fn clear_fetched(&self) {
        self.state.lock().unwrap().fetched.clear();
    }
}

#[async_trait]
impl BitcoinRpc for MockBitcoin {
    async fn get_current_height_and_hash(&self) -> ClientResult<(u32, BlockHash)> {
        Ok((self.state.lock().unwrap().tip, BlockHash::all_zeros()))
    }

    async fn get_transactions_in_block_by_height(
        &self,
        height: u32,
    ) -> ClientResult<(Vec<Transaction>, BlockHash)> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(height);

        if let Some(left) = state.block_failures.get_mut(&height) {
            if *left > 0 {
                *left -= 1;
                return Err(ClientError::Transport("connection reset".to_string()));
            }
        }

        let txs = state.blocks.get(&height).cloned().unwrap_or_default();
        Ok((txs, BlockHash::all_zeros()))
    }

    async fn get_inclusion_proof(&self, txid: Txid) -> ClientResult<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state
            .proof_failures
            .get_mut(&txid)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        Ok(txid.to_byte_array().to_vec())
    }

    async fn get_previous_output_script(
        &self,
        _txid: Txid,
        _index: u32,
    ) -> ClientResult<ScriptBuf> {
        Ok(redeem_script())
    }

    async fn broadcast_raw_tx(&self, _tx_hex: &str) -> ClientResult<Txid> {
        Ok(Txid::all_zeros())
    }
}

#[derive(Debug, Default)]
struct AllianceState {
    tip: u32,
    events: BTreeMap<u32, Vec<ContractEvent>>,
    fetched: Vec<u32>,
    failures: HashMap<u32, usize>,
}

/// In-memory alliance node.
#[derive(Debug, Default)]
pub(crate) struct MockAlliance {
    state: Mutex<AllianceState>,
}

impl MockAlliance {
    pub(crate) fn with_tip(tip: u32) -> Self {
        let mock = Self::default();
        mock.set_tip(tip);
        mock
    }

    pub(crate) fn set_tip(&self, tip: u32) {
        self.state.lock().unwrap().tip = tip;
    }

    /// Adds a transaction at `height` emitting one notification per state tuple.
    pub(crate) fn add_event(&self, height: u32, states: Vec<serde_json::Value>) {
        let notify = states
            .into_iter()
            .map(|states| Notification {
                contract_address: "0000000000000000000000000000000000000009".to_string(),
                states,
            })
            .collect();

        self.state
            .lock()
            .unwrap()
            .events
            .entry(height)
            .or_default()
            .push(ContractEvent {
                tx_hash: format!("{height:064x}"),
                notify,
            });
    }

    pub(crate) fn fail_height(&self, height: u32, times: usize) {
        self.state.lock().unwrap().failures.insert(height, times);
    }

    pub(crate) fn fetched(&self) -> Vec<u32> {
        self.state.lock().unwrap().fetched.clone()
    }
}

/// A notification of the watched kind carrying `payload`.
pub(crate) fn relay_notification(key: &str, payload: &str) -> serde_json::Value {
    json!([key, payload])
}

#[async_trait]
impl AllianceRpc for MockAlliance {
    async fn get_current_block_height(&self) -> ClientResult<u32> {
        Ok(self.state.lock().unwrap().tip)
    }

    async fn get_contract_events(&self, height: u32) -> ClientResult<Vec<ContractEvent>> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(height);

        if let Some(left) = state.failures.get_mut(&height) {
            if *left > 0 {
                *left -= 1;
                return Err(ClientError::Transport("request timed out".to_string()));
            }
        }

        Ok(state.events.get(&height).cloned().unwrap_or_default())
    }

    async fn submit_cross_chain_deposit(
        &self,
        _chain_id: u64,
        _txid: Txid,
        _raw_tx: &[u8],
        _height: u32,
        _proof: &[u8],
        _submitter: &str,
    ) -> ClientResult<String> {
        Ok(String::new())
    }
}
