//! JSON-RPC client of a Bitcoin Core node.

use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bitcoin::{consensus, Block, BlockHash, ScriptBuf, Transaction, Txid};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::trace;

use crate::{
    error::{ClientError, ClientResult},
    traits::BitcoinRpc,
    types::{ChainTip, VerboseTx},
};

/// `RPC_VERIFY_ERROR`: general error during transaction or block submission.
pub const RPC_VERIFY_ERROR: i64 = -25;

/// `RPC_VERIFY_REJECTED`: transaction or block was rejected by network rules.
pub const RPC_VERIFY_REJECTED: i64 = -26;

/// `RPC_IN_WARMUP`: the node is still loading its state.
pub const RPC_IN_WARMUP: i64 = -28;

const SEND_RAW_TRANSACTION: &str = "sendrawtransaction";

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Client of the Bitcoin Core JSON-RPC interface.
#[derive(Clone)]
pub struct BitcoinClient {
    url: String,
    user: String,
    pass: String,
    http: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for BitcoinClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitcoinClient")
            .field("url", &self.url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl BitcoinClient {
    /// Creates a client authenticating with `user`/`pass`; every call is bounded by `timeout`.
    pub fn new(url: &str, user: &str, pass: &str, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
            http,
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> ClientResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(%method, %id, "calling bitcoind");

        let response = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Permanent {
                code: i64::from(status.as_u16()),
                message: format!("{method}: bitcoind refused the credentials"),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(format!("{method}: {e}")))?;

        parse_response(method, status, &body)
    }
}

/// Decodes a response body.
///
/// bitcoind reports RPC errors with a non-2xx status and a regular JSON body. A non-2xx status
/// without an error object (an overloaded work queue, a proxy in front of the node) is a transport
/// failure.
fn parse_response<T: DeserializeOwned>(
    method: &str,
    status: StatusCode,
    body: &[u8],
) -> ClientResult<T> {
    let unavailable = || {
        let body = String::from_utf8_lossy(body);
        ClientError::Transport(format!("{method}: {status}: {}", body.trim()))
    };

    let response: RpcResponse<T> = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(_) if !status.is_success() => return Err(unavailable()),
        Err(e) => return Err(ClientError::Decode(format!("{method}: {e}"))),
    };

    match (response.result, response.error) {
        (_, Some(err)) => Err(classify(method, err)),
        (Some(result), None) => Ok(result),
        (None, None) if !status.is_success() => Err(unavailable()),
        (None, None) => Err(ClientError::Decode(format!("{method}: empty response"))),
    }
}

/// Maps a bitcoind error object onto the relayer's error taxonomy.
fn classify(method: &str, err: RpcErrorObject) -> ClientError {
    let RpcErrorObject { code, message } = err;

    match code {
        RPC_IN_WARMUP => ClientError::Transport(format!("{method}: {message}")),
        RPC_VERIFY_ERROR | RPC_VERIFY_REJECTED if method == SEND_RAW_TRANSACTION => {
            ClientError::NeedsRetry { code, message }
        }
        _ => ClientError::Permanent { code, message },
    }
}

/// Picks the active tip out of `getchaintips`.
fn active_tip(tips: Vec<ChainTip>) -> ClientResult<(u32, BlockHash)> {
    let tip = tips
        .iter()
        .find(|tip| tip.status == "active")
        .or_else(|| tips.first())
        .ok_or_else(|| ClientError::Decode("getchaintips: no tips".to_string()))?;

    let hash = BlockHash::from_str(&tip.hash)
        .map_err(|e| ClientError::Decode(format!("getchaintips: {e}")))?;

    Ok((tip.height, hash))
}

fn decode_hex(method: &str, s: &str) -> ClientResult<Vec<u8>> {
    hex::decode(s).map_err(|e| ClientError::Decode(format!("{method}: {e}")))
}

fn output_script(tx: VerboseTx, index: u32) -> ClientResult<ScriptBuf> {
    let output = tx.vout.get(index as usize).ok_or_else(|| {
        ClientError::Decode(format!("getrawtransaction: no output at index {index}"))
    })?;

    decode_hex("getrawtransaction", &output.script_pub_key.hex).map(ScriptBuf::from_bytes)
}

#[async_trait]
impl BitcoinRpc for BitcoinClient {
    async fn get_current_height_and_hash(&self) -> ClientResult<(u32, BlockHash)> {
        let tips: Vec<ChainTip> = self.call("getchaintips", vec![]).await?;
        active_tip(tips)
    }

    async fn get_transactions_in_block_by_height(
        &self,
        height: u32,
    ) -> ClientResult<(Vec<Transaction>, BlockHash)> {
        let hash: String = self.call("getblockhash", vec![json!(height)]).await?;
        let raw: String = self.call("getblock", vec![json!(hash), json!(0)]).await?;

        let bytes = decode_hex("getblock", &raw)?;
        let block: Block = consensus::deserialize(&bytes)
            .map_err(|e| ClientError::Decode(format!("getblock: {e}")))?;
        let block_hash = block.block_hash();

        Ok((block.txdata, block_hash))
    }

    async fn get_inclusion_proof(&self, txid: Txid) -> ClientResult<Vec<u8>> {
        let proof: String = self
            .call("gettxoutproof", vec![json!([txid.to_string()])])
            .await?;

        decode_hex("gettxoutproof", &proof)
    }

    async fn get_previous_output_script(&self, txid: Txid, index: u32) -> ClientResult<ScriptBuf> {
        let tx: VerboseTx = self
            .call("getrawtransaction", vec![json!(txid.to_string()), json!(true)])
            .await?;

        output_script(tx, index)
    }

    async fn broadcast_raw_tx(&self, tx_hex: &str) -> ClientResult<Txid> {
        let txid: String = self.call(SEND_RAW_TRANSACTION, vec![json!(tx_hex)]).await?;

        Txid::from_str(&txid).map_err(|e| ClientError::Decode(format!("{SEND_RAW_TRANSACTION}: {e}")))
    }
}
