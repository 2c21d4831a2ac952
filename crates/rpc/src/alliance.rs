//! JSON-RPC client of an alliance chain node.

use std::time::Duration;

use async_trait::async_trait;
use bitcoin::Txid;
use jsonrpsee::{
    core::{client::ClientT, ClientError as RpcClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde_json::json;
use tracing::trace;

use crate::{
    error::{ClientError, ClientResult},
    traits::AllianceRpc,
    types::ContractEvent,
};

/// Method that imports a Bitcoin deposit through the cross-chain manager.
///
/// The node (or the signing gateway in front of it) is responsible for wrapping the arguments
/// into a signed native-contract invocation.
pub const IMPORT_OUTER_TRANSFER: &str = "importoutertransfer";

/// Client of the alliance chain JSON-RPC interface.
#[derive(Clone)]
pub struct AllianceClient {
    url: String,
    inner: HttpClient,
}

impl std::fmt::Debug for AllianceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllianceClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl AllianceClient {
    /// Creates a client of the node at `url`; every call is bounded by `timeout`.
    pub fn new(url: &str, timeout: Duration) -> ClientResult<Self> {
        let inner = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url)
            .map_err(classify)?;

        Ok(Self {
            url: url.to_string(),
            inner,
        })
    }
}

/// Maps a jsonrpsee failure onto the relayer's error taxonomy.
fn classify(err: RpcClientError) -> ClientError {
    match err {
        RpcClientError::Call(obj) => ClientError::Permanent {
            code: i64::from(obj.code()),
            message: obj.message().to_string(),
        },
        RpcClientError::Transport(e) => ClientError::Transport(e.to_string()),
        RpcClientError::RestartNeeded(e) => ClientError::Transport(e.to_string()),
        RpcClientError::RequestTimeout => ClientError::Transport("request timed out".to_string()),
        RpcClientError::ParseError(e) => ClientError::Decode(e.to_string()),
        other => ClientError::Permanent {
            code: 0,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl AllianceRpc for AllianceClient {
    async fn get_current_block_height(&self) -> ClientResult<u32> {
        let count: u32 = self
            .inner
            .request("getblockcount", rpc_params![])
            .await
            .map_err(classify)?;

        Ok(count.saturating_sub(1))
    }

    async fn get_contract_events(&self, height: u32) -> ClientResult<Vec<ContractEvent>> {
        trace!(%height, "fetching contract events");

        let events: Option<Vec<ContractEvent>> = self
            .inner
            .request("getsmartcodeevent", rpc_params![height])
            .await
            .map_err(classify)?;

        Ok(events.unwrap_or_default())
    }

    async fn submit_cross_chain_deposit(
        &self,
        chain_id: u64,
        txid: Txid,
        raw_tx: &[u8],
        height: u32,
        proof: &[u8],
        submitter: &str,
    ) -> ClientResult<String> {
        let args = json!({
            "chain_id": chain_id,
            "txid": txid.to_string(),
            "raw_tx": hex::encode(raw_tx),
            "height": height,
            "proof": hex::encode(proof),
            "submitter": submitter,
        });

        self.inner
            .request(IMPORT_OUTER_TRANSFER, rpc_params![args])
            .await
            .map_err(classify)
    }
}
