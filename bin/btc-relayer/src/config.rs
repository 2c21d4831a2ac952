use std::{collections::BTreeMap, fmt, path::PathBuf, time::Duration};

use anyhow::{ensure, Context};
use bitcoin::ScriptBuf;
use btc_relayer_db::persistent::config::RetryDbConfig;
use btc_relayer_observer::{
    config::{AllianceObserverConfig, BtcObserverConfig},
    filter::DepositFilter,
};
use btc_relayer_primitives::{
    chain::Chain,
    checkpoints::CheckpointTable,
    constants::{BTC_CHAIN_ID, OP_RETURN_SCRIPT_FLAG},
};
use btc_relayer_relay::config::RelayConfig;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BACKOFF, DEFAULT_RESEND_DELAY};

/// The configuration values that dictate the behavior of the relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// The directory holding the retry store.
    pub datadir: PathBuf,

    /// Distance in heights after which an observer persists its watermark even if it found
    /// nothing.
    pub waiting_cycle: u32,

    /// Number of runtime worker threads.
    pub num_threads: Option<u8>,

    /// The configuration of the Bitcoin side.
    pub btc: BtcConfig,

    /// The configuration of the alliance side.
    pub alliance: AllianceConfig,

    /// The configuration of the retry store.
    pub retry: RetryConfig,

    /// Timings of the relay loops.
    #[serde(default)]
    pub relay: RelayTimings,

    /// Per-network overrides of the compiled-in starting heights.
    #[serde(default)]
    pub checkpoints: CheckpointOverrides,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BtcConfig {
    pub url: String,
    pub user: String,
    pub pass: String,

    /// Network name, e.g. `mainnet`, `testnet3` or `regtest`.
    pub network: String,

    /// Bound on every call made to the node.
    pub timeout: Duration,

    pub poll_interval: Duration,

    /// Blocks a deposit must be buried under, its own included, before it is relayed.
    pub confirmations: u32,

    /// Hex-encoded redeem script of the bridge multisig.
    pub redeem_script: String,

    #[serde(default = "default_op_return_flag")]
    pub op_return_flag: u8,

    /// Id of the Bitcoin chain in the alliance cross-chain manager.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

impl fmt::Debug for BtcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BtcConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("network", &self.network)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("confirmations", &self.confirmations)
            .field("redeem_script", &self.redeem_script)
            .field("op_return_flag", &self.op_return_flag)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AllianceConfig {
    pub url: String,

    /// Network name, e.g. `testnet` or `regtest`.
    pub network: String,

    /// Bound on every call made to the node.
    pub timeout: Duration,

    pub poll_interval: Duration,

    /// First state field of the notifications carrying a Bitcoin transaction to broadcast.
    pub watched_key: String,

    /// Alliance account importing the deposits.
    pub submitter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RetryConfig {
    /// Broadcast attempts given to a stored transaction. 0 keeps records until they resolve.
    pub max_attempts: u16,

    /// Period of the retry store drain.
    pub period: Duration,

    /// Upper bound on the bytes read by one drain.
    pub max_read_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RelayTimings {
    /// Delay before an item that hit a transport failure goes back on its queue.
    pub resend_delay: Duration,

    /// Pause before a failed fetch or broadcast is retried in place.
    pub backoff: Duration,
}

impl Default for RelayTimings {
    fn default() -> Self {
        Self {
            resend_delay: DEFAULT_RESEND_DELAY,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CheckpointOverrides {
    #[serde(default)]
    pub btc: BTreeMap<String, u32>,

    #[serde(default)]
    pub alliance: BTreeMap<String, u32>,
}

const fn default_op_return_flag() -> u8 {
    OP_RETURN_SCRIPT_FLAG
}

const fn default_chain_id() -> u64 {
    BTC_CHAIN_ID
}

impl Config {
    /// Rejects values the relayer cannot run with.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.waiting_cycle > 0, "waiting_cycle must be positive");
        ensure!(self.num_threads != Some(0), "num_threads must be positive");
        ensure!(
            !self.btc.poll_interval.is_zero(),
            "btc.poll_interval must be positive"
        );
        ensure!(
            !self.alliance.poll_interval.is_zero(),
            "alliance.poll_interval must be positive"
        );
        ensure!(self.btc.confirmations > 0, "btc.confirmations must be positive");
        ensure!(!self.retry.period.is_zero(), "retry.period must be positive");
        ensure!(self.retry.max_read_size > 0, "retry.max_read_size must be positive");
        self.redeem_script()?;

        Ok(())
    }

    pub(crate) fn redeem_script(&self) -> anyhow::Result<ScriptBuf> {
        let bytes = hex::decode(&self.btc.redeem_script).context("btc.redeem_script is not hex")?;
        Ok(ScriptBuf::from_bytes(bytes))
    }

    pub(crate) fn checkpoints(&self) -> CheckpointTable {
        CheckpointTable::default()
            .with_overrides(Chain::Bitcoin, &self.checkpoints.btc)
            .with_overrides(Chain::Alliance, &self.checkpoints.alliance)
    }

    pub(crate) fn retry_db_config(&self) -> RetryDbConfig {
        RetryDbConfig::default()
            .with_max_attempts(self.retry.max_attempts)
            .with_max_read_size(self.retry.max_read_size)
    }

    pub(crate) fn btc_observer_config(&self) -> anyhow::Result<BtcObserverConfig> {
        let filter = DepositFilter::new(self.redeem_script()?).with_flag(self.btc.op_return_flag);

        Ok(BtcObserverConfig {
            network: self.btc.network.clone(),
            poll_interval: self.btc.poll_interval,
            confirmations: self.btc.confirmations,
            waiting_cycle: self.waiting_cycle,
            backoff: self.relay.backoff,
            filter,
        })
    }

    pub(crate) fn alliance_observer_config(&self) -> AllianceObserverConfig {
        AllianceObserverConfig {
            network: self.alliance.network.clone(),
            poll_interval: self.alliance.poll_interval,
            watched_key: self.alliance.watched_key.clone(),
            waiting_cycle: self.waiting_cycle,
            backoff: self.relay.backoff,
        }
    }

    pub(crate) fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            chain_id: self.btc.chain_id,
            submitter: self.alliance.submitter.clone(),
            resend_delay: self.relay.resend_delay,
            backoff: self.relay.backoff,
            retry_period: self.retry.period,
        }
    }
}
