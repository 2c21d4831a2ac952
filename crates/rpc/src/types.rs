//! Wire types returned by the nodes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Events emitted by one alliance transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractEvent {
    /// Hash of the transaction that emitted the notifications.
    #[serde(rename = "TxHash", default)]
    pub tx_hash: String,

    /// Notifications emitted by the contracts the transaction touched.
    #[serde(rename = "Notify", default, deserialize_with = "null_as_default")]
    pub notify: Vec<Notification>,
}

/// A single contract notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Contract that emitted the notification.
    #[serde(rename = "ContractAddress", default)]
    pub contract_address: String,

    /// Arbitrary state tuple; watched notifications are arrays of strings.
    #[serde(rename = "States", default)]
    pub states: Value,
}

impl Notification {
    /// Returns the `index`th state field if the states form an array and that field is a string.
    pub fn state_str(&self, index: usize) -> Option<&str> {
        self.states.as_array()?.get(index)?.as_str()
    }
}

/// An entry of `getchaintips`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ChainTip {
    pub(crate) height: u32,
    pub(crate) hash: String,
    #[serde(default)]
    pub(crate) status: String,
}

/// The part of `getrawtransaction <txid> true` the relayer reads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VerboseTx {
    pub(crate) vout: Vec<VerboseOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VerboseOutput {
    #[serde(rename = "scriptPubKey")]
    pub(crate) script_pub_key: VerboseScript,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VerboseScript {
    pub(crate) hex: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
