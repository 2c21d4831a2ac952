//! Recognition of bridge deposits.

use bitcoin::{Amount, ScriptBuf, Transaction};
use btc_relayer_primitives::constants::OP_RETURN_SCRIPT_FLAG;

/// Predicate over a transaction's outputs identifying a deposit into the bridge.
///
/// A deposit pays a positive amount to the bridge's multisig (either bare or wrapped in P2SH) in
/// its first output and tags its second output with an `OP_RETURN` whose first data byte is the
/// bridge flag. The result only depends on the transaction, so re-scanning a block yields the same
/// deposits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositFilter {
    redeem_script: ScriptBuf,
    p2sh_script: ScriptBuf,
    flag: u8,
}

impl DepositFilter {
    /// Creates a filter for the bridge controlled by `redeem_script`.
    pub fn new(redeem_script: ScriptBuf) -> Self {
        let p2sh_script = ScriptBuf::new_p2sh(&redeem_script.script_hash());

        Self {
            redeem_script,
            p2sh_script,
            flag: OP_RETURN_SCRIPT_FLAG,
        }
    }

    /// Overrides the flag byte expected in the `OP_RETURN` output.
    pub fn with_flag(mut self, flag: u8) -> Self {
        self.flag = flag;
        self
    }

    /// Returns the bridge redeem script.
    pub fn redeem_script(&self) -> &ScriptBuf {
        &self.redeem_script
    }

    /// Whether `tx` is a deposit into the bridge.
    pub fn matches(&self, tx: &Transaction) -> bool {
        let [lock, tag, ..] = tx.output.as_slice() else {
            return false;
        };

        if lock.value == Amount::ZERO {
            return false;
        }

        if lock.script_pubkey != self.redeem_script && lock.script_pubkey != self.p2sh_script {
            return false;
        }

        // OP_RETURN <push len> <flag> ...
        tag.script_pubkey.is_op_return() && tag.script_pubkey.as_bytes().get(2) == Some(&self.flag)
    }
}
