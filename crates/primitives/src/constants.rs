//! Constants shared across the relayer.

/// Capacity of the in-memory queues between the observers and the relay coordinator.
///
/// A slow submission path stalls the producing observer once this many items are pending.
pub const QUEUE_CAPACITY: usize = 10;

/// Identifier of the Bitcoin chain as known to the alliance chain's cross-chain manager.
pub const BTC_CHAIN_ID: u64 = 0;

/// Flag byte that the bridge expects at offset 2 of the deposit's `OP_RETURN` output.
pub const OP_RETURN_SCRIPT_FLAG: u8 = 0x66;
