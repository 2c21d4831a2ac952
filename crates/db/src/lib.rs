//! Durable state of the relayer.
//!
//! The only persisted state is the watermark height of each observer and the set of Bitcoin
//! transactions whose broadcast must be retried. Both live in a single embedded store, see
//! [`persistent::RetryDb`].

pub mod errors;
pub mod persistent;
pub mod tracker;
