//! Clients of the two chains the relayer talks to.
//!
//! The rest of the workspace only depends on the [`traits::BitcoinRpc`] and
//! [`traits::AllianceRpc`] interfaces and on the [`error::ClientError`] taxonomy used to decide
//! whether a failed call is retried in place, queued for a durable retry or dropped.

pub mod alliance;
pub mod bitcoin;
pub mod error;
pub mod traits;
pub mod types;
