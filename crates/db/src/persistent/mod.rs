//! The sled-backed implementation of the store.

pub mod config;
pub mod constants;
mod retry_db;

pub use retry_db::RetryDb;
