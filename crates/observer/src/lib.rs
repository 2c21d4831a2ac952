//! Chain observers.
//!
//! Each observer polls its chain on a timer, scans every block between its watermark and the
//! current tip in increasing height order, and pushes the items it finds onto a bounded queue
//! consumed by the relay coordinator. The watermark only moves forward, and only once every block
//! of a batch has been scanned.

pub mod alliance;
pub mod btc;
pub mod config;
pub mod errors;
pub mod filter;
mod persistence;

#[cfg(test)]
mod test_utils;
