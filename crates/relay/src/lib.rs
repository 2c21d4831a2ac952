//! Relay coordinator.
//!
//! Moves items produced by the chain observers to the opposite chain. Each direction is drained
//! by its own loop and a third loop periodically resubmits the Bitcoin transactions parked in the
//! retry store. Every failure is classified and turned into a local action: retry in place, retry
//! through the queue, retry through the store or drop with a log line. None of them stops a loop.

pub mod config;
mod relayer;

#[cfg(test)]
mod test_utils;

pub use relayer::Relayer;
