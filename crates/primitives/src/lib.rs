//! This crate contains the types and constants that need to be shared across the relayer crates.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace.

pub mod chain;
pub mod checkpoints;
pub mod constants;
pub mod items;
