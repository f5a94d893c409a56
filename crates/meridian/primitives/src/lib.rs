//! Core primitive types for the Meridian network.
//!
//! This crate provides the building blocks shared by the consensus and
//! storage layers:
//!
//! - [`BlockId`] - 32-byte block identifier with the block number packed
//!   into the leading 4 bytes
//! - [`Header`] - proposer-signed block header carrying the finality vote
//! - [`Chain`] / [`Branch`] - read-only chain access consumed by consensus

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod block_id;
mod chain;
mod header;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use block_id::BlockId;
pub use chain::{BlockSummary, Branch, Chain, ChainError};
pub use header::{Header, HeaderError, Vote};

pub use alloy_primitives::{Address, Bytes, B256, U256};

/// Protocol constants.
pub mod constants {
    /// Number of blocks in one finality round (checkpoint interval).
    pub const ROUND_INTERVAL: u32 = 180;

    /// Upper bound on the active proposer set; the cap applied to the
    /// contract-sourced value when it is zero or out of range.
    pub const INITIAL_MAX_PROPOSERS: u64 = 101;

    /// Target seconds between consecutive blocks.
    pub const BLOCK_INTERVAL: u64 = 10;

    /// Length in bytes of a header seal signature (r ‖ s ‖ recovery id).
    pub const SIGNATURE_LENGTH: usize = 65;
}

/// Block number of the round checkpoint (first block of the round)
/// containing `number`.
pub fn checkpoint_of(number: u32, round_interval: u32) -> u32 {
    number / round_interval * round_interval
}
