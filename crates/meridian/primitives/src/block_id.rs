//! Block identifiers.
//!
//! A block id is a 32-byte value whose leading 4 bytes are the block
//! number in big-endian order; the remaining 28 bytes come from the block
//! content hash. Packing the number into the id makes number extraction
//! O(1) and lets ids double as ordering keys.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte block identifier: `id[0..4] = big-endian(block number)`,
/// `id[4..] = keccak256(signing_hash ‖ signer)[4..]`.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockId(B256);

impl BlockId {
    /// The all-zero id. Used as the "no block" sentinel, e.g. for the
    /// committed checkpoint before finality has activated.
    pub const ZERO: Self = Self(B256::ZERO);

    /// Parent id carried by the genesis block. The number prefix is
    /// `0xffff_ffff`, so `number(parent) + 1` wraps to 0.
    pub const GENESIS_PARENT: Self = {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xff;
        bytes[1] = 0xff;
        bytes[2] = 0xff;
        bytes[3] = 0xff;
        Self(B256::new(bytes))
    };

    /// Build an id from a block number and a content hash; the hash's
    /// leading 4 bytes are overwritten with the big-endian number.
    pub fn new(number: u32, hash: B256) -> Self {
        let mut bytes: [u8; 32] = hash.0;
        bytes[..4].copy_from_slice(&number.to_be_bytes());
        Self(B256::new(bytes))
    }

    /// Block number encoded in the leading 4 bytes.
    pub fn number(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Whether this is the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    /// Reconstruct from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::new(bytes))
    }
}

impl From<B256> for BlockId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<BlockId> for B256 {
    fn from(value: BlockId) -> Self {
        value.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
