//! Proposer-signed block headers.
//!
//! Headers carry the finality vote in an optional trailing field and are
//! sealed by a 65-byte recoverable secp256k1 signature over the RLP of
//! all other fields. The proposer is never stored explicitly; it is
//! recovered from the seal.

use crate::{constants::SIGNATURE_LENGTH, BlockId};
use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_rlp::RlpEncodable;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, Secp256k1,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Finality vote a proposer embeds in its block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Vote {
    /// Observed the round without committing.
    Witness = 0,
    /// Committed to the round's checkpoint.
    Commit = 1,
}

impl Vote {
    /// Whether this is a COMMIT vote.
    pub fn is_commit(&self) -> bool {
        matches!(self, Self::Commit)
    }

    /// Wire value of the vote.
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for Vote {
    type Error = HeaderError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Witness),
            1 => Ok(Self::Commit),
            _ => Err(HeaderError::InvalidVote(value)),
        }
    }
}

/// Header-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// Seal is not exactly 65 bytes.
    #[error("invalid signature length")]
    InvalidSignatureLength,

    /// Seal bytes do not parse as a recoverable signature.
    #[error("invalid signature format")]
    InvalidSignatureFormat,

    /// Public key recovery failed against the signing hash.
    #[error("signature recovery failed")]
    RecoveryFailed,

    /// Vote byte outside {0, 1}.
    #[error("invalid finality vote: {0}")]
    InvalidVote(u8),
}

/// Block header.
///
/// The block number is not a field: it is always `parent.number() + 1`,
/// read from the parent id's number prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Id of the parent block.
    pub parent_id: BlockId,
    /// Unix timestamp of the block slot.
    pub timestamp: u64,
    /// Cumulative proposer score from genesis; legacy fork-choice key.
    pub total_score: u64,
    /// State root after executing this block.
    pub state_root: B256,
    /// Optional finality vote; absent before finality activation.
    pub vote: Option<Vote>,
    /// 65-byte seal (r ‖ s ‖ recovery id), empty while unsigned.
    pub signature: Bytes,
}

/// Signing preimage: every header field except the seal. The vote is a
/// trailing optional so pre-finality headers keep their historical
/// encoding.
#[derive(RlpEncodable)]
#[rlp(trailing)]
struct SigningFields {
    parent_id: B256,
    timestamp: u64,
    total_score: u64,
    state_root: B256,
    vote: Option<u8>,
}

impl Header {
    /// Block number, inferred from the parent id. The genesis parent
    /// sentinel wraps to 0.
    pub fn number(&self) -> u32 {
        self.parent_id.number().wrapping_add(1)
    }

    /// Keccak hash of the RLP of all fields excluding the seal.
    pub fn signing_hash(&self) -> B256 {
        let fields = SigningFields {
            parent_id: self.parent_id.into(),
            timestamp: self.timestamp,
            total_score: self.total_score,
            state_root: self.state_root,
            vote: self.vote.map(|v| v.as_byte()),
        };
        keccak256(alloy_rlp::encode(&fields))
    }

    /// Recover the proposer address from the seal.
    ///
    /// The genesis block has no proposer and recovers to the zero
    /// address.
    pub fn signer(&self) -> Result<Address, HeaderError> {
        if self.number() == 0 {
            return Ok(Address::ZERO);
        }
        if self.signature.len() != SIGNATURE_LENGTH {
            return Err(HeaderError::InvalidSignatureLength);
        }

        let recovery_id = RecoveryId::from_i32(i32::from(self.signature[64]))
            .map_err(|_| HeaderError::InvalidSignatureFormat)?;
        let signature = RecoverableSignature::from_compact(&self.signature[..64], recovery_id)
            .map_err(|_| HeaderError::InvalidSignatureFormat)?;
        let message = Message::from_digest_slice(self.signing_hash().as_slice())
            .map_err(|_| HeaderError::InvalidSignatureFormat)?;

        let secp = Secp256k1::new();
        let public_key = secp
            .recover_ecdsa(&message, &signature)
            .map_err(|_| HeaderError::RecoveryFailed)?;

        Ok(public_key_to_address(&public_key))
    }

    /// Block id: big-endian number prefix followed by
    /// `keccak256(signing_hash ‖ signer)[4..]`.
    pub fn id(&self) -> BlockId {
        let signer = self.signer().unwrap_or_default();
        let mut preimage = [0u8; 52];
        preimage[..32].copy_from_slice(self.signing_hash().as_slice());
        preimage[32..].copy_from_slice(signer.as_slice());
        BlockId::new(self.number(), keccak256(preimage))
    }

    /// Legacy fork-choice tie-break: higher total score wins, equal
    /// scores fall back to the smaller id.
    pub fn better_than(&self, other: &Self) -> bool {
        match self.total_score.cmp(&other.total_score) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.id() < other.id(),
        }
    }
}

/// Ethereum-style address derivation: last 20 bytes of the keccak of the
/// uncompressed public key.
pub(crate) fn public_key_to_address(public_key: &PublicKey) -> Address {
    let bytes = public_key.serialize_uncompressed();
    let hash = keccak256(&bytes[1..]);
    Address::from_slice(&hash[12..])
}
