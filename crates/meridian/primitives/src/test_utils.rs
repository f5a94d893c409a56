//! Test fixtures: deterministic signer keys and an in-memory chain.
//!
//! The mock chain stores headers by id, answers branch queries by
//! walking parent links, and lets tests drive `best`/`committed` the way
//! the node's consensus loop would.

use crate::{
    constants::BLOCK_INTERVAL, header::public_key_to_address, BlockId, BlockSummary, Branch,
    Chain, ChainError, Header, Vote,
};
use alloy_primitives::{Address, Bytes, B256};
use parking_lot::RwLock;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::{collections::HashMap, sync::Arc};

/// Deterministic secret key for the signer at `index`.
pub fn signer_key(index: u8) -> SecretKey {
    let mut bytes = [0u8; 32];
    bytes[31] = index + 1;
    SecretKey::from_slice(&bytes).expect("non-zero scalar")
}

/// Address of the signer at `index`.
pub fn signer_address(index: u8) -> Address {
    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, &signer_key(index));
    public_key_to_address(&public_key)
}

/// Seal a header with the given key.
pub fn sign_header(mut header: Header, key: &SecretKey) -> Header {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(header.signing_hash().as_slice())
        .expect("signing hash is 32 bytes");
    let signature = secp.sign_ecdsa_recoverable(&message, key);
    let (recovery_id, compact) = signature.serialize_compact();

    let mut seal = Vec::with_capacity(65);
    seal.extend_from_slice(&compact);
    seal.push(recovery_id.to_i32() as u8);
    header.signature = Bytes::from(seal);
    header
}

#[derive(Debug)]
struct Inner {
    summaries: HashMap<BlockId, BlockSummary>,
    best: BlockId,
    committed: BlockId,
    max_proposers: u64,
    sequence: u64,
}

/// In-memory [`Chain`] implementation.
#[derive(Debug, Clone)]
pub struct MockChain {
    inner: Arc<RwLock<Inner>>,
}

impl MockChain {
    /// Create a chain holding only the genesis block; returns the chain
    /// and the genesis id. `max_proposers` is the raw contract value the
    /// chain will report.
    pub fn new(max_proposers: u64) -> (Self, BlockId) {
        let genesis = Header {
            parent_id: BlockId::GENESIS_PARENT,
            timestamp: 1_000_000_000,
            total_score: 0,
            state_root: B256::ZERO,
            vote: None,
            signature: Bytes::new(),
        };
        let genesis_id = genesis.id();

        let mut summaries = HashMap::new();
        summaries.insert(
            genesis_id,
            BlockSummary {
                header: genesis,
                conflicts: 0,
                steady_num: 0,
            },
        );

        let chain = Self {
            inner: Arc::new(RwLock::new(Inner {
                summaries,
                best: genesis_id,
                committed: BlockId::ZERO,
                max_proposers,
                sequence: 0,
            })),
        };
        (chain, genesis_id)
    }

    /// Build a signed child of `parent` without inserting it. Each call
    /// gets a distinct state root so sibling blocks never collide on id.
    pub fn build_child(&self, parent: BlockId, key: &SecretKey, vote: Option<Vote>) -> Header {
        let parent_header = {
            let inner = self.inner.read();
            inner.summaries[&parent].header.clone()
        };
        let score = parent_header.total_score + 1;
        self.build_child_with_score(parent, key, vote, score)
    }

    /// [`Self::build_child`] with an explicit total score, for tie-break
    /// tests.
    pub fn build_child_with_score(
        &self,
        parent: BlockId,
        key: &SecretKey,
        vote: Option<Vote>,
        total_score: u64,
    ) -> Header {
        let mut inner = self.inner.write();
        inner.sequence += 1;
        let sequence = inner.sequence;
        let parent_header = &inner.summaries[&parent].header;

        let mut state_root = [0u8; 32];
        state_root[24..].copy_from_slice(&sequence.to_be_bytes());

        let header = Header {
            parent_id: parent,
            timestamp: parent_header.timestamp + BLOCK_INTERVAL,
            total_score,
            state_root: B256::new(state_root),
            vote,
            signature: Bytes::new(),
        };
        drop(inner);
        sign_header(header, key)
    }

    /// Store a header; returns its id.
    pub fn insert(&self, header: &Header) -> BlockId {
        let id = header.id();
        self.inner.write().summaries.insert(
            id,
            BlockSummary {
                header: header.clone(),
                conflicts: 0,
                steady_num: 0,
            },
        );
        id
    }

    /// Build, sign and store a child of `parent`; returns its id.
    pub fn add_block(&self, parent: BlockId, key: &SecretKey, vote: Option<Vote>) -> BlockId {
        let header = self.build_child(parent, key, vote);
        self.insert(&header)
    }

    /// Header stored under `id`, if any.
    pub fn header(&self, id: &BlockId) -> Option<Header> {
        self.inner
            .read()
            .summaries
            .get(id)
            .map(|sum| sum.header.clone())
    }

    /// Point the chain's best block at `id`.
    pub fn set_best(&self, id: BlockId) {
        self.inner.write().best = id;
    }

    /// Record the committed checkpoint.
    pub fn set_committed(&self, id: BlockId) {
        self.inner.write().committed = id;
    }

    /// Change the raw contract max-proposers value.
    pub fn set_max_proposers(&self, max_proposers: u64) {
        self.inner.write().max_proposers = max_proposers;
    }
}

impl Chain for MockChain {
    type Branch = MockBranch;

    fn best(&self) -> BlockSummary {
        let inner = self.inner.read();
        inner.summaries[&inner.best].clone()
    }

    fn committed(&self) -> BlockId {
        self.inner.read().committed
    }

    fn block_summary(&self, id: &BlockId) -> Result<BlockSummary, ChainError> {
        self.inner
            .read()
            .summaries
            .get(id)
            .cloned()
            .ok_or(ChainError::MissingHeader(*id))
    }

    fn branch(&self, tip: BlockId) -> MockBranch {
        MockBranch {
            chain: self.clone(),
            tip,
        }
    }

    fn max_block_proposers(&self, _sum: &BlockSummary) -> Result<u64, ChainError> {
        Ok(self.inner.read().max_proposers)
    }
}

/// Branch view over a [`MockChain`].
#[derive(Debug, Clone)]
pub struct MockBranch {
    chain: MockChain,
    tip: BlockId,
}

impl MockBranch {
    fn ancestor_at(&self, number: u32) -> Result<BlockId, ChainError> {
        if number > self.tip.number() {
            return Err(ChainError::MissingBlockId(number));
        }
        let inner = self.chain.inner.read();
        let mut current = self.tip;
        while current.number() > number {
            let sum = inner
                .summaries
                .get(&current)
                .ok_or(ChainError::MissingHeader(current))?;
            current = sum.header.parent_id;
        }
        Ok(current)
    }
}

impl Branch for MockBranch {
    fn has_block(&self, id: &BlockId) -> Result<bool, ChainError> {
        if id.number() > self.tip.number() {
            return Ok(false);
        }
        Ok(self.ancestor_at(id.number())? == *id)
    }

    fn block_id(&self, number: u32) -> Result<BlockId, ChainError> {
        self.ancestor_at(number)
    }

    fn block_summary_at(&self, number: u32) -> Result<BlockSummary, ChainError> {
        let id = self.block_id(number)?;
        self.chain.block_summary(&id)
    }
}
