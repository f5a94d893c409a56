//! Public-API harness shared by the integration and property tests.

#![allow(dead_code)]

use meridian_bft::{BftConfig, BftEngine};
use meridian_kv::{MemStore, Store};
use meridian_primitives::{
    test_utils::{signer_key, MockChain},
    BlockId, Chain, Vote,
};

/// Blocks per round unless a test overrides the config.
pub const INTERVAL: u32 = 4;

/// A mock chain driven through the engine like the node's consensus
/// loop drives the real one.
pub struct Harness {
    pub chain: MockChain,
    pub store: MemStore,
    pub engine: BftEngine<MockChain, MemStore>,
    pub config: BftConfig,
    pub genesis: BlockId,
}

impl Harness {
    pub fn new(max_proposers: u64) -> Self {
        Self::with_config(
            max_proposers,
            BftConfig::new().with_round_interval(INTERVAL),
        )
    }

    pub fn with_config(max_proposers: u64, config: BftConfig) -> Self {
        let (chain, genesis) = MockChain::new(max_proposers);
        let store = MemStore::new();
        let engine = BftEngine::new(chain.clone(), store.clone(), config.clone()).unwrap();
        Self {
            chain,
            store,
            engine,
            config,
            genesis,
        }
    }

    /// Engine restarted over the same chain and store.
    pub fn reopen(&self) -> BftEngine<MockChain, MemStore> {
        BftEngine::new(self.chain.clone(), self.store.clone(), self.config.clone()).unwrap()
    }

    /// Build, process and insert one block, applying the verdict back
    /// to the chain. Returns (id, becomes_best, newly_committed).
    pub fn produce(
        &self,
        parent: BlockId,
        signer: u8,
        vote: Option<Vote>,
    ) -> (BlockId, bool, Option<BlockId>) {
        let header = self.chain.build_child(parent, &signer_key(signer), vote);
        let (becomes_best, newly_committed) = self.engine.process(&header).unwrap();
        let id = self.chain.insert(&header);
        if becomes_best {
            self.chain.set_best(id);
        }
        if let Some(committed) = newly_committed {
            self.chain.set_committed(committed);
        }
        (id, becomes_best, newly_committed)
    }

    /// Fill the round after `parent` up to its boundary: the first
    /// `voters` blocks carry `vote` from distinct signers, later slots
    /// abstain. Returns (block ids, commitments reported in the round).
    pub fn fill_round(
        &self,
        parent: BlockId,
        voters: u8,
        vote: Vote,
    ) -> (Vec<BlockId>, Vec<BlockId>) {
        let interval = self.config.round_interval;
        let mut tip = parent;
        let mut ids = Vec::new();
        let mut commitments = Vec::new();
        let mut slot = 0u8;
        loop {
            let number = tip.number().wrapping_add(1);
            let block_vote = (slot < voters).then_some(vote);
            let (id, _, committed) = self.produce(tip, slot, block_vote);
            slot += 1;
            tip = id;
            ids.push(id);
            commitments.extend(committed);
            if number % interval == interval - 1 {
                break;
            }
        }
        (ids, commitments)
    }

    /// A round where three distinct signers vote COMMIT.
    pub fn committing_round(&self, parent: BlockId) -> Vec<BlockId> {
        self.fill_round(parent, 3, Vote::Commit).0
    }

    /// Round-end weight read back through the public store layout:
    /// key = block id, value = 4-byte big-endian weight.
    pub fn stored_weight(&self, id: &BlockId) -> Option<u32> {
        self.store
            .get(id.as_bytes())
            .unwrap()
            .map(|bytes| u32::from_be_bytes(bytes.as_slice().try_into().unwrap()))
    }

    /// Current best block id.
    pub fn best(&self) -> BlockId {
        self.chain.best().header.id()
    }
}
