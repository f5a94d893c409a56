//! Shared fixtures for engine tests.

use crate::{BftConfig, BftEngine};
use meridian_kv::MemStore;
use meridian_primitives::{
    test_utils::{signer_key, MockChain},
    BlockId, Vote,
};

/// Blocks per round in every engine test.
pub(crate) const INTERVAL: u32 = 4;

/// Engine config with short rounds.
pub(crate) fn test_config() -> BftConfig {
    BftConfig::new().with_round_interval(INTERVAL)
}

/// Outcome of producing one block through the engine.
#[derive(Debug)]
pub(crate) struct Produced {
    pub id: BlockId,
    pub becomes_best: bool,
    pub newly_committed: Option<BlockId>,
}

/// A mock chain plus an engine over a shared in-memory store.
pub(crate) struct TestNode {
    pub chain: MockChain,
    pub store: MemStore,
    pub engine: BftEngine<MockChain, MemStore>,
    pub genesis: BlockId,
}

impl TestNode {
    /// Node with `max_proposers` active proposers and finality from
    /// genesis.
    pub(crate) fn new(max_proposers: u64) -> Self {
        Self::with_config(max_proposers, test_config())
    }

    pub(crate) fn with_config(max_proposers: u64, config: BftConfig) -> Self {
        let (chain, genesis) = MockChain::new(max_proposers);
        let store = MemStore::new();
        let engine = BftEngine::new(chain.clone(), store.clone(), config).unwrap();
        Self {
            chain,
            store,
            engine,
            genesis,
        }
    }

    /// Reopen the engine over the same chain and store, as after a
    /// restart.
    pub(crate) fn reopen(&self) -> BftEngine<MockChain, MemStore> {
        BftEngine::new(self.chain.clone(), self.store.clone(), self.engine.config().clone())
            .unwrap()
    }

    /// Build, process and insert one block signed by `signer`, applying
    /// the engine's verdict to the chain like the consensus loop does.
    pub(crate) fn produce(&self, parent: BlockId, signer: u8, vote: Option<Vote>) -> Produced {
        let header = self.chain.build_child(parent, &signer_key(signer), vote);
        let (becomes_best, newly_committed) = self.engine.process(&header).unwrap();
        let id = self.chain.insert(&header);
        if becomes_best {
            self.chain.set_best(id);
        }
        if let Some(committed) = newly_committed {
            self.chain.set_committed(committed);
        }
        Produced {
            id,
            becomes_best,
            newly_committed,
        }
    }

    /// Produce one block per plan entry, chaining from `parent`.
    pub(crate) fn produce_chain(
        &self,
        parent: BlockId,
        plan: &[(u8, Option<Vote>)],
    ) -> Vec<Produced> {
        let mut tip = parent;
        let mut produced = Vec::with_capacity(plan.len());
        for (signer, vote) in plan {
            let block = self.produce(tip, *signer, *vote);
            tip = block.id;
            produced.push(block);
        }
        produced
    }

    /// Fill the round containing `parent`'s child up to the round
    /// boundary. The first three blocks carry `vote` from distinct
    /// signers, later slots abstain. Returns the produced block ids.
    pub(crate) fn round_with_votes(&self, parent: BlockId, vote: Option<Vote>) -> Vec<BlockId> {
        let mut tip = parent;
        let mut ids = Vec::new();
        let mut slot = 0u8;
        loop {
            let number = tip.number().wrapping_add(1);
            let block_vote = if slot < 3 { vote } else { None };
            let block = self.produce(tip, slot % 3, block_vote);
            slot += 1;
            tip = block.id;
            ids.push(block.id);
            if number % INTERVAL == INTERVAL - 1 {
                break;
            }
        }
        ids
    }

    /// A round where three distinct signers vote COMMIT: justifies and
    /// commits.
    pub(crate) fn committing_round(&self, parent: BlockId) -> Vec<BlockId> {
        self.round_with_votes(parent, Some(Vote::Commit))
    }

    /// A round where three distinct signers vote WITNESS: justifies
    /// without committing.
    pub(crate) fn justifying_round(&self, parent: BlockId) -> Vec<BlockId> {
        self.round_with_votes(parent, Some(Vote::Witness))
    }

    /// A round with no votes at all: the weight stays flat.
    pub(crate) fn idle_round(&self, parent: BlockId) -> Vec<BlockId> {
        self.round_with_votes(parent, None)
    }
}
