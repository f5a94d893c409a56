//! The finality engine.
//!
//! One engine instance serves the node's consensus loop. It derives
//! per-branch finality state lazily from header chains, maintains the
//! persisted weight index used to locate checkpoints by weight, and
//! gates the node's own finality vote behind the local safety rule.
//!
//! All caches live behind the engine's own locks; callers never see
//! cache references. Mutating entry points take `&self` and are driven
//! by a single writer, while read-only weight queries may run
//! concurrently.

use crate::{
    config::BftConfig,
    errors::{BftError, BftResult},
    persist,
    prio_cache::PrioCache,
    vote_set::VoteSet,
};
use lru::LruCache;
use meridian_kv::Store;
use meridian_primitives::{BlockId, BlockSummary, Branch, Chain, Header, Vote};
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, num::NonZeroUsize};
use tracing::{debug, warn};

/// Derived branch states kept in memory.
const STATE_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(1024).unwrap();
/// Round-end weights kept in memory.
const WEIGHT_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(1024).unwrap();
/// Resolved max-proposer values kept in memory.
const MBP_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(8).unwrap();
/// Partially built vote sets kept for branch extension.
const VOTE_SET_CACHE_SIZE: usize = 16;

/// Finality state of one branch at one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BftState {
    /// Cumulative count of justified rounds on this branch.
    pub weight: u32,
    /// Block that justified the current round, if any.
    pub justified_at: Option<BlockId>,
    /// Block that committed the current round, if any.
    pub committed_at: Option<BlockId>,
}

/// Deterministic, weight-based finality engine over an
/// authority-scheduled chain.
pub struct BftEngine<C: Chain, S: Store> {
    chain: C,
    store: S,
    config: BftConfig,
    voted: Mutex<HashMap<BlockId, u32>>,
    state_cache: Mutex<LruCache<BlockId, BftState>>,
    weight_cache: Mutex<LruCache<BlockId, u32>>,
    mbp_cache: Mutex<LruCache<BlockId, u64>>,
    vote_sets: Mutex<PrioCache<BlockId, VoteSet>>,
}

impl<C: Chain, S: Store> BftEngine<C, S> {
    /// Open the engine over its store namespace, restoring the voted
    /// map. Corrupt voted bytes degrade to an empty map.
    pub fn new(chain: C, store: S, config: BftConfig) -> BftResult<Self> {
        let voted = match persist::load_voted(&store) {
            Ok(map) => map,
            Err(BftError::Decode(reason)) => {
                warn!(reason, "discarding corrupt voted map");
                HashMap::new()
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            chain,
            store,
            config,
            voted: Mutex::new(voted),
            state_cache: Mutex::new(LruCache::new(STATE_CACHE_SIZE)),
            weight_cache: Mutex::new(LruCache::new(WEIGHT_CACHE_SIZE)),
            mbp_cache: Mutex::new(LruCache::new(MBP_CACHE_SIZE)),
            vote_sets: Mutex::new(PrioCache::new(VOTE_SET_CACHE_SIZE)),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &BftConfig {
        &self.config
    }

    pub(crate) fn chain(&self) -> &C {
        &self.chain
    }

    /// Fork-choice hook for a newly arrived header.
    ///
    /// Returns whether the header becomes the new best block and, when
    /// its COMMIT vote crossed the threshold, the id of the checkpoint
    /// it finalized.
    pub fn process(&self, header: &Header) -> BftResult<(bool, Option<BlockId>)> {
        let best = self.chain.best();
        if header.number() < self.config.finality || best.header.number() < self.config.finality
        {
            // Legacy fork choice below the activation height.
            return Ok((header.better_than(&best.header), None));
        }

        let committed = self.chain.committed();
        if !committed.is_zero() && !self.chain.branch(header.parent_id).has_block(&committed)? {
            return Err(BftError::ConflictWithCommitted);
        }

        let header_id = header.id();
        // The header is not in the repository yet; serve it from here.
        let state = self.compute_state(header_id, &|id| {
            if *id == header_id {
                Ok(header.clone())
            } else {
                self.stored_header(id)
            }
        })?;
        let best_state = self.compute_state(best.header.id(), &|id| self.stored_header(id))?;

        let becomes_new_best = if state.weight != best_state.weight {
            state.weight > best_state.weight
        } else {
            header.better_than(&best.header)
        };

        let mut newly_committed = None;
        if state.committed_at == Some(header_id) && state.weight > 1 {
            // This round's commit finalizes the previous round's
            // checkpoint, found by its weight.
            let id =
                self.find_checkpoint_by_weight(state.weight - 1, &committed, &header.parent_id)?;
            debug!(checkpoint = %id, weight = state.weight - 1, "commit vote finalized checkpoint");
            newly_committed = Some(id);
        }

        Ok((becomes_new_best, newly_committed))
    }

    /// The vote the local node should embed when proposing on top of
    /// `parent_id`.
    ///
    /// COMMIT is withheld while a recent prior local commitment survives
    /// on a conflicting branch whose weight is within one of this
    /// branch's weight.
    pub fn get_vote(&self, parent_id: BlockId) -> BftResult<Vote> {
        let state = self.state_of(parent_id)?;
        if state.weight == 0 {
            return Ok(Vote::Witness);
        }

        let committed = self.chain.committed();

        // Most recent justified checkpoint on this branch.
        let latest_justified = if state.justified_at.is_some() {
            self.chain
                .branch(parent_id)
                .block_id(self.config.checkpoint(parent_id.number()))?
        } else {
            self.find_checkpoint_by_weight(state.weight, &committed, &parent_id)?
        };

        let voted: Vec<(BlockId, u32)> = {
            let voted = self.voted.lock();
            voted.iter().map(|(id, weight)| (*id, *weight)).collect()
        };

        for (checkpoint, voted_weight) in voted {
            if checkpoint.number() < committed.number() {
                continue;
            }

            let (high, low) = if checkpoint.number() > latest_justified.number() {
                (checkpoint, latest_justified)
            } else {
                (latest_justified, checkpoint)
            };

            let included = self.chain.branch(high).has_block(&low)?;
            if !included && voted_weight >= state.weight - 1 {
                return Ok(Vote::Witness);
            }
        }

        Ok(Vote::Commit)
    }

    /// Record the local COMMIT vote after a successful propose on top of
    /// `parent_id`.
    pub fn mark_voted(&self, parent_id: BlockId) -> BftResult<()> {
        let checkpoint = self
            .chain
            .branch(parent_id)
            .block_id(self.config.checkpoint(parent_id.number()))?;
        let state = self.state_of(parent_id)?;

        self.voted.lock().insert(checkpoint, state.weight);
        Ok(())
    }

    /// Flush the voted map, trimmed to checkpoints at or above the
    /// committed block.
    pub fn close(&self) -> BftResult<()> {
        let committed = self.chain.committed();
        let mut voted = self.voted.lock();
        voted.retain(|checkpoint, _| checkpoint.number() >= committed.number());
        persist::save_voted(&self.store, &voted)
    }

    /// Branch state of a block already in the repository.
    pub(crate) fn state_of(&self, block_id: BlockId) -> BftResult<BftState> {
        self.compute_state(block_id, &|id| self.stored_header(id))
    }

    fn stored_header(&self, id: &BlockId) -> BftResult<Header> {
        Ok(self.chain.block_summary(id)?.header)
    }

    /// Materialize the finality state at `block_id` by walking the
    /// round's headers newest-first, reusing the parent's partial vote
    /// set when one is cached.
    fn compute_state(
        &self,
        block_id: BlockId,
        get_header: &dyn Fn(&BlockId) -> BftResult<Header>,
    ) -> BftResult<BftState> {
        if let Some(state) = self.state_cache.lock().get(&block_id) {
            return Ok(*state);
        }

        let header = get_header(&block_id)?;
        if header.number() == 0 {
            return Ok(BftState::default());
        }

        // The parent's partial set belongs to this round only when the
        // target is not itself the round's first block.
        let reused = if header.number() % self.config.round_interval != 0 {
            self.vote_sets.lock().remove(&header.parent_id)
        } else {
            None
        };
        let (mut votes, end) = match reused {
            Some(set) => (set, header.parent_id.number()),
            None => {
                let set = VoteSet::new(self, header.parent_id)?;
                let end = set.checkpoint();
                (set, end)
            }
        };

        let mut current = header.clone();
        loop {
            if votes.is_committed() {
                break;
            }
            if let Some(vote) = current.vote {
                votes.add_vote(current.signer()?, vote.is_commit(), current.id());
            }
            if current.number() <= end {
                break;
            }
            current = get_header(&current.parent_id)?;
        }

        let state = votes.state();

        // Index the branch weight at the round's last block.
        if (header.number() + 1) % self.config.round_interval == 0 {
            persist::save_weight(&self.store, &block_id, state.weight)?;
            self.weight_cache.lock().put(block_id, state.weight);
        }

        self.state_cache.lock().put(block_id, state);
        self.vote_sets
            .lock()
            .insert(block_id, votes, header.number());
        Ok(state)
    }

    /// Id of the round-start checkpoint on the branch through
    /// `parent_id` whose branch weight equals `target`.
    ///
    /// Weight is monotone along a branch and gains at most one per
    /// round, so a binary search over the persisted round-end weights
    /// identifies the round uniquely.
    pub(crate) fn find_checkpoint_by_weight(
        &self,
        target: u32,
        committed: &BlockId,
        parent_id: &BlockId,
    ) -> BftResult<BlockId> {
        let interval = self.config.round_interval;
        let mut search_start = committed.number();
        if search_start == 0 {
            search_start = self.config.checkpoint(self.config.finality);
        }

        let branch = self.chain.branch(*parent_id);
        let round_end_weight = |i: u32| -> BftResult<u32> {
            let id = branch.block_id(search_start + (i + 1) * interval - 1)?;
            self.weight_of(&id)
        };

        let rounds = (parent_id.number() + 1).saturating_sub(search_start) / interval;
        let (mut lo, mut hi) = (0u32, rounds);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if round_end_weight(mid)? >= target {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        if lo == rounds || round_end_weight(lo)? != target {
            return Err(BftError::WeightSearchFailed);
        }

        Ok(branch.block_id(search_start + lo * interval)?)
    }

    /// Round-end weight for `id` from the cache or the persisted index.
    pub(crate) fn weight_of(&self, id: &BlockId) -> BftResult<u32> {
        if let Some(weight) = self.weight_cache.lock().get(id) {
            return Ok(*weight);
        }
        let weight = persist::load_weight(&self.store, id)?;
        self.weight_cache.lock().put(*id, weight);
        Ok(weight)
    }

    /// Max-proposers parameter active at the given block, with the
    /// zero/cap rule applied.
    pub(crate) fn max_block_proposers(&self, sum: &BlockSummary) -> BftResult<u64> {
        let id = sum.header.id();
        if let Some(mbp) = self.mbp_cache.lock().get(&id) {
            return Ok(*mbp);
        }

        let raw = self.chain.max_block_proposers(sum)?;
        let mbp = if raw == 0 || raw > self.config.initial_max_proposers {
            self.config.initial_max_proposers
        } else {
            raw
        };

        self.mbp_cache.lock().put(id, mbp);
        Ok(mbp)
    }
}

impl<C: Chain, S: Store> fmt::Debug for BftEngine<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BftEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
