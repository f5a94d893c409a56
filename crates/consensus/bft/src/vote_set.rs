//! Per-round vote aggregation.
//!
//! A vote set accumulates the votes scanned from one round's headers on
//! one branch, fed newest-first. Both thresholds use strict `>` against
//! `floor(2 * max_proposers / 3)`: a round where exactly two thirds of
//! the proposers show up is not justified.

use crate::{
    engine::{BftEngine, BftState},
    errors::BftResult,
};
use alloy_primitives::Address;
use meridian_kv::Store;
use meridian_primitives::{BlockId, Branch, Chain};
use std::collections::HashMap;

/// Vote aggregation for one round on one branch.
#[derive(Debug)]
pub(crate) struct VoteSet {
    /// Branch weight at the end of the previous round.
    parent_weight: u32,
    /// Block number of this round's first block.
    checkpoint: u32,
    /// `floor(2 * max_proposers / 3)`.
    threshold: u64,
    /// Signer → has voted COMMIT.
    votes: HashMap<Address, bool>,
    /// COMMIT vote count.
    com_votes: u64,
    /// First block to push the voter count past the threshold.
    justified_at: Option<BlockId>,
    /// First block to push the COMMIT count past the threshold.
    committed_at: Option<BlockId>,
}

impl VoteSet {
    /// Vote set for the round containing the child of `parent_id`.
    ///
    /// The threshold and previous-round weight come from the last block
    /// of the previous round on that branch.
    pub(crate) fn new<C: Chain, S: Store>(
        engine: &BftEngine<C, S>,
        parent_id: BlockId,
    ) -> BftResult<Self> {
        let config = engine.config();
        let block_num = parent_id.number().wrapping_add(1);
        let abs_round = config.absolute_round(block_num);
        let checkpoint = config.checkpoint(block_num);
        let last_of_prev_round = checkpoint.saturating_sub(1);

        let sum = engine
            .chain()
            .branch(parent_id)
            .block_summary_at(last_of_prev_round)?;
        let max_proposers = engine.max_block_proposers(&sum)?;
        let threshold = max_proposers * 2 / 3;

        let parent_weight = if abs_round == 0 {
            0
        } else {
            engine.weight_of(&sum.header.id())?
        };

        Ok(Self::with_params(parent_weight, checkpoint, threshold))
    }

    pub(crate) fn with_params(parent_weight: u32, checkpoint: u32, threshold: u64) -> Self {
        Self {
            parent_weight,
            checkpoint,
            threshold,
            votes: HashMap::new(),
            com_votes: 0,
            justified_at: None,
            committed_at: None,
        }
    }

    /// Block number of this round's first block.
    pub(crate) fn checkpoint(&self) -> u32 {
        self.checkpoint
    }

    /// Whether the round has crossed the commitment threshold; further
    /// votes are ignored.
    pub(crate) fn is_committed(&self) -> bool {
        self.committed_at.is_some()
    }

    /// Record a vote scanned from the block `id` signed by `signer`.
    ///
    /// A signer's recorded vote can only upgrade from witness to commit,
    /// never back.
    pub(crate) fn add_vote(&mut self, signer: Address, is_commit: bool, id: BlockId) {
        if self.is_committed() {
            return;
        }

        match self.votes.get_mut(&signer) {
            None => {
                self.votes.insert(signer, is_commit);
                if is_commit {
                    self.com_votes += 1;
                }
            }
            Some(voted_commit) => {
                if !*voted_commit && is_commit {
                    *voted_commit = true;
                    self.com_votes += 1;
                }
            }
        }

        if self.justified_at.is_none() && self.votes.len() as u64 > self.threshold {
            self.justified_at = Some(id);
        }
        if self.committed_at.is_none() && self.com_votes > self.threshold {
            self.committed_at = Some(id);
        }
    }

    /// Derive the branch state: a justified round adds one to the
    /// previous round's weight.
    pub(crate) fn state(&self) -> BftState {
        let mut weight = self.parent_weight;
        if self.justified_at.is_some() {
            weight += 1;
        }
        BftState {
            weight,
            justified_at: self.justified_at,
            committed_at: self.committed_at,
        }
    }
}
