//! Read-only chain access consumed by the consensus layer.
//!
//! The node's block repository implements [`Chain`]; consensus never
//! touches storage directly. A [`Branch`] is the chain viewed through a
//! particular tip, so ancestry queries are answered against that branch
//! even while competing branches exist.

use crate::{BlockId, Header};
use serde::{Deserialize, Serialize};

/// Header plus the storage metadata needed to open the state it roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// The block header.
    pub header: Header,
    /// Fork-conflict counter recorded at insertion.
    pub conflicts: u32,
    /// Steady block number recorded at insertion.
    pub steady_num: u32,
}

/// Errors from chain lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// No header stored under this id.
    #[error("missing block header {0}")]
    MissingHeader(BlockId),

    /// The branch is shorter than the requested number.
    #[error("missing block id at number {0}")]
    MissingBlockId(u32),

    /// Backend failure, surfaced verbatim.
    #[error("chain io: {0}")]
    Io(String),
}

/// Read access to the block repository.
pub trait Chain {
    /// Branch view type.
    type Branch: Branch;

    /// Summary of the current best block.
    fn best(&self) -> BlockSummary;

    /// Id of the latest committed checkpoint; zero before finality has
    /// committed anything.
    fn committed(&self) -> BlockId;

    /// Summary of the block with the given id, on any branch.
    fn block_summary(&self, id: &BlockId) -> Result<BlockSummary, ChainError>;

    /// The chain viewed through `tip`.
    fn branch(&self, tip: BlockId) -> Self::Branch;

    /// Raw max-block-proposers parameter from the authority contract at
    /// the given block's state. Callers apply the zero/cap rule.
    fn max_block_proposers(&self, sum: &BlockSummary) -> Result<u64, ChainError>;
}

/// The chain viewed through one tip.
pub trait Branch {
    /// Whether `id` is an ancestor of (or equal to) this branch's tip.
    fn has_block(&self, id: &BlockId) -> Result<bool, ChainError>;

    /// Id of this branch's block at the given number.
    fn block_id(&self, number: u32) -> Result<BlockId, ChainError>;

    /// Summary of this branch's block at the given number.
    fn block_summary_at(&self, number: u32) -> Result<BlockSummary, ChainError>;
}
