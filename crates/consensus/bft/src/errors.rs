//! Finality engine errors.

use meridian_kv::StoreError;
use meridian_primitives::{BlockId, ChainError, HeaderError};

/// Errors surfaced by the finality engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BftError {
    /// The processed header's ancestry does not include the committed
    /// checkpoint. Recoverable at the caller: drop the header.
    #[error("block conflicts with committed checkpoint")]
    ConflictWithCommitted,

    /// Chain lookup failure; the caller retries after peer sync.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Header seal failure while scanning votes.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// The weight index has no round matching the target weight.
    #[error("no round matches the target weight")]
    WeightSearchFailed,

    /// A round-end weight record the index should contain is absent.
    #[error("missing weight record for {0}")]
    MissingWeight(BlockId),

    /// Malformed persisted bytes. The voted map degrades to empty at
    /// startup; everywhere else this surfaces to the caller.
    #[error("corrupt persisted data: {0}")]
    Decode(&'static str),

    /// Store I/O failure, surfaced verbatim.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BftError {
    /// Whether this is the recoverable ancestry conflict reported by
    /// `process`.
    pub fn is_conflict_with_committed(&self) -> bool {
        matches!(self, Self::ConflictWithCommitted)
    }
}

/// Result alias for finality engine operations.
pub type BftResult<T> = Result<T, BftError>;
