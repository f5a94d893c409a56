//! Finality engine configuration.

use meridian_primitives::constants::{INITIAL_MAX_PROPOSERS, ROUND_INTERVAL};
use serde::{Deserialize, Serialize};

/// Parameters of the finality overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BftConfig {
    /// Blocks per finality round.
    pub round_interval: u32,

    /// Block number at or above which the finality rules apply. Headers
    /// below this height fall back to the legacy total-score fork
    /// choice.
    pub finality: u32,

    /// Cap applied to the contract-sourced max-proposers value when it
    /// is zero or out of range.
    pub initial_max_proposers: u64,
}

impl Default for BftConfig {
    fn default() -> Self {
        Self {
            round_interval: ROUND_INTERVAL,
            finality: 0,
            initial_max_proposers: INITIAL_MAX_PROPOSERS,
        }
    }
}

impl BftConfig {
    /// Config with mainnet defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the round interval.
    pub fn with_round_interval(mut self, round_interval: u32) -> Self {
        self.round_interval = round_interval;
        self
    }

    /// Set the finality activation height.
    pub fn with_finality(mut self, finality: u32) -> Self {
        self.finality = finality;
        self
    }

    /// Set the max-proposers cap.
    pub fn with_initial_max_proposers(mut self, cap: u64) -> Self {
        self.initial_max_proposers = cap;
        self
    }

    /// Block number of the round checkpoint containing `number`.
    pub fn checkpoint(&self, number: u32) -> u32 {
        meridian_primitives::checkpoint_of(number, self.round_interval)
    }

    /// Round index of `number` relative to finality activation; rounds
    /// below the activation height collapse to 0.
    pub fn absolute_round(&self, number: u32) -> u32 {
        (number / self.round_interval).saturating_sub(self.finality / self.round_interval)
    }
}
