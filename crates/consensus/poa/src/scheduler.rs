//! Deterministic slot assignment among active proposers.
//!
//! Slots are the times `parent_timestamp + k * BLOCK_INTERVAL`, `k >= 1`,
//! grouped into cycles of `n = |active proposers|`. Each cycle's order is
//! a Fisher-Yates shuffle of the active set driven by a ChaCha stream
//! keyed to `(seed, parent number, cycle)`, so every active proposer
//! holds exactly one slot per cycle and scheduling terminates within two
//! cycles. The seed is VRF-derived by the node, keyed to the parent id.

use alloy_primitives::{keccak256, Address, B256};
use meridian_primitives::constants::BLOCK_INTERVAL;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// An authority-contract candidate: address plus its activity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposer {
    /// Master address of the candidate.
    pub address: Address,
    /// Whether the candidate is currently active.
    pub active: bool,
}

impl Proposer {
    /// Candidate entry.
    pub fn new(address: Address, active: bool) -> Self {
        Self { address, active }
    }
}

/// Scheduling errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The master is not in the candidate set.
    #[error("unauthorized block proposer {0}")]
    Unauthorized(Address),

    /// No slot for the master in the scanned horizon. Cannot happen
    /// while the master is part of the cycle order.
    #[error("failed to schedule")]
    Unschedulable,
}

/// Slot schedule for one master over one parent block.
///
/// The slot order is deterministic in the candidate list order, which
/// follows the authority contract's listing.
#[derive(Debug, Clone)]
pub struct Scheduler {
    master: Address,
    master_active: bool,
    actives: Vec<Address>,
    parent_number: u32,
    parent_timestamp: u64,
    seed: B256,
}

impl Scheduler {
    /// Build the schedule for `master` over the given parent.
    ///
    /// An inactive master is scheduled alongside the actives so it can
    /// reactivate by producing its block; an unlisted one is rejected.
    pub fn new(
        master: Address,
        proposers: &[Proposer],
        parent_number: u32,
        parent_timestamp: u64,
        seed: B256,
    ) -> Result<Self, SchedulerError> {
        let listed = proposers
            .iter()
            .find(|proposer| proposer.address == master)
            .ok_or(SchedulerError::Unauthorized(master))?;

        let mut actives: Vec<Address> = proposers
            .iter()
            .filter(|proposer| proposer.active)
            .map(|proposer| proposer.address)
            .collect();
        if !listed.active {
            actives.push(master);
        }

        Ok(Self {
            master,
            master_active: listed.active,
            actives,
            parent_number,
            parent_timestamp,
            seed,
        })
    }

    /// Number of proposers holding slots in each cycle.
    pub fn active_count(&self) -> usize {
        self.actives.len()
    }

    /// The earliest slot time at or after `now` whose proposer is this
    /// scheduler's master.
    pub fn schedule(&self, now: u64) -> Result<u64, SchedulerError> {
        let first = if now > self.parent_timestamp + BLOCK_INTERVAL {
            (now - self.parent_timestamp).div_ceil(BLOCK_INTERVAL)
        } else {
            1
        };

        let horizon = 2 * self.actives.len() as u64;
        for slot in first..first + horizon {
            if self.slot_proposer(slot) == self.master {
                return Ok(self.parent_timestamp + slot * BLOCK_INTERVAL);
            }
        }
        Err(SchedulerError::Unschedulable)
    }

    /// Whether `proposer` holds the slot at `block_time`.
    pub fn is_scheduled(&self, block_time: u64, proposer: &Address) -> bool {
        if block_time <= self.parent_timestamp
            || (block_time - self.parent_timestamp) % BLOCK_INTERVAL != 0
        {
            return false;
        }
        let slot = (block_time - self.parent_timestamp) / BLOCK_INTERVAL;
        self.slot_proposer(slot) == *proposer
    }

    /// Authority updates to apply when the master seals at
    /// `new_block_time`, plus the score increment for the legacy
    /// total-score tie-break.
    ///
    /// Every proposer that held a slot strictly before `new_block_time`
    /// and did not produce is deactivated; an inactive master
    /// reactivates itself. The score is the number of actives with no
    /// missed slot.
    pub fn updates(&self, new_block_time: u64) -> (Vec<Proposer>, u64) {
        let n = self.actives.len() as u64;
        let new_slot = (new_block_time - self.parent_timestamp) / BLOCK_INTERVAL;

        let mut missed: Vec<Address> = Vec::new();
        if new_slot > n {
            // Every cycle assigns each active exactly one slot, so a gap
            // of more than one cycle misses everyone but the master.
            missed = self
                .actives
                .iter()
                .copied()
                .filter(|address| *address != self.master)
                .collect();
        } else {
            for slot in 1..new_slot {
                let proposer = self.slot_proposer(slot);
                if proposer != self.master && !missed.contains(&proposer) {
                    missed.push(proposer);
                }
            }
        }

        let mut updates: Vec<Proposer> = missed
            .iter()
            .map(|address| Proposer::new(*address, false))
            .collect();
        if !self.master_active {
            updates.push(Proposer::new(self.master, true));
        }

        let score = n - missed.len() as u64;
        (updates, score)
    }

    /// Proposer of the numbered slot.
    fn slot_proposer(&self, slot: u64) -> Address {
        let n = self.actives.len() as u64;
        let cycle = (slot - 1) / n;
        let index = ((slot - 1) % n) as usize;
        self.cycle_order(cycle)[index]
    }

    /// The shuffled proposer order of one cycle.
    fn cycle_order(&self, cycle: u64) -> Vec<Address> {
        let mut preimage = [0u8; 44];
        preimage[..32].copy_from_slice(self.seed.as_slice());
        preimage[32..36].copy_from_slice(&self.parent_number.to_be_bytes());
        preimage[36..].copy_from_slice(&cycle.to_be_bytes());

        let mut rng = ChaCha8Rng::from_seed(keccak256(preimage).0);
        let mut order = self.actives.clone();
        order.shuffle(&mut rng);
        order
    }
}

/// For a node holding several masters: the one whose slot arrives
/// earliest, with its schedule. Masters outside the candidate set are
/// skipped.
pub fn schedule_earliest(
    masters: &[Address],
    proposers: &[Proposer],
    parent_number: u32,
    parent_timestamp: u64,
    seed: B256,
    now: u64,
) -> Result<(Scheduler, u64), SchedulerError> {
    let mut best: Option<(Scheduler, u64)> = None;

    for master in masters {
        let Ok(scheduler) = Scheduler::new(*master, proposers, parent_number, parent_timestamp, seed)
        else {
            continue;
        };
        let when = scheduler.schedule(now)?;
        if best.as_ref().is_none_or(|(_, t)| when < *t) {
            best = Some((scheduler, when));
        }
    }

    best.ok_or(SchedulerError::Unschedulable)
}
