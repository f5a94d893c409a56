//! Proposer scheduling for the Meridian authority round.
//!
//! Each block slot belongs to exactly one active authority. The
//! [`Scheduler`] derives the slot order deterministically from a
//! VRF-derived seed, tells a master when its next slot arrives, and
//! reports the activity updates and score increment the sealed block
//! must apply.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod scheduler;

pub use scheduler::{schedule_earliest, Proposer, Scheduler, SchedulerError};
