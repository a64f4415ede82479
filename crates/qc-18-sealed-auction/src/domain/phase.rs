//! Phase Clock
//!
//! The lifecycle phase is a pure function of the two absolute deadlines and
//! the current time. It is re-derived on every evaluation, so a paused
//! process or a late scheduler tick lands in the correct phase as soon as it
//! looks again.
//!
//! ```text
//!            commit_deadline          reveal_deadline
//!                  │                         │
//! [COMMIT_OPEN] ───┼──── [REVEAL_OPEN] ──────┼──── [SETTLED]
//!   now < c        │     c <= now < r        │     now >= r
//! ```
//!
//! Boundary instants belong to the later phase.

use super::types::Timestamp;
use crate::error::{AuctionError, AuctionResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Auction lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Bonded bidders may submit sealed commitments.
    CommitOpen,
    /// Commitments are closed; bids are being revealed.
    RevealOpen,
    /// Reveal deadline passed; the result is (or is about to be) fixed.
    Settled,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::CommitOpen => "COMMIT_OPEN",
            Phase::RevealOpen => "REVEAL_OPEN",
            Phase::Settled => "SETTLED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase plus milliseconds until the phase ends (0 once settled).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub phase: Phase,
    pub time_left_ms: u64,
}

/// Derive the phase at `now`. Total for every input.
pub fn phase_at(now: Timestamp, commit_deadline: Timestamp, reveal_deadline: Timestamp) -> PhaseSnapshot {
    if now < commit_deadline {
        PhaseSnapshot {
            phase: Phase::CommitOpen,
            time_left_ms: commit_deadline - now,
        }
    } else if now < reveal_deadline {
        PhaseSnapshot {
            phase: Phase::RevealOpen,
            time_left_ms: reveal_deadline - now,
        }
    } else {
        PhaseSnapshot {
            phase: Phase::Settled,
            time_left_ms: 0,
        }
    }
}

/// Validated pair of deadlines.
///
/// INVARIANT: `commit_deadline < reveal_deadline`. Immutable after creation.
/// Also enforced when deserializing a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredSchedule")]
pub struct AuctionSchedule {
    commit_deadline: Timestamp,
    reveal_deadline: Timestamp,
}

#[derive(Deserialize)]
struct StoredSchedule {
    commit_deadline: Timestamp,
    reveal_deadline: Timestamp,
}

impl TryFrom<StoredSchedule> for AuctionSchedule {
    type Error = String;

    // Restored deadlines may already lie in the past; only the ordering is checked.
    fn try_from(stored: StoredSchedule) -> Result<Self, Self::Error> {
        if stored.commit_deadline >= stored.reveal_deadline {
            return Err(format!(
                "commit deadline {} is not before reveal deadline {}",
                stored.commit_deadline, stored.reveal_deadline
            ));
        }
        Ok(Self {
            commit_deadline: stored.commit_deadline,
            reveal_deadline: stored.reveal_deadline,
        })
    }
}

impl AuctionSchedule {
    /// Validate deadlines against `now`.
    ///
    /// # Errors
    /// `InvalidTiming` if the commit deadline is not strictly before the
    /// reveal deadline, or if the commit deadline is not in the future.
    pub fn new(
        commit_deadline: Timestamp,
        reveal_deadline: Timestamp,
        now: Timestamp,
    ) -> AuctionResult<Self> {
        if commit_deadline >= reveal_deadline || commit_deadline <= now {
            return Err(AuctionError::InvalidTiming {
                commit_deadline,
                reveal_deadline,
                now,
            });
        }
        Ok(Self {
            commit_deadline,
            reveal_deadline,
        })
    }

    pub fn commit_deadline(&self) -> Timestamp {
        self.commit_deadline
    }

    pub fn reveal_deadline(&self) -> Timestamp {
        self.reveal_deadline
    }

    pub fn phase_at(&self, now: Timestamp) -> PhaseSnapshot {
        phase_at(now, self.commit_deadline, self.reveal_deadline)
    }

    pub fn is_ended(&self, now: Timestamp) -> bool {
        now >= self.reveal_deadline
    }
}
