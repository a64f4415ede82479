//! Commitment Ledger
//!
//! Per-auction registry of sealed commitments plus the authoritative
//! commitment counter.
//!
//! ## Commitment state machine
//!
//! ```text
//! [NONE] ──reserve──→ [PENDING] ──verified──→ [VALID]
//!                         │
//!                         └── rejected ──→ [REJECTED] ──reserve (caller retry)──→ [PENDING]
//! ```
//!
//! INVARIANT-1: at most one active (pending or valid) commitment per bidder.
//! INVARIANT-2: `VALID` is final; it never returns to `PENDING`.
//! INVARIANT-3: `commit_count` is incremented in the same step that marks a
//! commitment `VALID`, so it always equals the number of valid commitments.

use super::settlement::RevealedBid;
use super::types::{Amount, AuctionId, BidderId, Timestamp};
use crate::error::{AuctionError, AuctionResult};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;
use std::fmt;

/// Commitment submission status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    /// No commitment submitted.
    None,
    /// Awaiting proof verification.
    Pending,
    /// Verified and counted.
    Valid,
    /// Verification failed or arrived too late.
    Rejected,
}

/// A bid amount hidden behind a Keccak-256 commitment.
///
/// The digest binds auction, bidder, amount and salt. The amount is only read
/// by settlement; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBid {
    amount: Amount,
    salt: [u8; 32],
    digest: [u8; 32],
}

impl SealedBid {
    /// Seal `amount` for `bidder` in `auction_id` using `salt`.
    pub fn seal(auction_id: &AuctionId, bidder: &BidderId, amount: Amount, salt: [u8; 32]) -> Self {
        let digest = Self::compute_digest(auction_id, bidder, amount, &salt);
        Self {
            amount,
            salt,
            digest,
        }
    }

    fn compute_digest(
        auction_id: &AuctionId,
        bidder: &BidderId,
        amount: Amount,
        salt: &[u8; 32],
    ) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(auction_id.as_bytes());
        hasher.update((bidder.as_str().len() as u64).to_be_bytes());
        hasher.update(bidder.as_str().as_bytes());
        hasher.update(amount.to_be_bytes());
        hasher.update(salt);
        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        digest
    }

    /// Public commitment value.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Recompute the digest and compare. A tampered amount or salt fails.
    pub fn matches(&self, auction_id: &AuctionId, bidder: &BidderId) -> bool {
        Self::compute_digest(auction_id, bidder, self.amount, &self.salt) == self.digest
    }

    /// Reveal the committed amount.
    pub fn reveal(&self) -> Amount {
        self.amount
    }
}

impl fmt::Debug for SealedBid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedBid")
            .field("digest", &format_args!("0x{}", hex_prefix(&self.digest)))
            .field("amount", &"<sealed>")
            .finish()
    }
}

fn hex_prefix(bytes: &[u8; 32]) -> String {
    bytes[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// One bidder's commitment in one auction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub bidder: BidderId,
    /// A locked bond existed when the commitment was reserved.
    pub bonded: bool,
    pub sealed: SealedBid,
    pub status: CommitStatus,
    /// Submission time (tie-break input).
    pub submitted_at: Timestamp,
    /// Per-auction submission order (final tie-break input).
    pub sequence: u64,
}

/// Handle returned by `reserve`, required to finalize the same attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitTicket {
    pub bidder: BidderId,
    pub sequence: u64,
}

/// Commitment registry for one auction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLedger {
    commitments: BTreeMap<BidderId, Commitment>,
    commit_count: u64,
    next_sequence: u64,
}

impl CommitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, bidder: &BidderId) -> CommitStatus {
        self.commitments
            .get(bidder)
            .map(|c| c.status)
            .unwrap_or(CommitStatus::None)
    }

    /// Authoritative count of valid commitments.
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    pub fn get(&self, bidder: &BidderId) -> Option<&Commitment> {
        self.commitments.get(bidder)
    }

    /// Check INVARIANT-1 without mutating.
    pub fn ensure_can_commit(&self, bidder: &BidderId) -> AuctionResult<()> {
        match self.status(bidder) {
            CommitStatus::Pending | CommitStatus::Valid => Err(AuctionError::DuplicateCommit {
                bidder: bidder.clone(),
            }),
            CommitStatus::None | CommitStatus::Rejected => Ok(()),
        }
    }

    /// Record a pending commitment. Caller must have passed `ensure_can_commit`.
    pub fn reserve(&mut self, bidder: BidderId, sealed: SealedBid, now: Timestamp) -> AuctionResult<CommitTicket> {
        self.ensure_can_commit(&bidder)?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.commitments.insert(
            bidder.clone(),
            Commitment {
                bidder: bidder.clone(),
                bonded: true,
                sealed,
                status: CommitStatus::Pending,
                submitted_at: now,
                sequence,
            },
        );
        Ok(CommitTicket { bidder, sequence })
    }

    fn pending_mut(&mut self, ticket: &CommitTicket) -> Option<&mut Commitment> {
        self.commitments
            .get_mut(&ticket.bidder)
            .filter(|c| c.sequence == ticket.sequence && c.status == CommitStatus::Pending)
    }

    /// Mark the reserved attempt valid and count it.
    ///
    /// Returns `false` if the ticket no longer refers to a pending attempt.
    pub fn mark_valid(&mut self, ticket: &CommitTicket) -> bool {
        match self.pending_mut(ticket) {
            Some(commitment) => {
                commitment.status = CommitStatus::Valid;
                self.commit_count += 1;
                true
            }
            None => false,
        }
    }

    /// Mark the reserved attempt rejected. Leaves the counter untouched.
    pub fn mark_rejected(&mut self, ticket: &CommitTicket) -> bool {
        match self.pending_mut(ticket) {
            Some(commitment) => {
                commitment.status = CommitStatus::Rejected;
                true
            }
            None => false,
        }
    }

    /// Valid commitments with their revealed amounts.
    pub fn revealed_bids(&self) -> Vec<RevealedBid> {
        self.commitments
            .values()
            .filter(|c| c.status == CommitStatus::Valid)
            .map(|c| RevealedBid {
                bidder: c.bidder.clone(),
                amount: c.sealed.reveal(),
                committed_at: c.submitted_at,
                sequence: c.sequence,
            })
            .collect()
    }

    pub fn valid_count(&self) -> u64 {
        self.commitments
            .values()
            .filter(|c| c.status == CommitStatus::Valid)
            .count() as u64
    }
}
