//! Auction aggregate
//!
//! Root entity owning the commitment ledger, the bond escrow and the cached
//! settlement result. Every mutating method checks all of its preconditions
//! before touching state, so a rejected call leaves the aggregate unchanged.
//!
//! The aggregate is synchronous and performs no I/O. External round trips
//! (proof verification, payment confirmation) are split into a `begin`/`reserve`
//! step and a completion step so the caller can release the auction lock
//! while waiting.

use super::escrow::{AssetClaim, Bond, BondEscrow, ForfeiturePolicy, ForfeitureDistribution};
use super::ledger::{CommitLedger, CommitStatus, CommitTicket, SealedBid};
use super::phase::{AuctionSchedule, Phase, PhaseSnapshot};
use super::settlement::{SettlementEngine, SettlementResult};
use super::types::{
    Amount, AuctionId, AuctionMetadata, AuctionTerms, BidderId, Timestamp, BPS_DENOMINATOR,
};
use crate::error::{AuctionError, AuctionResult};
use serde::{Deserialize, Serialize};

/// Result of the asynchronous proof check for a reserved commitment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Rejected { reason: String },
}

/// One sealed-bid auction.
///
/// Persisted as a single record: commitments and bonds are embedded maps
/// keyed by bidder, the settlement result sits alongside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    id: AuctionId,
    terms: AuctionTerms,
    metadata: AuctionMetadata,
    schedule: AuctionSchedule,
    bond_amount: Amount,
    created_at: Timestamp,
    ledger: CommitLedger,
    escrow: BondEscrow,
    result: Option<SettlementResult>,
    /// Bumped on every mutation; lets stores drop stale snapshots.
    revision: u64,
}

impl Auction {
    /// Validate terms and build a fresh auction.
    pub fn new(
        id: AuctionId,
        terms: AuctionTerms,
        metadata: AuctionMetadata,
        schedule: AuctionSchedule,
        bond_rate_bps: u32,
        now: Timestamp,
    ) -> AuctionResult<Self> {
        validate_terms(&terms, &metadata)?;
        // Bids never clear below the minimum, so the bond never exceeds the
        // final price.
        if bond_rate_bps as Amount > BPS_DENOMINATOR {
            return Err(AuctionError::InvalidTerms {
                reason: format!("bond rate {bond_rate_bps} bps exceeds 100%"),
            });
        }
        let bond_amount = terms
            .minimum_price
            .checked_mul(bond_rate_bps as Amount)
            .map(|v| v / BPS_DENOMINATOR)
            .ok_or_else(|| AuctionError::InvalidTerms {
                reason: format!("bond for minimum price {} overflows", terms.minimum_price),
            })?;

        Ok(Self {
            id,
            terms,
            metadata,
            schedule,
            bond_amount,
            created_at: now,
            ledger: CommitLedger::new(),
            escrow: BondEscrow::new(),
            result: None,
            revision: 0,
        })
    }

    pub fn id(&self) -> AuctionId {
        self.id
    }

    pub fn terms(&self) -> &AuctionTerms {
        &self.terms
    }

    pub fn metadata(&self) -> &AuctionMetadata {
        &self.metadata
    }

    pub fn schedule(&self) -> AuctionSchedule {
        self.schedule
    }

    pub fn bond_amount(&self) -> Amount {
        self.bond_amount
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn ledger(&self) -> &CommitLedger {
        &self.ledger
    }

    pub fn escrow(&self) -> &BondEscrow {
        &self.escrow
    }

    pub fn result(&self) -> Option<&SettlementResult> {
        self.result.as_ref()
    }

    pub fn phase(&self, now: Timestamp) -> PhaseSnapshot {
        self.schedule.phase_at(now)
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn require_phase(&self, operation: &'static str, expected: Phase, now: Timestamp) -> AuctionResult<()> {
        let phase = self.phase(now).phase;
        if phase != expected {
            return Err(AuctionError::WrongPhase { operation, phase });
        }
        Ok(())
    }

    /// Lock a bond for `bidder`. COMMIT_OPEN only.
    pub fn deposit(&mut self, bidder: BidderId, now: Timestamp) -> AuctionResult<Bond> {
        self.require_phase("deposit", Phase::CommitOpen, now)?;
        let bond = self.escrow.deposit(self.id, bidder, self.bond_amount, now)?;
        self.touch();
        Ok(bond)
    }

    /// First half of `commit`: validate and record a pending commitment.
    pub fn reserve_commit(
        &mut self,
        bidder: BidderId,
        sealed: SealedBid,
        now: Timestamp,
    ) -> AuctionResult<CommitTicket> {
        self.require_phase("commit", Phase::CommitOpen, now)?;
        if !self.escrow.has_locked_bond(&bidder) {
            return Err(AuctionError::NoBond { bidder });
        }
        self.ledger.ensure_can_commit(&bidder)?;
        let amount = sealed.reveal();
        if amount < self.terms.minimum_price {
            return Err(AuctionError::BelowMinimum {
                amount,
                minimum: self.terms.minimum_price,
            });
        }
        let ticket = self.ledger.reserve(bidder, sealed, now)?;
        self.touch();
        Ok(ticket)
    }

    /// Second half of `commit`: apply the verification outcome.
    ///
    /// A commitment whose proof returns after the commit deadline is rejected
    /// with `WrongPhase`; the counter only moves on success.
    pub fn finalize_commit(
        &mut self,
        ticket: &CommitTicket,
        outcome: VerificationOutcome,
        now: Timestamp,
    ) -> AuctionResult<CommitStatus> {
        let phase = self.phase(now).phase;
        let result = match outcome {
            VerificationOutcome::Verified if phase == Phase::CommitOpen => {
                if self.ledger.mark_valid(ticket) {
                    Ok(CommitStatus::Valid)
                } else {
                    Err(AuctionError::DuplicateCommit {
                        bidder: ticket.bidder.clone(),
                    })
                }
            }
            VerificationOutcome::Verified => {
                self.ledger.mark_rejected(ticket);
                Err(AuctionError::WrongPhase {
                    operation: "commit",
                    phase,
                })
            }
            VerificationOutcome::Rejected { reason } => {
                self.ledger.mark_rejected(ticket);
                Err(AuctionError::VerificationFailed { reason })
            }
        };
        self.touch();
        result
    }

    /// Check-and-set settlement. Computes the result the first time the
    /// auction is observed SETTLED and returns it; `None` otherwise.
    pub fn settle_if_due(&mut self, now: Timestamp, payment_window_ms: u64) -> Option<SettlementResult> {
        if self.result.is_some() || self.phase(now).phase != Phase::Settled {
            return None;
        }
        let result = SettlementEngine::settle(
            self.terms.pricing_rule,
            &self.ledger.revealed_bids(),
            self.schedule.reveal_deadline(),
            payment_window_ms,
        );
        self.escrow.apply_settlement(&result);
        self.result = Some(result.clone());
        self.touch();
        Some(result)
    }

    /// Release a losing bidder's bond.
    pub fn refund(&mut self, bidder: &BidderId) -> AuctionResult<Bond> {
        let bond = self.escrow.refund(bidder)?;
        self.touch();
        Ok(bond)
    }

    /// First half of `pay_final`: validate and mark the payment in flight.
    pub fn begin_final_payment(
        &mut self,
        bidder: &BidderId,
        amount: Amount,
        now: Timestamp,
    ) -> AuctionResult<()> {
        self.require_phase("pay_final", Phase::Settled, now)?;
        let (clearing_price, deadline) = match &self.result {
            Some(SettlementResult {
                clearing_price: Some(price),
                payment_deadline: Some(deadline),
                ..
            }) => (*price, *deadline),
            _ => {
                return Err(AuctionError::WrongPhase {
                    operation: "pay_final",
                    phase: Phase::Settled,
                })
            }
        };
        self.escrow
            .begin_final_payment(bidder, amount, clearing_price, deadline, now)?;
        self.touch();
        Ok(())
    }

    /// Second half of `pay_final`.
    pub fn complete_final_payment(&mut self, bidder: &BidderId, confirmed: bool) -> Option<Bond> {
        let bond = self.escrow.complete_final_payment(bidder, confirmed)?;
        self.touch();
        Some(bond)
    }

    /// Forfeit the winner's bond if the payment window has closed.
    pub fn expire_if_unpaid(
        &mut self,
        now: Timestamp,
        policy: ForfeiturePolicy,
    ) -> Option<ForfeitureDistribution> {
        let deadline = self.result.as_ref()?.payment_deadline?;
        let distribution = self.escrow.expire_if_unpaid(deadline, now, policy)?;
        self.touch();
        Some(distribution)
    }

    pub fn claim_asset(&mut self, bidder: &BidderId, now: Timestamp) -> AuctionResult<AssetClaim> {
        let claim = self.escrow.claim_asset(self.id, bidder, now)?;
        self.touch();
        Ok(claim)
    }
}

fn validate_terms(terms: &AuctionTerms, metadata: &AuctionMetadata) -> AuctionResult<()> {
    let reason = if terms.minimum_price == 0 {
        "minimum price must be positive"
    } else if terms.currency.trim().is_empty() {
        "currency code is required"
    } else if terms.asset_chain.trim().is_empty() {
        "asset chain is required"
    } else if metadata.title.trim().is_empty() {
        "title is required"
    } else if metadata.image_urls.iter().all(|url| url.trim().is_empty()) {
        "at least one image URL is required"
    } else {
        return Ok(());
    };
    Err(AuctionError::InvalidTerms {
        reason: reason.to_string(),
    })
}
