//! Bond Escrow
//!
//! Per-bidder collateral for one auction.
//!
//! ## Bond state machine
//!
//! ```text
//! [UNLOCKED] ──deposit──→ [LOCKED] ──lost──→ [REFUND_PENDING] ──refund──→ [REFUNDED]
//!                            │
//!                            └── won ──→ [AWAITING_FINAL_PAYMENT] ──paid──→ [APPLIED]
//!                                                  │
//!                                                  └── deadline passed ──→ [FORFEITED]
//! ```
//!
//! `REFUNDED`, `APPLIED` and `FORFEITED` are terminal. Refunds only happen on
//! an explicit call; forfeiture only after the payment deadline.

use super::settlement::SettlementResult;
use super::types::{Amount, AuctionId, BidderId, Timestamp};
use crate::error::{AuctionError, AuctionResult};
use crate::domain::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bond lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondState {
    Unlocked,
    Locked,
    RefundPending,
    AwaitingFinalPayment,
    Refunded,
    Applied,
    Forfeited,
}

impl BondState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BondState::Refunded | BondState::Applied | BondState::Forfeited
        )
    }
}

/// Collateral posted by one bidder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub bidder: BidderId,
    pub auction_id: AuctionId,
    pub amount: Amount,
    pub state: BondState,
    pub deposited_at: Timestamp,
    /// A payment confirmation is outstanding for this bond.
    #[serde(default)]
    pub payment_in_flight: bool,
}

impl Bond {
    fn new(auction_id: AuctionId, bidder: BidderId, amount: Amount, now: Timestamp) -> Self {
        Self {
            bidder,
            auction_id,
            amount,
            state: BondState::Unlocked,
            deposited_at: now,
            payment_in_flight: false,
        }
    }

    fn lock(mut self) -> Self {
        self.state = BondState::Locked;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.state == BondState::Locked
    }
}

/// How forfeited collateral is distributed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForfeiturePolicy {
    /// Split equally among non-winning bonded bidders.
    #[default]
    EqualSplit,
    /// Earmark the whole amount for an external distribution routine.
    External,
}

impl std::str::FromStr for ForfeiturePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal_split" | "equal-split" => Ok(ForfeiturePolicy::EqualSplit),
            "external" => Ok(ForfeiturePolicy::External),
            other => Err(format!("unknown forfeiture policy: {other}")),
        }
    }
}

/// One bidder's share of a forfeited bond.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForfeitShare {
    pub bidder: BidderId,
    pub amount: Amount,
}

/// Earmark created when the winner forfeits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForfeitureDistribution {
    pub forfeited_by: BidderId,
    pub amount: Amount,
    pub policy: ForfeiturePolicy,
    pub shares: Vec<ForfeitShare>,
    /// Left for the external routine (whole amount, or rounding dust).
    pub undistributed: Amount,
    pub forfeited_at: Timestamp,
}

/// Proof that the winner claimed the auctioned asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetClaim {
    pub auction_id: AuctionId,
    pub bidder: BidderId,
    pub claimed_at: Timestamp,
}

/// All bonds of one auction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondEscrow {
    bonds: BTreeMap<BidderId, Bond>,
    forfeiture: Option<ForfeitureDistribution>,
    asset_claim: Option<AssetClaim>,
}

impl BondEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bond(&self, bidder: &BidderId) -> Option<&Bond> {
        self.bonds.get(bidder)
    }

    pub fn bonds(&self) -> impl Iterator<Item = &Bond> {
        self.bonds.values()
    }

    pub fn forfeiture(&self) -> Option<&ForfeitureDistribution> {
        self.forfeiture.as_ref()
    }

    pub fn asset_claim(&self) -> Option<&AssetClaim> {
        self.asset_claim.as_ref()
    }

    pub fn has_locked_bond(&self, bidder: &BidderId) -> bool {
        self.bonds.get(bidder).is_some_and(Bond::is_locked)
    }

    pub fn ensure_not_bonded(&self, bidder: &BidderId) -> AuctionResult<()> {
        if self.bonds.contains_key(bidder) {
            return Err(AuctionError::AlreadyBonded {
                bidder: bidder.clone(),
            });
        }
        Ok(())
    }

    /// Lock a new bond. Phase checks belong to the caller.
    pub fn deposit(
        &mut self,
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
        now: Timestamp,
    ) -> AuctionResult<Bond> {
        self.ensure_not_bonded(&bidder)?;
        let bond = Bond::new(auction_id, bidder.clone(), amount, now).lock();
        self.bonds.insert(bidder, bond.clone());
        Ok(bond)
    }

    /// Move locked bonds according to the settlement outcome.
    pub fn apply_settlement(&mut self, result: &SettlementResult) {
        for bond in self.bonds.values_mut() {
            if bond.state != BondState::Locked {
                continue;
            }
            bond.state = if result.is_winner(&bond.bidder) {
                BondState::AwaitingFinalPayment
            } else {
                BondState::RefundPending
            };
        }
    }

    /// `REFUND_PENDING → REFUNDED`.
    pub fn refund(&mut self, bidder: &BidderId) -> AuctionResult<Bond> {
        match self.bonds.get_mut(bidder) {
            Some(bond) if bond.state == BondState::RefundPending => {
                bond.state = BondState::Refunded;
                Ok(bond.clone())
            }
            _ => Err(AuctionError::NotEligible {
                bidder: bidder.clone(),
                operation: "refund",
            }),
        }
    }

    /// Validate a final payment and mark it in flight.
    ///
    /// Returns the bond amount so the caller can report it.
    pub fn begin_final_payment(
        &mut self,
        bidder: &BidderId,
        amount: Amount,
        clearing_price: Amount,
        payment_deadline: Timestamp,
        now: Timestamp,
    ) -> AuctionResult<Amount> {
        let bond = self
            .bonds
            .get_mut(bidder)
            .ok_or_else(|| AuctionError::NoBond {
                bidder: bidder.clone(),
            })?;

        let payable = bond.state == BondState::AwaitingFinalPayment
            && !bond.payment_in_flight
            && now <= payment_deadline;
        if !payable {
            return Err(AuctionError::WrongPhase {
                operation: "pay_final",
                phase: Phase::Settled,
            });
        }

        let expected = clearing_price.saturating_sub(bond.amount);
        if amount != expected {
            return Err(AuctionError::WrongAmount {
                expected,
                actual: amount,
            });
        }

        bond.payment_in_flight = true;
        Ok(bond.amount)
    }

    /// Resolve an in-flight payment. Confirmed → `APPLIED`; otherwise the
    /// bond stays awaiting payment.
    pub fn complete_final_payment(&mut self, bidder: &BidderId, confirmed: bool) -> Option<Bond> {
        let bond = self.bonds.get_mut(bidder)?;
        if bond.state != BondState::AwaitingFinalPayment || !bond.payment_in_flight {
            return None;
        }
        bond.payment_in_flight = false;
        if confirmed {
            bond.state = BondState::Applied;
        }
        Some(bond.clone())
    }

    /// Forfeit the winner's bond once `now > payment_deadline`.
    ///
    /// Returns the earmark only on the transition.
    pub fn expire_if_unpaid(
        &mut self,
        payment_deadline: Timestamp,
        now: Timestamp,
        policy: ForfeiturePolicy,
    ) -> Option<ForfeitureDistribution> {
        if now <= payment_deadline || self.forfeiture.is_some() {
            return None;
        }

        let winner = self.bonds.values_mut().find(|b| {
            b.state == BondState::AwaitingFinalPayment && !b.payment_in_flight
        })?;
        winner.state = BondState::Forfeited;
        let forfeited_by = winner.bidder.clone();
        let amount = winner.amount;

        let recipients: Vec<BidderId> = self
            .bonds
            .values()
            .filter(|b| matches!(b.state, BondState::RefundPending | BondState::Refunded))
            .map(|b| b.bidder.clone())
            .collect();

        let (shares, undistributed) = match policy {
            ForfeiturePolicy::External => (Vec::new(), amount),
            ForfeiturePolicy::EqualSplit if recipients.is_empty() => (Vec::new(), amount),
            ForfeiturePolicy::EqualSplit => {
                let share = amount / recipients.len() as Amount;
                let shares = recipients
                    .into_iter()
                    .map(|bidder| ForfeitShare {
                        bidder,
                        amount: share,
                    })
                    .collect::<Vec<_>>();
                let dust = amount - share * shares.len() as Amount;
                (shares, dust)
            }
        };

        let distribution = ForfeitureDistribution {
            forfeited_by,
            amount,
            policy,
            shares,
            undistributed,
            forfeited_at: now,
        };
        self.forfeiture = Some(distribution.clone());
        Some(distribution)
    }

    /// Hand the asset to the winner whose bond was applied. Once only.
    pub fn claim_asset(
        &mut self,
        auction_id: AuctionId,
        bidder: &BidderId,
        now: Timestamp,
    ) -> AuctionResult<AssetClaim> {
        let applied = self
            .bonds
            .get(bidder)
            .is_some_and(|b| b.state == BondState::Applied);
        if !applied || self.asset_claim.is_some() {
            return Err(AuctionError::NotEligible {
                bidder: bidder.clone(),
                operation: "claim_asset",
            });
        }
        let claim = AssetClaim {
            auction_id,
            bidder: bidder.clone(),
            claimed_at: now,
        };
        self.asset_claim = Some(claim.clone());
        Ok(claim)
    }
}
