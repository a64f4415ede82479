//! Settlement Engine
//!
//! Winner determination and clearing price from revealed bids.
//!
//! - First-price: winner pays their bid
//! - Vickrey: winner pays the second-highest bid (their own with a single bid)
//!
//! Ties on amount go to the earliest commitment, then to the lowest
//! submission sequence. The engine is a pure function of its input; it never
//! consults an entropy source, so recomputation is bit-identical.

use super::types::{Amount, BidderId, PricingRule, Timestamp};
use serde::{Deserialize, Serialize};

/// A valid commitment with its amount revealed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealedBid {
    pub bidder: BidderId,
    pub amount: Amount,
    pub committed_at: Timestamp,
    pub sequence: u64,
}

/// Outcome of an auction. Computed once, immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub pricing_rule: PricingRule,
    /// `None` when no valid commitment existed.
    pub winner: Option<BidderId>,
    /// Price the winner owes in total (bond included).
    pub clearing_price: Option<Amount>,
    /// Number of valid bids considered.
    pub valid_bids: u32,
    /// Settlement instant (the reveal deadline).
    pub settled_at: Timestamp,
    /// Final payment deadline for the winner.
    pub payment_deadline: Option<Timestamp>,
}

impl SettlementResult {
    pub fn has_winner(&self) -> bool {
        self.winner.is_some()
    }

    pub fn is_winner(&self, bidder: &BidderId) -> bool {
        self.winner.as_ref() == Some(bidder)
    }
}

/// Stateless settlement computation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SettlementEngine;

impl SettlementEngine {
    /// Compute the result for `bids` under `rule`.
    ///
    /// `settled_at` is the reveal deadline; the winner's payment deadline is
    /// `settled_at + payment_window_ms`.
    pub fn settle(
        rule: PricingRule,
        bids: &[RevealedBid],
        settled_at: Timestamp,
        payment_window_ms: u64,
    ) -> SettlementResult {
        let ranked = Self::rank(bids);

        let Some(top) = ranked.first() else {
            return SettlementResult {
                pricing_rule: rule,
                winner: None,
                clearing_price: None,
                valid_bids: 0,
                settled_at,
                payment_deadline: None,
            };
        };

        let clearing_price = match rule {
            PricingRule::FirstPrice => top.amount,
            PricingRule::Vickrey => ranked.get(1).map(|b| b.amount).unwrap_or(top.amount),
        };

        SettlementResult {
            pricing_rule: rule,
            winner: Some(top.bidder.clone()),
            clearing_price: Some(clearing_price),
            valid_bids: ranked.len() as u32,
            settled_at,
            payment_deadline: Some(settled_at.saturating_add(payment_window_ms)),
        }
    }

    /// Sort by amount descending, then commit time, then sequence.
    fn rank(bids: &[RevealedBid]) -> Vec<&RevealedBid> {
        let mut ranked: Vec<&RevealedBid> = bids.iter().collect();
        ranked.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then(a.committed_at.cmp(&b.committed_at))
                .then(a.sequence.cmp(&b.sequence))
        });
        ranked
    }
}
