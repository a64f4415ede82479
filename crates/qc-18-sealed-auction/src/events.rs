//! Lifecycle events emitted by the coordinator.
//!
//! Events are published after the auction lock is released. They never carry
//! a bid amount; the only price that leaves the coordinator is the clearing
//! price.

use crate::domain::{
    Amount, AuctionId, BidderId, ForfeitureDistribution, Phase, PricingRule, Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionEvent {
    AuctionCreated {
        auction_id: AuctionId,
        pricing_rule: PricingRule,
        commit_deadline: Timestamp,
        reveal_deadline: Timestamp,
    },
    /// Observed forward transition. A scheduler that slept through a phase
    /// reports a single jump.
    PhaseChanged {
        auction_id: AuctionId,
        from: Phase,
        to: Phase,
        observed_at: Timestamp,
    },
    BondDeposited {
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
    },
    CommitAccepted {
        auction_id: AuctionId,
        bidder: BidderId,
        commit_count: u64,
    },
    CommitRejected {
        auction_id: AuctionId,
        bidder: BidderId,
        reason: String,
    },
    AuctionSettled {
        auction_id: AuctionId,
        winner: Option<BidderId>,
        clearing_price: Option<Amount>,
    },
    BondRefunded {
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
    },
    FinalPaymentApplied {
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
    },
    BondForfeited {
        auction_id: AuctionId,
        distribution: ForfeitureDistribution,
    },
    AssetClaimed {
        auction_id: AuctionId,
        bidder: BidderId,
    },
}

impl AuctionEvent {
    pub fn auction_id(&self) -> AuctionId {
        match self {
            AuctionEvent::AuctionCreated { auction_id, .. }
            | AuctionEvent::PhaseChanged { auction_id, .. }
            | AuctionEvent::BondDeposited { auction_id, .. }
            | AuctionEvent::CommitAccepted { auction_id, .. }
            | AuctionEvent::CommitRejected { auction_id, .. }
            | AuctionEvent::AuctionSettled { auction_id, .. }
            | AuctionEvent::BondRefunded { auction_id, .. }
            | AuctionEvent::FinalPaymentApplied { auction_id, .. }
            | AuctionEvent::BondForfeited { auction_id, .. }
            | AuctionEvent::AssetClaimed { auction_id, .. } => *auction_id,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuctionEvent::AuctionCreated { .. } => "auction_created",
            AuctionEvent::PhaseChanged { .. } => "phase_changed",
            AuctionEvent::BondDeposited { .. } => "bond_deposited",
            AuctionEvent::CommitAccepted { .. } => "commit_accepted",
            AuctionEvent::CommitRejected { .. } => "commit_rejected",
            AuctionEvent::AuctionSettled { .. } => "auction_settled",
            AuctionEvent::BondRefunded { .. } => "bond_refunded",
            AuctionEvent::FinalPaymentApplied { .. } => "final_payment_applied",
            AuctionEvent::BondForfeited { .. } => "bond_forfeited",
            AuctionEvent::AssetClaimed { .. } => "asset_claimed",
        }
    }
}
