//! Domain module for the sealed-bid auction subsystem
//!
//! Pure, synchronous business logic. No locks, no I/O, no clocks: every
//! function that depends on time takes `now` as an argument.
//!
//! ## Core Modules
//! - types: identifiers, amounts, terms
//! - phase: PhaseClock and validated schedules
//! - ledger: sealed commitments and the authoritative counter
//! - escrow: bond state machine, forfeiture and asset claim
//! - settlement: deterministic winner and clearing price
//! - auction: aggregate tying the above together

pub mod auction;
pub mod escrow;
pub mod ledger;
pub mod phase;
pub mod settlement;
pub mod types;

pub use auction::{Auction, VerificationOutcome};
pub use escrow::{
    AssetClaim, Bond, BondEscrow, BondState, ForfeitShare, ForfeiturePolicy,
    ForfeitureDistribution,
};
pub use ledger::{CommitLedger, CommitStatus, CommitTicket, Commitment, SealedBid};
pub use phase::{phase_at, AuctionSchedule, Phase, PhaseSnapshot};
pub use settlement::{RevealedBid, SettlementEngine, SettlementResult};
pub use types::{
    Amount, AuctionId, AuctionMetadata, AuctionTerms, BidderId, PricingRule, Timestamp,
    BPS_DENOMINATOR,
};
