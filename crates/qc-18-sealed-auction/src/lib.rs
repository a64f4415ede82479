//! # qc-18-sealed-auction
//!
//! Sealed-bid auction lifecycle coordinator.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Phase clock**: COMMIT_OPEN → REVEAL_OPEN → SETTLED, derived from two
//!   absolute deadlines and the current time
//! - **Commit ledger**: one sealed commitment per bonded bidder, verified
//!   asynchronously, with an authoritative valid-commitment counter
//! - **Bond escrow**: deposit, refund, final payment and forfeiture of bidder
//!   collateral
//! - **Settlement**: deterministic first-price or Vickrey winner and
//!   clearing price, computed exactly once
//!
//! ## Architecture
//!
//! ```text
//! CLI / API / UI ──AuctionApi──→ AuctionService ──→ AuctionRegistry ──→ Auction (per-auction lock)
//!                                     │
//!                                     ├── ProofVerifier / PaymentGateway (awaited unlocked)
//!                                     ├── SnapshotStore (one record per auction)
//!                                     └── AuctionEventPublisher (after unlock)
//!
//! PhaseScheduler ──tick──→ settlement + forfeiture
//! ```
//!
//! ## Bond Lifecycle
//!
//! ```text
//! [UNLOCKED] ──deposit──→ [LOCKED] ──settle──→ [REFUND_PENDING] ──refund──→ [REFUNDED]
//!                             │
//!                             └──settle (winner)──→ [AWAITING_FINAL_PAYMENT] ──pay_final──→ [APPLIED]
//!                                                          │
//!                                                          └──deadline passed──→ [FORFEITED]
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use qc_18_sealed_auction::{AuctionService, AuctionConfig, AuctionDependencies};
//! use qc_18_sealed_auction::ports::inbound::AuctionApi;
//!
//! let service = AuctionService::new(AuctionConfig::default(), deps);
//! let id = service.create_auction(request).await?;
//! service.deposit(id, bidder.clone()).await?;
//! let status = service.commit(id, bidder, 120).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use config::{AuctionConfig, ConfigError};
pub use domain::{
    phase_at, Amount, AssetClaim, Auction, AuctionId, AuctionMetadata, AuctionSchedule,
    AuctionTerms, BidderId, Bond, BondState, CommitStatus, ForfeiturePolicy,
    ForfeitureDistribution, Phase, PhaseSnapshot, PricingRule, SealedBid, SettlementEngine,
    SettlementResult, Timestamp,
};
pub use error::{AuctionError, AuctionResult};
pub use events::AuctionEvent;
pub use registry::AuctionRegistry;
pub use scheduler::{NetworkActivitySimulator, PhaseScheduler};
pub use service::{AuctionDependencies, AuctionService};
