//! Ports module for the auction subsystem

pub mod inbound;
pub mod outbound;

pub use inbound::{
    AuctionApi, AuctionFilter, AuctionSummary, CommitCounts, CreateAuctionRequest, ResultView,
    TickReport,
};
pub use outbound::{
    AuctionEventPublisher, CapabilityError, PaymentGateway, ProofVerifier, SnapshotStore,
    StoreError, SystemTimeSource, TimeSource,
};
