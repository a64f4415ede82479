//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Capabilities the coordinator consumes but does not implement. Proof
//! verification and payment confirmation may be slow or fail; the service
//! never holds an auction lock while awaiting them.

use crate::domain::{Amount, Auction, AuctionId, BidderId, SealedBid, Timestamp};
use crate::events::AuctionEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Failure of an external capability call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("capability unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("capability timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

/// Snapshot persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("snapshot directory already in use: {path}")]
    Locked { path: String },

    #[error("snapshot task failed: {reason}")]
    Task { reason: String },
}

/// Verifies that a sealed commitment is backed by a valid proof.
///
/// Called while the commitment is `PENDING`.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify_proof(
        &self,
        auction_id: AuctionId,
        bidder: &BidderId,
        sealed: &SealedBid,
    ) -> Result<bool, CapabilityError>;
}

/// Confirms the winner's final payment.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm_payment(
        &self,
        auction_id: AuctionId,
        bidder: &BidderId,
        amount: Amount,
    ) -> Result<bool, CapabilityError>;
}

/// Time source for consistent timestamp handling.
///
/// Read once per logical evaluation so a single call never sees two phases.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Lifecycle event sink. Must not block.
pub trait AuctionEventPublisher: Send + Sync {
    /// Returns the number of subscribers that received the event.
    fn publish(&self, event: AuctionEvent) -> usize;
}

/// Durable auction records.
///
/// One record per auction; a save carrying a lower revision than the stored
/// one is ignored.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, auction: &Auction) -> Result<(), StoreError>;

    async fn load_all(&self) -> Result<Vec<Auction>, StoreError>;
}
