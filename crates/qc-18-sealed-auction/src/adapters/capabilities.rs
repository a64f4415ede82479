//! Local proof verifier and payment gateway.
//!
//! Stand-ins for the external services, used by the runtime's development
//! mode and by integration tests.

use crate::domain::{Amount, AuctionId, BidderId, SealedBid, Timestamp};
use crate::ports::outbound::{CapabilityError, PaymentGateway, ProofVerifier, TimeSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Accepts a commitment when its digest binds the auction and bidder.
#[derive(Debug, Default)]
pub struct DigestProofVerifier {
    latency: Option<Duration>,
}

impl DigestProofVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a slow verifier.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
        }
    }
}

#[async_trait]
impl ProofVerifier for DigestProofVerifier {
    async fn verify_proof(
        &self,
        auction_id: AuctionId,
        bidder: &BidderId,
        sealed: &SealedBid,
    ) -> Result<bool, CapabilityError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let ok = sealed.matches(&auction_id, bidder);
        debug!(%auction_id, %bidder, ok, "sealed bid verified");
        Ok(ok)
    }
}

/// Confirmed payment, as recorded by `RecordingPaymentGateway`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRecord {
    pub auction_id: AuctionId,
    pub bidder: BidderId,
    pub amount: Amount,
    pub confirmed_at: Timestamp,
}

/// Confirms every payment and keeps a ledger of them.
pub struct RecordingPaymentGateway<T: TimeSource + 'static> {
    clock: Arc<T>,
    records: Mutex<Vec<PaymentRecord>>,
}

impl<T: TimeSource + 'static> RecordingPaymentGateway<T> {
    pub fn new(clock: Arc<T>) -> Self {
        Self {
            clock,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<PaymentRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl<T: TimeSource + 'static> PaymentGateway for RecordingPaymentGateway<T> {
    async fn confirm_payment(
        &self,
        auction_id: AuctionId,
        bidder: &BidderId,
        amount: Amount,
    ) -> Result<bool, CapabilityError> {
        self.records.lock().push(PaymentRecord {
            auction_id,
            bidder: bidder.clone(),
            amount,
            confirmed_at: self.clock.now(),
        });
        Ok(true)
    }
}
