//! Driving Ports (API - Inbound)
//!
//! The surface CLI, API and UI layers call. Rejections carry a distinct
//! `AuctionError` kind; normal lifecycle states (result still pending) are
//! values, not errors.

use crate::domain::{
    Amount, AssetClaim, AuctionId, AuctionMetadata, AuctionTerms, BidderId, Bond, CommitStatus,
    ForfeitureDistribution, PhaseSnapshot, SettlementResult, Timestamp,
};
use crate::error::AuctionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Input to `create_auction`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAuctionRequest {
    pub terms: AuctionTerms,
    pub metadata: AuctionMetadata,
    pub commit_deadline: Timestamp,
    pub reveal_deadline: Timestamp,
}

/// `get_result` answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultView {
    /// Reveal deadline not reached yet.
    Pending,
    Settled(SettlementResult),
}

impl ResultView {
    pub fn settled(&self) -> Option<&SettlementResult> {
        match self {
            ResultView::Pending => None,
            ResultView::Settled(result) => Some(result),
        }
    }
}

/// The two commitment numbers, kept apart on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCounts {
    /// Authoritative number of valid commitments.
    pub valid_commitments: u64,
    /// Synthetic network-activity statistic. Display only; not a bid count.
    pub network_activity: u64,
}

/// Listing filter (explore view).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionFilter {
    /// Reveal deadline still ahead.
    Active,
    /// Reveal deadline passed.
    Ended,
    #[default]
    All,
}

/// Listing row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: AuctionId,
    pub title: String,
    pub cover_image: Option<String>,
    pub terms: AuctionTerms,
    pub phase: PhaseSnapshot,
    pub reveal_deadline: Timestamp,
    pub counts: CommitCounts,
}

/// What one scheduler evaluation changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub phase_changes: usize,
    pub settled: usize,
    pub forfeited: usize,
}

impl TickReport {
    pub fn has_changes(&self) -> bool {
        self.phase_changes + self.settled + self.forfeited > 0
    }
}

/// Primary auction API
#[async_trait]
pub trait AuctionApi: Send + Sync {
    /// Create an auction. `InvalidTiming` / `InvalidTerms` on bad input.
    async fn create_auction(&self, request: CreateAuctionRequest) -> AuctionResult<AuctionId>;

    /// Current phase and time left, derived from absolute deadlines.
    async fn get_phase(&self, auction_id: AuctionId) -> AuctionResult<PhaseSnapshot>;

    /// Lock a bond. COMMIT_OPEN only.
    async fn deposit(&self, auction_id: AuctionId, bidder: BidderId) -> AuctionResult<Bond>;

    /// Seal and submit a bid; resolves once the proof check returns.
    async fn commit(
        &self,
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
    ) -> AuctionResult<CommitStatus>;

    /// Release a losing bidder's bond.
    async fn refund(&self, auction_id: AuctionId, bidder: BidderId) -> AuctionResult<Bond>;

    /// Winner pays `clearing_price - bond`.
    async fn pay_final(
        &self,
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
    ) -> AuctionResult<Bond>;

    /// Settlement result, or `Pending` before the reveal deadline.
    async fn get_result(&self, auction_id: AuctionId) -> AuctionResult<ResultView>;

    async fn aggregate_count(&self, auction_id: AuctionId) -> AuctionResult<CommitCounts>;

    async fn commitment_status(
        &self,
        auction_id: AuctionId,
        bidder: BidderId,
    ) -> AuctionResult<CommitStatus>;

    async fn bond(&self, auction_id: AuctionId, bidder: BidderId) -> AuctionResult<Option<Bond>>;

    /// Winner with an applied bond takes the asset. Once.
    async fn claim_asset(&self, auction_id: AuctionId, bidder: BidderId)
        -> AuctionResult<AssetClaim>;

    /// Forfeit the winner's bond if the payment window closed.
    async fn expire_unpaid(
        &self,
        auction_id: AuctionId,
    ) -> AuctionResult<Option<ForfeitureDistribution>>;

    async fn forfeiture(
        &self,
        auction_id: AuctionId,
    ) -> AuctionResult<Option<ForfeitureDistribution>>;

    async fn list_auctions(&self, filter: AuctionFilter) -> Vec<AuctionSummary>;

    /// Re-evaluate every auction: phase changes, settlement, forfeiture.
    ///
    /// Driven by the scheduler and callable on demand after a suspension.
    async fn tick(&self) -> TickReport;
}
