//! Auction registry.
//!
//! Maps auction ids to entries. Each entry serializes mutation of its auction
//! behind its own mutex; unrelated auctions never contend. Schedule and the
//! synthetic activity statistic live outside the mutex so phase reads and the
//! activity task never wait on a commit in progress.

use crate::domain::{
    Auction, AuctionId, AuctionMetadata, AuctionSchedule, AuctionTerms, Phase, Timestamp,
};
use crate::error::{AuctionError, AuctionResult};
use crate::ports::inbound::{AuctionFilter, AuctionSummary, CommitCounts};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct AuctionEntry {
    schedule: AuctionSchedule,
    auction: Mutex<Auction>,
    network_activity: AtomicU64,
    /// Last phase reported by `observe_phase`.
    observed_phase: Mutex<Phase>,
}

impl AuctionEntry {
    fn new(auction: Auction, now: Timestamp) -> Self {
        let schedule = auction.schedule();
        Self {
            schedule,
            observed_phase: Mutex::new(schedule.phase_at(now).phase),
            auction: Mutex::new(auction),
            network_activity: AtomicU64::new(0),
        }
    }

    pub fn schedule(&self) -> AuctionSchedule {
        self.schedule
    }

    /// Exclusive access to the auction. Never hold across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Auction> {
        self.auction.lock()
    }

    pub fn network_activity(&self) -> u64 {
        self.network_activity.load(Ordering::Relaxed)
    }

    /// Bump the synthetic statistic. Returns the new value.
    pub fn record_network_activity(&self, delta: u64) -> u64 {
        self.network_activity
            .fetch_add(delta, Ordering::Relaxed)
            .saturating_add(delta)
    }

    /// Record the phase seen at `now`. Returns the previous phase when it
    /// moved forward; phases never move back.
    pub fn observe_phase(&self, now: Timestamp) -> Option<(Phase, Phase)> {
        let current = self.schedule.phase_at(now).phase;
        let mut observed = self.observed_phase.lock();
        if current > *observed {
            let previous = std::mem::replace(&mut *observed, current);
            Some((previous, current))
        } else {
            None
        }
    }

    fn summary(&self, now: Timestamp) -> AuctionSummary {
        let auction = self.lock();
        AuctionSummary {
            auction_id: auction.id(),
            title: auction.metadata().title.clone(),
            cover_image: auction.metadata().cover_image().map(str::to_string),
            terms: auction.terms().clone(),
            phase: self.schedule.phase_at(now),
            reveal_deadline: self.schedule.reveal_deadline(),
            counts: CommitCounts {
                valid_commitments: auction.ledger().commit_count(),
                network_activity: self.network_activity(),
            },
        }
    }
}

#[derive(Default)]
pub struct AuctionRegistry {
    entries: RwLock<HashMap<AuctionId, Arc<AuctionEntry>>>,
}

impl AuctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a new auction.
    pub fn create(
        &self,
        terms: AuctionTerms,
        metadata: AuctionMetadata,
        commit_deadline: Timestamp,
        reveal_deadline: Timestamp,
        bond_rate_bps: u32,
        now: Timestamp,
    ) -> AuctionResult<Arc<AuctionEntry>> {
        let schedule = AuctionSchedule::new(commit_deadline, reveal_deadline, now)?;
        let auction = Auction::new(AuctionId::new(), terms, metadata, schedule, bond_rate_bps, now)?;
        Ok(self.insert(auction, now))
    }

    /// Re-register an auction loaded from a snapshot. An id already present
    /// keeps its live entry.
    pub fn restore(&self, auction: Auction, now: Timestamp) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&auction.id()) {
            return false;
        }
        entries.insert(auction.id(), Arc::new(AuctionEntry::new(auction, now)));
        true
    }

    fn insert(&self, auction: Auction, now: Timestamp) -> Arc<AuctionEntry> {
        let entry = Arc::new(AuctionEntry::new(auction, now));
        let id = entry.lock().id();
        self.entries.write().insert(id, Arc::clone(&entry));
        entry
    }

    pub fn get(&self, auction_id: &AuctionId) -> AuctionResult<Arc<AuctionEntry>> {
        self.entries
            .read()
            .get(auction_id)
            .cloned()
            .ok_or(AuctionError::AuctionNotFound {
                auction_id: *auction_id,
            })
    }

    /// Snapshot of all entries. The registry lock is released on return.
    pub fn entries(&self) -> Vec<Arc<AuctionEntry>> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Listing view, soonest reveal deadline first, ties by id.
    pub fn list(&self, filter: AuctionFilter, now: Timestamp) -> Vec<AuctionSummary> {
        let mut summaries: Vec<AuctionSummary> = self
            .entries()
            .into_iter()
            .filter(|entry| match filter {
                AuctionFilter::Active => !entry.schedule.is_ended(now),
                AuctionFilter::Ended => entry.schedule.is_ended(now),
                AuctionFilter::All => true,
            })
            .map(|entry| entry.summary(now))
            .collect();
        summaries.sort_by(|a, b| {
            a.reveal_deadline
                .cmp(&b.reveal_deadline)
                .then_with(|| a.auction_id.0.cmp(&b.auction_id.0))
        });
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BidderId, PricingRule};

    fn terms() -> AuctionTerms {
        AuctionTerms {
            minimum_price: 100,
            currency: "USDC".into(),
            pricing_rule: PricingRule::FirstPrice,
            asset_chain: "solana".into(),
        }
    }

    fn metadata(title: &str) -> AuctionMetadata {
        AuctionMetadata {
            title: title.into(),
            description: String::new(),
            image_urls: vec!["https://img.example/a.png".into()],
            owner: BidderId::new("seller"),
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = AuctionRegistry::new();
        let entry = registry
            .create(terms(), metadata("a"), 1_000, 2_000, 1_500, 0)
            .unwrap();
        let id = entry.lock().id();
        assert!(registry.get(&id).is_ok());
        assert_eq!(entry.lock().bond_amount(), 15);
    }

    #[test]
    fn test_get_unknown_auction() {
        let registry = AuctionRegistry::new();
        let id = AuctionId::new();
        assert_eq!(
            registry.get(&id).err(),
            Some(AuctionError::AuctionNotFound { auction_id: id })
        );
    }

    #[test]
    fn test_create_rejects_bad_timing() {
        let registry = AuctionRegistry::new();
        let err = registry
            .create(terms(), metadata("a"), 2_000, 1_000, 1_500, 0)
            .err()
            .unwrap();
        assert_eq!(err.kind(), "InvalidTiming");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_observe_phase_reports_single_jump() {
        let registry = AuctionRegistry::new();
        let entry = registry
            .create(terms(), metadata("a"), 1_000, 2_000, 1_500, 0)
            .unwrap();
        assert_eq!(entry.observe_phase(500), None);
        assert_eq!(
            entry.observe_phase(5_000),
            Some((Phase::CommitOpen, Phase::Settled))
        );
        assert_eq!(entry.observe_phase(1_500), None);
    }

    #[test]
    fn test_list_filters_and_orders() {
        let registry = AuctionRegistry::new();
        registry
            .create(terms(), metadata("late"), 1_000, 9_000, 1_500, 0)
            .unwrap();
        registry
            .create(terms(), metadata("early"), 1_000, 2_000, 1_500, 0)
            .unwrap();

        let all = registry.list(AuctionFilter::All, 0);
        let titles: Vec<_> = all.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "late"]);

        let active = registry.list(AuctionFilter::Active, 3_000);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "late");
        assert_eq!(registry.list(AuctionFilter::Ended, 3_000)[0].title, "early");
    }

    #[test]
    fn test_network_activity_is_separate_from_commit_count() {
        let registry = AuctionRegistry::new();
        let entry = registry
            .create(terms(), metadata("a"), 1_000, 2_000, 1_500, 0)
            .unwrap();
        assert_eq!(entry.record_network_activity(4), 4);
        let summary = &registry.list(AuctionFilter::All, 0)[0];
        assert_eq!(summary.counts.network_activity, 4);
        assert_eq!(summary.counts.valid_commitments, 0);
    }
}
