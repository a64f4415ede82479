//! Auction Service - lifecycle coordinator
//!
//! Drives the domain aggregate through the inbound API. Every call:
//!
//! 1. reads the clock once,
//! 2. locks the auction, settles it if its reveal deadline has passed, and
//!    applies the operation,
//! 3. releases the lock, then persists the snapshot and publishes events.
//!
//! Proof verification and payment confirmation run between two locked
//! sections; the auction is never locked across an `.await`.

use crate::adapters::{BroadcastEventBus, InMemorySnapshotStore};
use crate::config::AuctionConfig;
use crate::domain::{
    Amount, AssetClaim, Auction, AuctionId, BidderId, Bond, CommitStatus, ForfeiturePolicy,
    ForfeitureDistribution, PhaseSnapshot, SealedBid, Timestamp, VerificationOutcome,
};
use crate::error::{AuctionError, AuctionResult};
use crate::events::AuctionEvent;
use crate::ports::inbound::{
    AuctionApi, AuctionFilter, AuctionSummary, CommitCounts, CreateAuctionRequest, ResultView,
    TickReport,
};
use crate::ports::outbound::{
    AuctionEventPublisher, PaymentGateway, ProofVerifier, SnapshotStore, StoreError, TimeSource,
};
use crate::registry::{AuctionEntry, AuctionRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// External capabilities the service is wired with.
pub struct AuctionDependencies<V, P, T> {
    pub verifier: Arc<V>,
    pub payments: Arc<P>,
    pub clock: Arc<T>,
}

/// Outcome of one locked section.
struct Locked<R> {
    outcome: AuctionResult<R>,
    snapshot: Option<Auction>,
    events: Vec<AuctionEvent>,
    settled: bool,
}

pub struct AuctionService<V, P, T>
where
    V: ProofVerifier,
    P: PaymentGateway,
    T: TimeSource,
{
    config: AuctionConfig,
    registry: Arc<AuctionRegistry>,
    verifier: Arc<V>,
    payments: Arc<P>,
    clock: Arc<T>,
    publisher: Arc<dyn AuctionEventPublisher>,
    store: Arc<dyn SnapshotStore>,
}

impl<V, P, T> AuctionService<V, P, T>
where
    V: ProofVerifier,
    P: PaymentGateway,
    T: TimeSource,
{
    /// Service with an in-memory store and a private event bus.
    pub fn new(config: AuctionConfig, deps: AuctionDependencies<V, P, T>) -> Self {
        let capacity = config.event_channel_capacity;
        Self {
            config,
            registry: Arc::new(AuctionRegistry::new()),
            verifier: deps.verifier,
            payments: deps.payments,
            clock: deps.clock,
            publisher: Arc::new(BroadcastEventBus::with_capacity(capacity)),
            store: Arc::new(InMemorySnapshotStore::new()),
        }
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn AuctionEventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<AuctionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn clock(&self) -> Arc<T> {
        Arc::clone(&self.clock)
    }

    /// Load every stored auction into the registry. Returns how many were
    /// added. Auctions whose deadlines passed while offline are settled on
    /// the next tick or access.
    pub async fn restore(&self) -> Result<usize, StoreError> {
        let auctions = self.store.load_all().await?;
        let now = self.clock.now();
        let restored = auctions
            .into_iter()
            .map(|auction| self.registry.restore(auction, now))
            .filter(|added| *added)
            .count();
        info!(restored, "auctions restored from snapshot store");
        Ok(restored)
    }

    /// Bump the synthetic activity statistic of one auction.
    pub fn record_network_activity(&self, auction_id: AuctionId, delta: u64) -> AuctionResult<u64> {
        Ok(self.registry.get(&auction_id)?.record_network_activity(delta))
    }

    // =========================================================================
    // LOCKED SECTIONS
    // =========================================================================

    /// Run `op` under the auction lock after on-demand settlement.
    fn locked<R, F>(&self, entry: &AuctionEntry, now: Timestamp, op: F) -> Locked<R>
    where
        F: FnOnce(&mut Auction, &mut Vec<AuctionEvent>) -> AuctionResult<R>,
    {
        let mut auction = entry.lock();
        let revision = auction.revision();
        let mut events = Vec::new();

        let settled = match auction.settle_if_due(now, self.config.payment_window_ms) {
            Some(result) => {
                info!(
                    auction_id = %auction.id(),
                    winner = ?result.winner,
                    clearing_price = ?result.clearing_price,
                    valid_bids = result.valid_bids,
                    "auction settled"
                );
                events.push(AuctionEvent::AuctionSettled {
                    auction_id: auction.id(),
                    winner: result.winner,
                    clearing_price: result.clearing_price,
                });
                true
            }
            None => false,
        };

        let outcome = op(&mut auction, &mut events);
        let snapshot = (auction.revision() != revision).then(|| auction.clone());
        Locked {
            outcome,
            snapshot,
            events,
            settled,
        }
    }

    /// Persist and publish what a locked section produced.
    async fn commit_changes<R: Send>(&self, locked: Locked<R>) -> AuctionResult<R> {
        if let Some(snapshot) = locked.snapshot {
            self.persist(&snapshot).await;
        }
        for event in locked.events {
            self.publisher.publish(event);
        }
        locked.outcome
    }

    async fn mutate<R, F>(&self, entry: &AuctionEntry, now: Timestamp, op: F) -> AuctionResult<R>
    where
        R: Send,
        F: FnOnce(&mut Auction, &mut Vec<AuctionEvent>) -> AuctionResult<R> + Send,
    {
        let locked = self.locked(entry, now, op);
        self.commit_changes(locked).await
    }

    async fn persist(&self, snapshot: &Auction) {
        if let Err(e) = self.store.save(snapshot).await {
            warn!(
                auction_id = %snapshot.id(),
                revision = snapshot.revision(),
                error = %e,
                "failed to persist auction snapshot"
            );
        }
    }

    async fn evaluate(&self, entry: &AuctionEntry, now: Timestamp, report: &mut TickReport) {
        report.evaluated += 1;
        let mut events = Vec::new();
        if let Some((from, to)) = entry.observe_phase(now) {
            report.phase_changes += 1;
            let auction_id = entry.lock().id();
            debug!(%auction_id, %from, %to, "phase changed");
            events.push(AuctionEvent::PhaseChanged {
                auction_id,
                from,
                to,
                observed_at: now,
            });
        }

        let policy = self.config.forfeiture_policy;
        let mut locked = self.locked(entry, now, |auction, events| {
            Ok(expire(auction, now, policy, events))
        });
        if locked.settled {
            report.settled += 1;
        }
        if matches!(locked.outcome, Ok(Some(_))) {
            report.forfeited += 1;
        }
        events.append(&mut locked.events);
        locked.events = events;
        if let Err(e) = self.commit_changes(locked).await {
            debug!(error = %e, "tick evaluation failed");
        }
    }
}

/// Forfeiture check shared by `tick` and `expire_unpaid`.
fn expire(
    auction: &mut Auction,
    now: Timestamp,
    policy: ForfeiturePolicy,
    events: &mut Vec<AuctionEvent>,
) -> Option<ForfeitureDistribution> {
    let distribution = auction.expire_if_unpaid(now, policy)?;
    warn!(
        auction_id = %auction.id(),
        bidder = %distribution.forfeited_by,
        amount = distribution.amount,
        "winner missed payment deadline; bond forfeited"
    );
    events.push(AuctionEvent::BondForfeited {
        auction_id: auction.id(),
        distribution: distribution.clone(),
    });
    Some(distribution)
}

fn random_salt() -> [u8; 32] {
    rand::random()
}

#[async_trait]
impl<V, P, T> AuctionApi for AuctionService<V, P, T>
where
    V: ProofVerifier + 'static,
    P: PaymentGateway + 'static,
    T: TimeSource + 'static,
{
    async fn create_auction(&self, request: CreateAuctionRequest) -> AuctionResult<AuctionId> {
        let now = self.clock.now();
        let entry = self.registry.create(
            request.terms,
            request.metadata,
            request.commit_deadline,
            request.reveal_deadline,
            self.config.bond_rate_bps,
            now,
        )?;
        let (snapshot, event) = {
            let auction = entry.lock();
            let event = AuctionEvent::AuctionCreated {
                auction_id: auction.id(),
                pricing_rule: auction.terms().pricing_rule,
                commit_deadline: auction.schedule().commit_deadline(),
                reveal_deadline: auction.schedule().reveal_deadline(),
            };
            (auction.clone(), event)
        };
        info!(
            auction_id = %snapshot.id(),
            rule = %snapshot.terms().pricing_rule.as_str(),
            bond = snapshot.bond_amount(),
            "auction created"
        );
        self.persist(&snapshot).await;
        self.publisher.publish(event);
        Ok(snapshot.id())
    }

    async fn get_phase(&self, auction_id: AuctionId) -> AuctionResult<PhaseSnapshot> {
        let entry = self.registry.get(&auction_id)?;
        Ok(entry.schedule().phase_at(self.clock.now()))
    }

    async fn deposit(&self, auction_id: AuctionId, bidder: BidderId) -> AuctionResult<Bond> {
        let entry = self.registry.get(&auction_id)?;
        let now = self.clock.now();
        self.mutate(&entry, now, |auction, events| {
            let bond = auction.deposit(bidder, now)?;
            debug!(%auction_id, bidder = %bond.bidder, amount = bond.amount, "bond locked");
            events.push(AuctionEvent::BondDeposited {
                auction_id,
                bidder: bond.bidder.clone(),
                amount: bond.amount,
            });
            Ok(bond)
        })
        .await
    }

    async fn commit(
        &self,
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
    ) -> AuctionResult<CommitStatus> {
        let entry = self.registry.get(&auction_id)?;
        let sealed = SealedBid::seal(&auction_id, &bidder, amount, random_salt());

        let now = self.clock.now();
        let reserve_sealed = sealed.clone();
        let reserve_bidder = bidder.clone();
        let ticket = self
            .mutate(&entry, now, move |auction, _| {
                auction.reserve_commit(reserve_bidder, reserve_sealed, now)
            })
            .await?;
        debug!(%auction_id, %bidder, sequence = ticket.sequence, "commitment pending verification");

        let outcome = match self.verifier.verify_proof(auction_id, &bidder, &sealed).await {
            Ok(true) => VerificationOutcome::Verified,
            Ok(false) => VerificationOutcome::Rejected {
                reason: "proof did not verify".to_string(),
            },
            Err(e) => VerificationOutcome::Rejected {
                reason: e.to_string(),
            },
        };

        let now = self.clock.now();
        self.mutate(&entry, now, move |auction, events| {
            let result = auction.finalize_commit(&ticket, outcome, now);
            match &result {
                Ok(_) => {
                    let commit_count = auction.ledger().commit_count();
                    info!(%auction_id, %bidder, commit_count, "commitment accepted");
                    events.push(AuctionEvent::CommitAccepted {
                        auction_id,
                        bidder,
                        commit_count,
                    });
                }
                Err(e) => {
                    warn!(%auction_id, %bidder, error = %e, "commitment rejected");
                    events.push(AuctionEvent::CommitRejected {
                        auction_id,
                        bidder,
                        reason: e.to_string(),
                    });
                }
            }
            result
        })
        .await
    }

    async fn refund(&self, auction_id: AuctionId, bidder: BidderId) -> AuctionResult<Bond> {
        let entry = self.registry.get(&auction_id)?;
        let now = self.clock.now();
        self.mutate(&entry, now, |auction, events| {
            let bond = auction.refund(&bidder)?;
            info!(%auction_id, %bidder, amount = bond.amount, "bond refunded");
            events.push(AuctionEvent::BondRefunded {
                auction_id,
                bidder,
                amount: bond.amount,
            });
            Ok(bond)
        })
        .await
    }

    async fn pay_final(
        &self,
        auction_id: AuctionId,
        bidder: BidderId,
        amount: Amount,
    ) -> AuctionResult<Bond> {
        let entry = self.registry.get(&auction_id)?;
        let now = self.clock.now();
        self.mutate(&entry, now, |auction, _| {
            auction.begin_final_payment(&bidder, amount, now)
        })
        .await?;

        let confirmation = match self.payments.confirm_payment(auction_id, &bidder, amount).await {
            Ok(true) => Ok(()),
            Ok(false) => Err("payment was declined".to_string()),
            Err(e) => Err(e.to_string()),
        };

        let now = self.clock.now();
        self.mutate(&entry, now, move |auction, events| {
            let bond = auction.complete_final_payment(&bidder, confirmation.is_ok());
            match (confirmation, bond) {
                (Ok(()), Some(bond)) => {
                    info!(%auction_id, %bidder, amount, "final payment applied");
                    events.push(AuctionEvent::FinalPaymentApplied {
                        auction_id,
                        bidder,
                        amount,
                    });
                    Ok(bond)
                }
                (Err(reason), _) => {
                    warn!(%auction_id, %bidder, %reason, "final payment failed");
                    Err(AuctionError::PaymentFailed { reason })
                }
                (Ok(()), None) => Err(AuctionError::PaymentFailed {
                    reason: "bond left the awaiting state".to_string(),
                }),
            }
        })
        .await
    }

    async fn get_result(&self, auction_id: AuctionId) -> AuctionResult<ResultView> {
        let entry = self.registry.get(&auction_id)?;
        let now = self.clock.now();
        self.mutate(&entry, now, |auction, _| {
            Ok(match auction.result() {
                Some(result) => ResultView::Settled(result.clone()),
                None => ResultView::Pending,
            })
        })
        .await
    }

    async fn aggregate_count(&self, auction_id: AuctionId) -> AuctionResult<CommitCounts> {
        let entry = self.registry.get(&auction_id)?;
        let valid_commitments = entry.lock().ledger().commit_count();
        Ok(CommitCounts {
            valid_commitments,
            network_activity: entry.network_activity(),
        })
    }

    async fn commitment_status(
        &self,
        auction_id: AuctionId,
        bidder: BidderId,
    ) -> AuctionResult<CommitStatus> {
        let entry = self.registry.get(&auction_id)?;
        let status = entry.lock().ledger().status(&bidder);
        Ok(status)
    }

    async fn bond(&self, auction_id: AuctionId, bidder: BidderId) -> AuctionResult<Option<Bond>> {
        let entry = self.registry.get(&auction_id)?;
        let now = self.clock.now();
        self.mutate(&entry, now, |auction, _| {
            Ok(auction.escrow().bond(&bidder).cloned())
        })
        .await
    }

    async fn claim_asset(
        &self,
        auction_id: AuctionId,
        bidder: BidderId,
    ) -> AuctionResult<AssetClaim> {
        let entry = self.registry.get(&auction_id)?;
        let now = self.clock.now();
        self.mutate(&entry, now, |auction, events| {
            let claim = auction.claim_asset(&bidder, now)?;
            info!(%auction_id, %bidder, "asset claimed");
            events.push(AuctionEvent::AssetClaimed { auction_id, bidder });
            Ok(claim)
        })
        .await
    }

    async fn expire_unpaid(
        &self,
        auction_id: AuctionId,
    ) -> AuctionResult<Option<ForfeitureDistribution>> {
        let entry = self.registry.get(&auction_id)?;
        let now = self.clock.now();
        let policy = self.config.forfeiture_policy;
        self.mutate(&entry, now, |auction, events| {
            Ok(expire(auction, now, policy, events))
        })
        .await
    }

    async fn forfeiture(
        &self,
        auction_id: AuctionId,
    ) -> AuctionResult<Option<ForfeitureDistribution>> {
        let entry = self.registry.get(&auction_id)?;
        let forfeiture = entry.lock().escrow().forfeiture().cloned();
        Ok(forfeiture)
    }

    async fn list_auctions(&self, filter: AuctionFilter) -> Vec<AuctionSummary> {
        self.registry.list(filter, self.clock.now())
    }

    async fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport::default();
        for entry in self.registry.entries() {
            self.evaluate(&entry, now, &mut report).await;
        }
        if report.has_changes() {
            debug!(?report, "auction tick");
        }
        report
    }
}
