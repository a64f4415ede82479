use super::*;
use crate::adapters::{BroadcastEventBus, InMemorySnapshotStore, ManualClock};
use crate::domain::{AuctionMetadata, AuctionTerms, BondState, Phase, PricingRule};
use crate::ports::outbound::CapabilityError;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

const START: Timestamp = 1_000;
const COMMIT: Timestamp = 10_000;
const REVEAL: Timestamp = 20_000;
const WINDOW: u64 = 5_000;

// Mock implementations for testing
struct MockVerifier {
    accept: AtomicBool,
    unavailable: AtomicBool,
    /// Moves the clock while "verifying" (0 = leave it).
    jump_to: AtomicU64,
    clock: Arc<ManualClock>,
}

#[async_trait]
impl ProofVerifier for MockVerifier {
    async fn verify_proof(
        &self,
        _auction_id: AuctionId,
        _bidder: &BidderId,
        _sealed: &SealedBid,
    ) -> Result<bool, CapabilityError> {
        let jump = self.jump_to.load(Ordering::SeqCst);
        if jump != 0 {
            self.clock.set(jump);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CapabilityError::Unavailable {
                reason: "prover offline".into(),
            });
        }
        Ok(self.accept.load(Ordering::SeqCst))
    }
}

struct MockPayments {
    confirm: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for MockPayments {
    async fn confirm_payment(
        &self,
        _auction_id: AuctionId,
        _bidder: &BidderId,
        _amount: Amount,
    ) -> Result<bool, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.confirm.load(Ordering::SeqCst))
    }
}

type TestService = AuctionService<MockVerifier, MockPayments, ManualClock>;

struct Harness {
    service: TestService,
    clock: Arc<ManualClock>,
    verifier: Arc<MockVerifier>,
    payments: Arc<MockPayments>,
    bus: Arc<BroadcastEventBus>,
    store: Arc<InMemorySnapshotStore>,
}

fn harness_with_store(store: Arc<InMemorySnapshotStore>) -> Harness {
    let clock = Arc::new(ManualClock::new(START));
    let verifier = Arc::new(MockVerifier {
        accept: AtomicBool::new(true),
        unavailable: AtomicBool::new(false),
        jump_to: AtomicU64::new(0),
        clock: Arc::clone(&clock),
    });
    let payments = Arc::new(MockPayments {
        confirm: AtomicBool::new(true),
        calls: AtomicUsize::new(0),
    });
    let bus = Arc::new(BroadcastEventBus::with_capacity(64));
    let config = AuctionConfig {
        payment_window_ms: WINDOW,
        ..Default::default()
    };
    let service = AuctionService::new(
        config,
        AuctionDependencies {
            verifier: Arc::clone(&verifier),
            payments: Arc::clone(&payments),
            clock: Arc::clone(&clock),
        },
    )
    .with_event_publisher(bus.clone())
    .with_snapshot_store(store.clone());
    Harness {
        service,
        clock,
        verifier,
        payments,
        bus,
        store,
    }
}

fn harness() -> Harness {
    harness_with_store(Arc::new(InMemorySnapshotStore::new()))
}

fn request(rule: PricingRule, minimum_price: Amount) -> CreateAuctionRequest {
    CreateAuctionRequest {
        terms: AuctionTerms {
            minimum_price,
            currency: "USDC".into(),
            pricing_rule: rule,
            asset_chain: "ethereum".into(),
        },
        metadata: AuctionMetadata {
            title: "Genesis print".into(),
            description: "1 of 1".into(),
            image_urls: vec!["https://img.example/genesis.png".into()],
            owner: BidderId::new("seller"),
        },
        commit_deadline: COMMIT,
        reveal_deadline: REVEAL,
    }
}

fn bidder(name: &str) -> BidderId {
    BidderId::new(name)
}

async fn bid(h: &Harness, id: AuctionId, name: &str, amount: Amount) -> AuctionResult<CommitStatus> {
    h.service.deposit(id, bidder(name)).await?;
    h.service.commit(id, bidder(name), amount).await
}

/// A100 / B80 / C60 with minimum 40 (bond 6), settled.
async fn settled_auction(h: &Harness, rule: PricingRule) -> AuctionId {
    let id = h.service.create_auction(request(rule, 40)).await.unwrap();
    bid(h, id, "a", 100).await.unwrap();
    bid(h, id, "b", 80).await.unwrap();
    bid(h, id, "c", 60).await.unwrap();
    h.clock.set(REVEAL);
    id
}

// =============================================================================
// CREATION
// =============================================================================

#[tokio::test]
async fn test_create_rejects_inverted_deadlines() {
    let h = harness();
    let mut req = request(PricingRule::Vickrey, 40);
    req.commit_deadline = REVEAL;
    req.reveal_deadline = COMMIT;
    let err = h.service.create_auction(req).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidTiming");
    assert!(h.service.list_auctions(AuctionFilter::All).await.is_empty());
}

#[tokio::test]
async fn test_create_rejects_commit_deadline_in_past() {
    let h = harness();
    h.clock.set(COMMIT);
    let err = h
        .service
        .create_auction(request(PricingRule::Vickrey, 40))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidTiming");
}

#[tokio::test]
async fn test_create_rejects_listing_without_image() {
    let h = harness();
    let mut req = request(PricingRule::FirstPrice, 40);
    req.metadata.image_urls = vec!["  ".into()];
    let err = h.service.create_auction(req).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidTerms");
}

#[tokio::test]
async fn test_create_rejects_bond_above_price() {
    let h = harness();
    let service = AuctionService::new(
        AuctionConfig {
            bond_rate_bps: 20_000,
            ..Default::default()
        },
        AuctionDependencies {
            verifier: Arc::clone(&h.verifier),
            payments: Arc::clone(&h.payments),
            clock: Arc::clone(&h.clock),
        },
    );
    let err = service
        .create_auction(request(PricingRule::FirstPrice, 1_000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidTerms");
    assert!(service.list_auctions(AuctionFilter::All).await.is_empty());
}

#[tokio::test]
async fn test_unknown_auction() {
    let h = harness();
    let id = AuctionId::new();
    assert_eq!(
        h.service.get_phase(id).await,
        Err(AuctionError::AuctionNotFound { auction_id: id })
    );
    assert!(h.service.deposit(id, bidder("a")).await.is_err());
}

#[tokio::test]
async fn test_create_persists_snapshot() {
    let h = harness();
    let id = h
        .service
        .create_auction(request(PricingRule::Vickrey, 40))
        .await
        .unwrap();
    assert_eq!(h.store.get(&id).unwrap().bond_amount(), 6);
}

// =============================================================================
// COMMIT PHASE
// =============================================================================

#[tokio::test]
async fn test_commit_requires_bond() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    let err = h.service.commit(id, bidder("a"), 100).await.unwrap_err();
    assert_eq!(err, AuctionError::NoBond { bidder: bidder("a") });
    assert_eq!(h.service.aggregate_count(id).await.unwrap().valid_commitments, 0);
}

#[tokio::test]
async fn test_second_deposit_rejected() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    let bond = h.service.deposit(id, bidder("a")).await.unwrap();
    assert_eq!(bond.amount, 6);
    assert_eq!(bond.state, BondState::Locked);
    let err = h.service.deposit(id, bidder("a")).await.unwrap_err();
    assert_eq!(err.kind(), "AlreadyBonded");
}

#[tokio::test]
async fn test_deposit_closed_after_commit_deadline() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    h.clock.set(COMMIT);
    let err = h.service.deposit(id, bidder("a")).await.unwrap_err();
    assert_eq!(
        err,
        AuctionError::WrongPhase {
            operation: "deposit",
            phase: Phase::RevealOpen
        }
    );
}

#[tokio::test]
async fn test_commit_below_minimum_leaves_no_record() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    let err = bid(&h, id, "a", 39).await.unwrap_err();
    assert_eq!(
        err,
        AuctionError::BelowMinimum {
            amount: 39,
            minimum: 40
        }
    );
    assert_eq!(
        h.service.commitment_status(id, bidder("a")).await.unwrap(),
        CommitStatus::None
    );
}

#[tokio::test]
async fn test_duplicate_commit_keeps_count() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    assert_eq!(bid(&h, id, "a", 100).await.unwrap(), CommitStatus::Valid);
    let err = h.service.commit(id, bidder("a"), 120).await.unwrap_err();
    assert_eq!(err.kind(), "DuplicateCommit");
    assert_eq!(h.service.aggregate_count(id).await.unwrap().valid_commitments, 1);
}

#[tokio::test]
async fn test_rejected_proof_can_be_retried() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    h.service.deposit(id, bidder("a")).await.unwrap();

    h.verifier.accept.store(false, Ordering::SeqCst);
    let err = h.service.commit(id, bidder("a"), 100).await.unwrap_err();
    assert_eq!(err.kind(), "VerificationFailed");
    assert_eq!(
        h.service.commitment_status(id, bidder("a")).await.unwrap(),
        CommitStatus::Rejected
    );
    assert_eq!(h.service.aggregate_count(id).await.unwrap().valid_commitments, 0);

    h.verifier.accept.store(true, Ordering::SeqCst);
    assert_eq!(
        h.service.commit(id, bidder("a"), 100).await.unwrap(),
        CommitStatus::Valid
    );
    assert_eq!(h.service.aggregate_count(id).await.unwrap().valid_commitments, 1);
}

#[tokio::test]
async fn test_unavailable_verifier_rejects_commitment() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    h.verifier.unavailable.store(true, Ordering::SeqCst);
    let err = bid(&h, id, "a", 100).await.unwrap_err();
    assert!(matches!(err, AuctionError::VerificationFailed { ref reason } if reason.contains("prover offline")));
}

#[tokio::test]
async fn test_verification_finishing_after_deadline_is_rejected() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    h.service.deposit(id, bidder("a")).await.unwrap();
    h.verifier.jump_to.store(COMMIT, Ordering::SeqCst);

    let err = h.service.commit(id, bidder("a"), 100).await.unwrap_err();
    assert_eq!(
        err,
        AuctionError::WrongPhase {
            operation: "commit",
            phase: Phase::RevealOpen
        }
    );
    assert_eq!(
        h.service.commitment_status(id, bidder("a")).await.unwrap(),
        CommitStatus::Rejected
    );
    assert_eq!(h.service.aggregate_count(id).await.unwrap().valid_commitments, 0);
}

#[tokio::test]
async fn test_counts_keep_activity_separate() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    bid(&h, id, "a", 100).await.unwrap();
    h.service.record_network_activity(id, 17).unwrap();

    let counts = h.service.aggregate_count(id).await.unwrap();
    assert_eq!(counts.valid_commitments, 1);
    assert_eq!(counts.network_activity, 17);
}

// =============================================================================
// SETTLEMENT
// =============================================================================

#[tokio::test]
async fn test_result_pending_before_reveal_deadline() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    bid(&h, id, "a", 100).await.unwrap();
    h.clock.set(REVEAL - 1);
    assert_eq!(h.service.get_result(id).await.unwrap(), ResultView::Pending);
    let phase = h.service.get_phase(id).await.unwrap();
    assert_eq!(phase.phase, Phase::RevealOpen);
    assert_eq!(phase.time_left_ms, 1);
}

#[tokio::test]
async fn test_vickrey_settlement() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::Vickrey).await;

    let view = h.service.get_result(id).await.unwrap();
    let result = view.settled().unwrap();
    assert_eq!(result.winner, Some(bidder("a")));
    assert_eq!(result.clearing_price, Some(80));
    assert_eq!(result.valid_bids, 3);
    assert_eq!(result.settled_at, REVEAL);
    assert_eq!(result.payment_deadline, Some(REVEAL + WINDOW));

    // Later reads return the identical result.
    h.clock.advance(1_000);
    assert_eq!(h.service.get_result(id).await.unwrap(), view);

    let a = h.service.bond(id, bidder("a")).await.unwrap().unwrap();
    assert_eq!(a.state, BondState::AwaitingFinalPayment);
    for loser in ["b", "c"] {
        let bond = h.service.bond(id, bidder(loser)).await.unwrap().unwrap();
        assert_eq!(bond.state, BondState::RefundPending);
    }
}

#[tokio::test]
async fn test_first_price_settlement() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::FirstPrice).await;
    let result = h.service.get_result(id).await.unwrap();
    assert_eq!(result.settled().unwrap().clearing_price, Some(100));
}

#[tokio::test]
async fn test_no_valid_commitments_settles_without_winner() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    h.service.deposit(id, bidder("a")).await.unwrap();
    h.clock.set(REVEAL);

    let result = h.service.get_result(id).await.unwrap();
    let result = result.settled().unwrap();
    assert_eq!(result.winner, None);
    assert_eq!(result.clearing_price, None);
    assert_eq!(result.payment_deadline, None);

    let bond = h.service.refund(id, bidder("a")).await.unwrap();
    assert_eq!(bond.state, BondState::Refunded);
}

// =============================================================================
// ESCROW
// =============================================================================

#[tokio::test]
async fn test_refund_once_for_losers_only() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::Vickrey).await;

    let bond = h.service.refund(id, bidder("b")).await.unwrap();
    assert_eq!(bond.state, BondState::Refunded);
    assert_eq!(h.service.refund(id, bidder("b")).await.unwrap_err().kind(), "NotEligible");
    assert_eq!(h.service.refund(id, bidder("a")).await.unwrap_err().kind(), "NotEligible");
    assert_eq!(h.service.refund(id, bidder("z")).await.unwrap_err().kind(), "NotEligible");
}

#[tokio::test]
async fn test_refund_before_settlement_not_eligible() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    bid(&h, id, "a", 100).await.unwrap();
    let err = h.service.refund(id, bidder("a")).await.unwrap_err();
    assert_eq!(err.kind(), "NotEligible");
}

#[tokio::test]
async fn test_final_payment_and_asset_claim() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::Vickrey).await;

    let err = h.service.pay_final(id, bidder("a"), 80).await.unwrap_err();
    assert_eq!(
        err,
        AuctionError::WrongAmount {
            expected: 74,
            actual: 80
        }
    );
    assert_eq!(h.payments.calls.load(Ordering::SeqCst), 0);

    let bond = h.service.pay_final(id, bidder("a"), 74).await.unwrap();
    assert_eq!(bond.state, BondState::Applied);
    assert_eq!(h.payments.calls.load(Ordering::SeqCst), 1);

    let claim = h.service.claim_asset(id, bidder("a")).await.unwrap();
    assert_eq!(claim.bidder, bidder("a"));
    assert_eq!(
        h.service.claim_asset(id, bidder("a")).await.unwrap_err().kind(),
        "NotEligible"
    );
}

#[tokio::test]
async fn test_pay_final_by_loser_rejected() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::Vickrey).await;
    let err = h.service.pay_final(id, bidder("b"), 74).await.unwrap_err();
    assert_eq!(err.kind(), "WrongPhase");
    let err = h.service.pay_final(id, bidder("nobody"), 74).await.unwrap_err();
    assert_eq!(err.kind(), "NoBond");
}

#[tokio::test]
async fn test_pay_final_before_settlement_rejected() {
    let h = harness();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    bid(&h, id, "a", 100).await.unwrap();
    h.clock.set(COMMIT + 1);
    let err = h.service.pay_final(id, bidder("a"), 94).await.unwrap_err();
    assert_eq!(
        err,
        AuctionError::WrongPhase {
            operation: "pay_final",
            phase: Phase::RevealOpen
        }
    );
}

#[tokio::test]
async fn test_declined_payment_keeps_bond_awaiting() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::Vickrey).await;

    h.payments.confirm.store(false, Ordering::SeqCst);
    let err = h.service.pay_final(id, bidder("a"), 74).await.unwrap_err();
    assert_eq!(err.kind(), "PaymentFailed");
    let bond = h.service.bond(id, bidder("a")).await.unwrap().unwrap();
    assert_eq!(bond.state, BondState::AwaitingFinalPayment);
    assert!(!bond.payment_in_flight);

    h.payments.confirm.store(true, Ordering::SeqCst);
    assert_eq!(
        h.service.pay_final(id, bidder("a"), 74).await.unwrap().state,
        BondState::Applied
    );
}

#[tokio::test]
async fn test_unpaid_winner_forfeits_after_deadline() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::Vickrey).await;

    h.clock.set(REVEAL + WINDOW);
    assert_eq!(h.service.expire_unpaid(id).await.unwrap(), None);

    h.clock.set(REVEAL + WINDOW + 1);
    let err = h.service.pay_final(id, bidder("a"), 74).await.unwrap_err();
    assert_eq!(err.kind(), "WrongPhase");

    let distribution = h.service.expire_unpaid(id).await.unwrap().unwrap();
    assert_eq!(distribution.forfeited_by, bidder("a"));
    assert_eq!(distribution.amount, 6);
    assert_eq!(distribution.shares.len(), 2);
    assert!(distribution.shares.iter().all(|s| s.amount == 3));
    assert_eq!(distribution.undistributed, 0);

    assert_eq!(h.service.expire_unpaid(id).await.unwrap(), None);
    assert_eq!(h.service.forfeiture(id).await.unwrap(), Some(distribution));
    assert_eq!(
        h.service.bond(id, bidder("a")).await.unwrap().unwrap().state,
        BondState::Forfeited
    );
    assert_eq!(
        h.service.claim_asset(id, bidder("a")).await.unwrap_err().kind(),
        "NotEligible"
    );
}

// =============================================================================
// SCHEDULER TICK, EVENTS, PERSISTENCE
// =============================================================================

#[tokio::test]
async fn test_tick_reports_transitions_and_settles_once() {
    let h = harness();
    let mut rx = h.bus.subscribe();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    bid(&h, id, "a", 100).await.unwrap();

    h.clock.set(COMMIT + 5);
    let report = h.service.tick().await;
    assert_eq!(report.phase_changes, 1);
    assert_eq!(report.settled, 0);

    h.clock.set(REVEAL + 5);
    let report = h.service.tick().await;
    assert_eq!(report.phase_changes, 1);
    assert_eq!(report.settled, 1);

    assert!(!h.service.tick().await.has_changes());

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.auction_id(), id);
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec![
            "auction_created",
            "bond_deposited",
            "commit_accepted",
            "phase_changed",
            "phase_changed",
            "auction_settled",
        ]
    );
}

#[tokio::test]
async fn test_tick_after_long_sleep_reports_single_jump() {
    let h = harness();
    let mut rx = h.bus.subscribe();
    let id = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    h.clock.set(REVEAL * 10);
    h.service.tick().await;

    let phase_events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|e| matches!(e, AuctionEvent::PhaseChanged { .. }))
        .collect();
    assert_eq!(
        phase_events,
        vec![AuctionEvent::PhaseChanged {
            auction_id: id,
            from: Phase::CommitOpen,
            to: Phase::Settled,
            observed_at: REVEAL * 10,
        }]
    );
}

#[tokio::test]
async fn test_tick_forfeits_unpaid_winner() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::FirstPrice).await;
    h.service.tick().await;
    h.clock.set(REVEAL + WINDOW + 1);
    let report = h.service.tick().await;
    assert_eq!(report.forfeited, 1);
    assert!(h.service.forfeiture(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_ticks_never_refund_losers() {
    let h = harness();
    let id = settled_auction(&h, PricingRule::Vickrey).await;
    for at in [REVEAL, REVEAL + 1, REVEAL + WINDOW + 1, REVEAL + WINDOW * 4] {
        h.clock.set(at);
        h.service.tick().await;
    }
    for loser in ["b", "c"] {
        let bond = h.service.bond(id, bidder(loser)).await.unwrap().unwrap();
        assert_eq!(bond.state, BondState::RefundPending);
    }

    let bond = h.service.refund(id, bidder("c")).await.unwrap();
    assert_eq!(bond.state, BondState::Refunded);
}

#[tokio::test]
async fn test_restore_resumes_auction() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let first = harness_with_store(Arc::clone(&store));
    let id = first
        .service
        .create_auction(request(PricingRule::Vickrey, 40))
        .await
        .unwrap();
    bid(&first, id, "a", 100).await.unwrap();
    bid(&first, id, "b", 90).await.unwrap();
    drop(first);

    let second = harness_with_store(store);
    assert_eq!(second.service.restore().await.unwrap(), 1);
    assert_eq!(
        second.service.aggregate_count(id).await.unwrap().valid_commitments,
        2
    );

    second.clock.set(REVEAL);
    let result = second.service.get_result(id).await.unwrap();
    assert_eq!(result.settled().unwrap().clearing_price, Some(90));
    assert_eq!(second.service.restore().await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_auctions_by_status() {
    let h = harness();
    let first = h.service.create_auction(request(PricingRule::Vickrey, 40)).await.unwrap();
    let mut later = request(PricingRule::FirstPrice, 40);
    later.reveal_deadline = REVEAL * 2;
    let second = h.service.create_auction(later).await.unwrap();

    let all = h.service.list_auctions(AuctionFilter::All).await;
    let ids: Vec<_> = all.iter().map(|s| s.auction_id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(all[0].cover_image.as_deref(), Some("https://img.example/genesis.png"));

    h.clock.set(REVEAL);
    let active = h.service.list_auctions(AuctionFilter::Active).await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].auction_id, second);
    let ended = h.service.list_auctions(AuctionFilter::Ended).await;
    assert_eq!(ended[0].auction_id, first);
    assert_eq!(ended[0].phase.phase, Phase::Settled);
}
