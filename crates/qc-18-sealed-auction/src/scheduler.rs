//! Background tasks.
//!
//! - `PhaseScheduler` periodically calls `AuctionApi::tick`, which settles
//!   auctions whose reveal deadline passed and forfeits unpaid bonds. Missed
//!   ticks are skipped, not replayed: each tick recomputes from absolute
//!   deadlines, so one late tick catches up completely.
//! - `NetworkActivitySimulator` bumps the synthetic activity statistic of
//!   auctions in COMMIT_OPEN. It never touches the auction lock.

use crate::domain::Phase;
use crate::ports::inbound::AuctionApi;
use crate::ports::outbound::TimeSource;
use crate::registry::AuctionRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

pub struct PhaseScheduler<A: AuctionApi + ?Sized + 'static> {
    api: Arc<A>,
    period: Duration,
}

impl<A: AuctionApi + ?Sized + 'static> PhaseScheduler<A> {
    pub fn new(api: Arc<A>, period: Duration) -> Self {
        Self { api, period }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = self.period.as_millis() as u64, "phase scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.api.tick().await;
                        if report.has_changes() {
                            debug!(
                                phase_changes = report.phase_changes,
                                settled = report.settled,
                                forfeited = report.forfeited,
                                "scheduler tick"
                            );
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("phase scheduler stopped");
        })
    }
}

/// Display-only activity counter. Unrelated to commitments.
pub struct NetworkActivitySimulator<T: TimeSource + 'static> {
    registry: Arc<AuctionRegistry>,
    clock: Arc<T>,
    period: Duration,
    max_step: u64,
}

impl<T: TimeSource + 'static> NetworkActivitySimulator<T> {
    pub fn new(
        registry: Arc<AuctionRegistry>,
        clock: Arc<T>,
        period: Duration,
        max_step: u64,
    ) -> Self {
        Self {
            registry,
            clock,
            period,
            max_step: max_step.max(1),
        }
    }

    /// Bump every auction in COMMIT_OPEN once. Returns how many were bumped.
    pub fn step(&self, rng: &mut impl Rng) -> usize {
        let now = self.clock.now();
        let mut bumped = 0;
        for entry in self.registry.entries() {
            if entry.schedule().phase_at(now).phase == Phase::CommitOpen {
                entry.record_network_activity(rng.gen_range(1..=self.max_step));
                bumped += 1;
            }
        }
        bumped
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.step(&mut rng);
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("network activity simulator stopped");
        })
    }
}
