//! # Sealed Auction Runtime
//!
//! Hosts the auction coordinator.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment and validate it
//! 2. Open the snapshot directory (if configured) and restore auctions
//! 3. Start the phase scheduler, the network-activity task and the event log
//! 4. Optionally seed a demo auction
//! 5. Run until Ctrl+C, then stop background tasks

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use qc_18_sealed_auction::adapters::{
    BroadcastEventBus, DigestProofVerifier, JsonFileSnapshotStore, RecordingPaymentGateway,
};
use qc_18_sealed_auction::ports::inbound::{AuctionApi, CreateAuctionRequest};
use qc_18_sealed_auction::ports::outbound::{SystemTimeSource, TimeSource};
use qc_18_sealed_auction::{
    AuctionDependencies, AuctionMetadata, AuctionService, AuctionTerms, BidderId,
    NetworkActivitySimulator, PhaseScheduler, PricingRule,
};

use crate::config::RuntimeConfig;

type Service = AuctionService<
    DigestProofVerifier,
    RecordingPaymentGateway<SystemTimeSource>,
    SystemTimeSource,
>;

pub struct AuctionRuntime {
    config: RuntimeConfig,
    service: Arc<Service>,
    bus: Arc<BroadcastEventBus>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl AuctionRuntime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.auction.validate().context("invalid auction configuration")?;

        let clock = Arc::new(SystemTimeSource);
        let bus = Arc::new(BroadcastEventBus::with_capacity(
            config.auction.event_channel_capacity,
        ));
        let mut service = AuctionService::new(
            config.auction.clone(),
            AuctionDependencies {
                verifier: Arc::new(DigestProofVerifier::new()),
                payments: Arc::new(RecordingPaymentGateway::new(Arc::clone(&clock))),
                clock,
            },
        )
        .with_event_publisher(bus.clone());

        if let Some(dir) = &config.snapshot_dir {
            let store = JsonFileSnapshotStore::open(dir)
                .with_context(|| format!("opening snapshot directory {}", dir.display()))?;
            service = service.with_snapshot_store(Arc::new(store));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            service: Arc::new(service),
            bus,
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  Sealed Auction Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let restored = self
            .service
            .restore()
            .await
            .context("restoring auction snapshots")?;
        // Settle anything whose deadline passed while the process was down.
        let report = self.service.tick().await;
        info!(restored, settled = report.settled, "auction state loaded");

        self.tasks.push(self.spawn_event_log());
        self.tasks.push(
            PhaseScheduler::new(Arc::clone(&self.service), self.config.auction.tick_interval)
                .spawn(self.shutdown_rx.clone()),
        );
        self.tasks.push(
            NetworkActivitySimulator::new(
                self.service.registry(),
                self.service.clock(),
                self.config.auction.network_activity_interval,
                self.config.auction.network_activity_max_step,
            )
            .spawn(self.shutdown_rx.clone()),
        );

        if self.config.demo {
            self.seed_demo().await?;
        }
        Ok(())
    }

    fn spawn_event_log(&self) -> JoinHandle<()> {
        let events = self.bus.stream(None);
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::pin!(events);
            loop {
                tokio::select! {
                    next = events.next() => match next {
                        Some(event) => match serde_json::to_string(&event) {
                            Ok(line) => info!(target: "auction_events", event = event.name(), "{line}"),
                            Err(e) => warn!(error = %e, "unserializable auction event"),
                        },
                        None => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn seed_demo(&self) -> Result<()> {
        let now = SystemTimeSource.now();
        let id = self
            .service
            .create_auction(CreateAuctionRequest {
                terms: AuctionTerms {
                    minimum_price: 1_000,
                    currency: "USDC".into(),
                    pricing_rule: PricingRule::Vickrey,
                    asset_chain: "Ethereum".into(),
                },
                metadata: AuctionMetadata {
                    title: "Demo lot".into(),
                    description: "Seeded by QC_AUCTION_DEMO".into(),
                    image_urls: vec!["https://example.invalid/demo.png".into()],
                    owner: BidderId::new("demo-seller"),
                },
                commit_deadline: now + 30_000,
                reveal_deadline: now + 60_000,
            })
            .await
            .context("creating demo auction")?;

        for (bidder, amount) in [("alice", 1_800), ("bob", 1_500), ("carol", 1_200)] {
            let bidder = BidderId::new(bidder);
            self.service.deposit(id, bidder.clone()).await?;
            self.service.commit(id, bidder, amount).await?;
        }
        info!(auction_id = %id, "demo auction seeded; settles in 60s");
        Ok(())
    }

    pub async fn shutdown(self) {
        info!("Shutting down auction runtime");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            match stop_task(task, SHUTDOWN_GRACE).await {
                TaskExit::Finished => {}
                TaskExit::Failed(reason) => warn!(%reason, "background task failed"),
                TaskExit::TimedOut => warn!("background task did not stop in time"),
            }
        }
        info!("Auction runtime stopped");
    }
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq)]
enum TaskExit {
    Finished,
    /// Panicked or was cancelled.
    Failed(String),
    TimedOut,
}

async fn stop_task(task: JoinHandle<()>, grace: Duration) -> TaskExit {
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(())) => TaskExit::Finished,
        Ok(Err(e)) => TaskExit::Failed(e.to_string()),
        Err(_) => TaskExit::TimedOut,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let mut runtime = AuctionRuntime::new(config)?;
    runtime.start().await?;

    info!("Auction runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
