//! Adapters for the auction subsystem
//!
//! - `event_bus`: broadcast-backed `AuctionEventPublisher`
//! - `store`: in-memory and JSON-file `SnapshotStore`s
//! - `clock`: manually driven `TimeSource`
//! - `capabilities`: local proof verifier and payment gateway

pub mod capabilities;
pub mod clock;
pub mod event_bus;
pub mod store;

pub use capabilities::{DigestProofVerifier, PaymentRecord, RecordingPaymentGateway};
pub use clock::ManualClock;
pub use event_bus::{BroadcastEventBus, DEFAULT_EVENT_CAPACITY};
pub use store::{InMemorySnapshotStore, JsonFileSnapshotStore};
