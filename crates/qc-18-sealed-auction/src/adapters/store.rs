//! Snapshot stores.
//!
//! Each auction is one record. A save whose revision is not newer than the
//! stored one is dropped, so saves racing out of order cannot roll an auction
//! back.

use crate::domain::{Auction, AuctionId};
use crate::ports::outbound::{SnapshotStore, StoreError};
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

#[derive(Default)]
pub struct InMemorySnapshotStore {
    records: RwLock<HashMap<AuctionId, Auction>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, auction_id: &AuctionId) -> Option<Auction> {
        self.records.read().get(auction_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, auction: &Auction) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let stale = records
            .get(&auction.id())
            .is_some_and(|stored| stored.revision() >= auction.revision());
        if !stale {
            records.insert(auction.id(), auction.clone());
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Auction>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }
}

// =============================================================================
// JSON FILE STORE
// =============================================================================

/// One `<auction-id>.json` file per auction in a directory held under an
/// exclusive `fs2` lock.
///
/// Files are written to a temporary name and renamed into place.
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
    revisions: Arc<Mutex<HashMap<AuctionId, u64>>>,
    lock: File,
}

impl JsonFileSnapshotStore {
    const LOCK_FILE: &'static str = "LOCK";
    const EXTENSION: &'static str = "json";

    /// Open (creating if needed) a snapshot directory.
    ///
    /// # Errors
    ///
    /// `StoreError::Locked` if another process holds the directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let lock_path = dir.join(Self::LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked {
                path: lock_path.display().to_string(),
            });
        }
        debug!(dir = %dir.display(), "snapshot directory opened");
        Ok(Self {
            dir,
            revisions: Arc::new(Mutex::new(HashMap::new())),
            lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(dir: &Path, auction_id: &AuctionId) -> PathBuf {
        dir.join(format!("{auction_id}.{}", Self::EXTENSION))
    }
}

impl Drop for JsonFileSnapshotStore {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn save(&self, auction: &Auction) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(auction)?;
        let auction_id = auction.id();
        let revision = auction.revision();
        let path = Self::record_path(&self.dir, &auction_id);
        let revisions = Arc::clone(&self.revisions);

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            // Held across the write so two saves of one auction cannot interleave.
            let mut revisions = revisions.lock();
            if revisions
                .get(&auction_id)
                .is_some_and(|&stored| stored >= revision)
            {
                return Ok(());
            }
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, &bytes)?;
            fs::rename(&tmp, &path)?;
            revisions.insert(auction_id, revision);
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task {
            reason: e.to_string(),
        })?
    }

    async fn load_all(&self) -> Result<Vec<Auction>, StoreError> {
        let dir = self.dir.clone();
        let revisions = Arc::clone(&self.revisions);

        tokio::task::spawn_blocking(move || -> Result<Vec<Auction>, StoreError> {
            let mut auctions = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
                    continue;
                }
                let bytes = fs::read(&path)?;
                match serde_json::from_slice::<Auction>(&bytes) {
                    Ok(auction) => auctions.push(auction),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable snapshot"),
                }
            }
            let mut revisions = revisions.lock();
            for auction in &auctions {
                revisions.insert(auction.id(), auction.revision());
            }
            Ok(auctions)
        })
        .await
        .map_err(|e| StoreError::Task {
            reason: e.to_string(),
        })?
    }
}
