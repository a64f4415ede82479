//! # Runtime Configuration
//!
//! Coordinator settings come from `AuctionConfig::from_env`; this adds the
//! hosting concerns.

use qc_18_sealed_auction::AuctionConfig;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Coordinator configuration.
    pub auction: AuctionConfig,
    /// Directory for JSON snapshots. In-memory only when unset.
    pub snapshot_dir: Option<PathBuf>,
    /// Create a sample auction with three bidders on startup.
    pub demo: bool,
    /// Log filter used when `RUST_LOG` is unset.
    pub default_log_filter: String,
}

impl RuntimeConfig {
    /// # Environment Variables
    ///
    /// - `QC_AUCTION_SNAPSHOT_DIR`: snapshot directory
    /// - `QC_AUCTION_DEMO`: `1`/`true` seeds a sample auction
    /// - `QC_LOG_LEVEL`: log filter when `RUST_LOG` is unset
    /// - `QC_AUCTION_*`: see `AuctionConfig::from_env`
    pub fn from_env() -> Self {
        Self {
            auction: AuctionConfig::from_env(),
            snapshot_dir: std::env::var_os("QC_AUCTION_SNAPSHOT_DIR").map(PathBuf::from),
            demo: std::env::var("QC_AUCTION_DEMO")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            default_log_filter: std::env::var("QC_LOG_LEVEL")
                .unwrap_or_else(|_| "info,qc_18_sealed_auction=debug".to_string()),
        }
    }
}
