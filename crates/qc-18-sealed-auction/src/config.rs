//! Auction coordinator configuration.
//!
//! All values have defaults; `from_env` overrides them from `QC_AUCTION_*`
//! variables. Invalid overrides fall back to the default.

use crate::domain::ForfeiturePolicy;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Seven days in milliseconds.
pub const DEFAULT_PAYMENT_WINDOW_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bond rate {0} bps exceeds 10000 bps")]
    BondRateTooHigh(u32),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct AuctionConfig {
    /// Bond as basis points of the minimum price (1500 = 15%).
    pub bond_rate_bps: u32,
    /// Winner's final payment window after settlement, in milliseconds.
    pub payment_window_ms: u64,
    /// How a forfeited bond is earmarked.
    pub forfeiture_policy: ForfeiturePolicy,
    /// Phase scheduler tick.
    pub tick_interval: Duration,
    /// Interval of the synthetic network-activity task.
    pub network_activity_interval: Duration,
    /// Upper bound of one synthetic activity increment.
    pub network_activity_max_step: u64,
    /// Capacity of the lifecycle event channel.
    pub event_channel_capacity: usize,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            bond_rate_bps: 1_500,
            payment_window_ms: DEFAULT_PAYMENT_WINDOW_MS,
            forfeiture_policy: ForfeiturePolicy::EqualSplit,
            tick_interval: Duration::from_secs(1),
            network_activity_interval: Duration::from_secs(3),
            network_activity_max_step: 5,
            event_channel_capacity: 1_024,
        }
    }
}

impl AuctionConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_AUCTION_BOND_RATE_BPS` (default: 1500)
    /// - `QC_AUCTION_PAYMENT_WINDOW_SECS` (default: 604800)
    /// - `QC_AUCTION_FORFEITURE_POLICY`: `equal_split` | `external`
    /// - `QC_AUCTION_TICK_MS` (default: 1000)
    /// - `QC_AUCTION_ACTIVITY_INTERVAL_MS` (default: 3000)
    /// - `QC_AUCTION_ACTIVITY_MAX_STEP` (default: 5)
    /// - `QC_AUCTION_EVENT_CAPACITY` (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bond_rate_bps: parse_env("QC_AUCTION_BOND_RATE_BPS").unwrap_or(defaults.bond_rate_bps),
            payment_window_ms: parse_env::<u64>("QC_AUCTION_PAYMENT_WINDOW_SECS")
                .map(|secs| secs.saturating_mul(1_000))
                .unwrap_or(defaults.payment_window_ms),
            forfeiture_policy: parse_env("QC_AUCTION_FORFEITURE_POLICY")
                .unwrap_or(defaults.forfeiture_policy),
            tick_interval: parse_env("QC_AUCTION_TICK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            network_activity_interval: parse_env("QC_AUCTION_ACTIVITY_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.network_activity_interval),
            network_activity_max_step: parse_env("QC_AUCTION_ACTIVITY_MAX_STEP")
                .unwrap_or(defaults.network_activity_max_step),
            event_channel_capacity: parse_env("QC_AUCTION_EVENT_CAPACITY")
                .unwrap_or(defaults.event_channel_capacity),
        }
    }

    /// Reject configurations the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bond_rate_bps > 10_000 {
            return Err(ConfigError::BondRateTooHigh(self.bond_rate_bps));
        }
        if self.payment_window_ms == 0 {
            return Err(ConfigError::ZeroValue("payment_window_ms"));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroValue("tick_interval"));
        }
        if self.network_activity_interval.is_zero() {
            return Err(ConfigError::ZeroValue("network_activity_interval"));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::ZeroValue("event_channel_capacity"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
