//! Core value types shared by every auction component.
//!
//! Amounts are integer minor units of the auction currency (e.g. micro-USDC).
//! Timestamps are absolute milliseconds since the UNIX epoch; nothing in this
//! crate stores a relative "time remaining".

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// Amount in minor units of the auction currency.
pub type Amount = u128;

/// Basis points denominator (10_000 bps = 100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Opaque, immutable auction identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuctionId(pub Uuid);

impl AuctionId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for AuctionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidder (or owner) account identity.
///
/// The coordinator treats this as an opaque key; wallet address formats are
/// validated by the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidderId(pub String);

impl BidderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BidderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BidderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Pricing rule applied at settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingRule {
    /// Winner pays their own bid.
    FirstPrice,
    /// Winner pays the second-highest bid (Vickrey).
    Vickrey,
}

impl PricingRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingRule::FirstPrice => "first_price",
            PricingRule::Vickrey => "vickrey",
        }
    }
}

impl fmt::Display for PricingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PricingRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_price" | "first-price" => Ok(PricingRule::FirstPrice),
            "vickrey" | "second_price" | "second-price" => Ok(PricingRule::Vickrey),
            other => Err(format!("unsupported pricing rule: {other}")),
        }
    }
}

/// Economic terms of an auction. Frozen at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionTerms {
    /// Reserve price; commitments below it are rejected.
    pub minimum_price: Amount,
    /// Payment currency code (e.g. "USDC").
    pub currency: String,
    /// Settlement pricing rule.
    pub pricing_rule: PricingRule,
    /// Chain the auctioned asset lives on (e.g. "Ethereum").
    pub asset_chain: String,
}

/// Listing metadata. Opaque to the lifecycle; carried for the listing views.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionMetadata {
    pub title: String,
    pub description: String,
    /// Asset image locations. The first entry is the cover image.
    pub image_urls: Vec<String>,
    pub owner: BidderId,
}

impl AuctionMetadata {
    pub fn cover_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}
