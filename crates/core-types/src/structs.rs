use crate::enums::Asset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An address-equivalent handle for a share holder, fund creator or manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The registry identifier the factory assigns to each fund it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundId(pub Uuid);

impl FundId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A USD price for one raw unit of an asset, scaled by `PRICE_SCALE`,
/// together with the time the feed observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: u128,
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(price: u128, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }

    /// Returns `true` when the quote is older than `max_age_secs` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        let age = now.signed_duration_since(self.timestamp).num_seconds();
        age > 0 && age as u64 > max_age_secs
    }
}

/// An amount of a specific asset, used in receipts and refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub asset: Asset,
    pub amount: u128,
}

impl AssetAmount {
    pub fn new(asset: Asset, amount: u128) -> Self {
        Self { asset, amount }
    }
}
