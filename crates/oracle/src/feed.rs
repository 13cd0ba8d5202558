use crate::error::OracleError;
use crate::PriceOracle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configuration::OracleSettings;
use core_types::{Asset, PRICE_DECIMALS, PriceQuote};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Feed {
    decimals: u8,
    latest: Option<(u128, DateTime<Utc>)>,
}

/// In-memory registry mapping each asset to its price feed.
#[derive(Debug, Default)]
pub struct FeedRegistry {
    feeds: RwLock<HashMap<Asset, Feed>>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from the `[oracle]` config section, stamping every
    /// seeded price with the current time.
    pub fn from_settings(settings: &OracleSettings) -> Result<Self, OracleError> {
        let now = Utc::now();
        let mut feeds = HashMap::with_capacity(settings.feeds.len());
        for feed in &settings.feeds {
            // Validate the seed value up front so a bad config fails at startup.
            normalize(&feed.asset, u128::from(feed.price), feed.decimals)?;
            feeds.insert(
                feed.asset.clone(),
                Feed {
                    decimals: feed.decimals,
                    latest: Some((u128::from(feed.price), now)),
                },
            );
        }
        Ok(Self {
            feeds: RwLock::new(feeds),
        })
    }

    /// Registers a feed for `asset` reporting values with `decimals` decimals.
    /// Re-tracking an asset replaces its feed and discards the last value.
    pub async fn track_feed(&self, asset: Asset, decimals: u8) {
        tracing::debug!(%asset, decimals, "Tracking price feed");
        self.feeds.write().await.insert(
            asset,
            Feed {
                decimals,
                latest: None,
            },
        );
    }

    /// Removes the feed for `asset`. Returns whether one was registered.
    pub async fn untrack_feed(&self, asset: &Asset) -> bool {
        self.feeds.write().await.remove(asset).is_some()
    }

    /// Records a new observation for a tracked feed.
    pub async fn submit(
        &self,
        asset: &Asset,
        raw_price: u128,
        timestamp: DateTime<Utc>,
    ) -> Result<(), OracleError> {
        let mut feeds = self.feeds.write().await;
        let feed = feeds
            .get_mut(asset)
            .ok_or_else(|| OracleError::FeedNotConfigured(asset.clone()))?;
        normalize(asset, raw_price, feed.decimals)?;
        feed.latest = Some((raw_price, timestamp));
        Ok(())
    }

    /// Convenience for tests and simulations: tracks `asset` at `PRICE_DECIMALS`
    /// and submits `price` observed now.
    pub async fn set_price(&self, asset: Asset, price: u128) {
        let mut feeds = self.feeds.write().await;
        feeds.insert(
            asset,
            Feed {
                decimals: PRICE_DECIMALS as u8,
                latest: Some((price, Utc::now())),
            },
        );
    }

    pub async fn tracked_assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.feeds.read().await.keys().cloned().collect();
        assets.sort();
        assets
    }
}

#[async_trait]
impl PriceOracle for FeedRegistry {
    async fn get_price(&self, asset: &Asset) -> Result<PriceQuote, OracleError> {
        let feeds = self.feeds.read().await;
        let feed = feeds
            .get(asset)
            .ok_or_else(|| OracleError::FeedNotConfigured(asset.clone()))?;
        let (raw, timestamp) = feed
            .latest
            .ok_or_else(|| OracleError::NoFeedValue(asset.clone()))?;
        let price = normalize(asset, raw, feed.decimals)?;
        Ok(PriceQuote::new(price, timestamp))
    }
}

/// Rescales a raw feed value from `decimals` to `PRICE_DECIMALS`.
fn normalize(asset: &Asset, raw: u128, decimals: u8) -> Result<u128, OracleError> {
    let target = PRICE_DECIMALS as i32;
    let shift = target - i32::from(decimals);
    let factor = 10u128.checked_pow(shift.unsigned_abs()).ok_or_else(|| {
        OracleError::InvalidPrice(asset.clone(), "decimals out of range".to_string())
    })?;
    if shift >= 0 {
        raw.checked_mul(factor)
            .ok_or_else(|| OracleError::InvalidPrice(asset.clone(), "price overflows".to_string()))
    } else {
        Ok(raw / factor)
    }
}
