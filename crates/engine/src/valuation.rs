use crate::error::FundError;
use crate::holdings::Holdings;
use chrono::{DateTime, Utc};
use core_types::{Asset, value_of};
use oracle::PriceOracle;
use std::collections::BTreeMap;

/// Prices fetched once per operation, so every leg of a buy, sell or
/// rebalance is valued against the same quotes.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: BTreeMap<Asset, u128>,
}

impl PriceBook {
    /// Quotes every asset in `assets`. A zero price or a quote older than
    /// `max_age_secs` is unusable.
    pub async fn load<'a>(
        oracle: &dyn PriceOracle,
        assets: impl IntoIterator<Item = &'a Asset>,
        max_age_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, FundError> {
        let mut prices = BTreeMap::new();
        for asset in assets {
            if prices.contains_key(asset) {
                continue;
            }
            let quote = oracle.get_price(asset).await?;
            if quote.price == 0 {
                return Err(FundError::PriceUnavailable {
                    asset: asset.clone(),
                    reason: "oracle reported a zero price".to_string(),
                });
            }
            if quote.is_stale(now, max_age_secs) {
                return Err(FundError::PriceUnavailable {
                    asset: asset.clone(),
                    reason: format!(
                        "quote from {} is older than {max_age_secs}s",
                        quote.timestamp
                    ),
                });
            }
            tracing::debug!(%asset, price = quote.price, "Loaded price");
            prices.insert(asset.clone(), quote.price);
        }
        Ok(Self { prices })
    }

    pub fn price(&self, asset: &Asset) -> Result<u128, FundError> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| FundError::PriceUnavailable {
                asset: asset.clone(),
                reason: "asset was not priced for this operation".to_string(),
            })
    }

    pub fn value_of(&self, asset: &Asset, amount: u128) -> Result<u128, FundError> {
        Ok(value_of(amount, self.price(asset)?)?)
    }

    /// Net asset value of `holdings`: the sum of every holding at its price.
    pub fn nav(&self, holdings: &Holdings) -> Result<u128, FundError> {
        holdings.iter().try_fold(0u128, |acc, (asset, amount)| {
            let value = self.value_of(asset, amount)?;
            acc.checked_add(value)
                .ok_or(FundError::Arithmetic(core_types::CoreError::Overflow))
        })
    }
}
