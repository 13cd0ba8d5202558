use crate::error::FundError;
use core_types::{Asset, mul_div};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Target weights always add up to this many percentage points.
pub const TOTAL_WEIGHT: u32 = 100;

/// One asset and the percentage of fund value it should make up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionEntry {
    pub asset: Asset,
    pub weight: u8,
}

/// The ordered set of target weights a fund converges toward.
///
/// A table can only be built through `new`, which enforces the invariants, so
/// any `ProportionTable` value in existence sums to exactly 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProportionTable {
    entries: Vec<ProportionEntry>,
}

impl ProportionTable {
    pub fn new(assets: &[Asset], weights: &[u8]) -> Result<Self, FundError> {
        if assets.len() != weights.len() {
            return Err(FundError::InvalidProportions(format!(
                "{} assets but {} weights",
                assets.len(),
                weights.len()
            )));
        }
        if assets.is_empty() {
            return Err(FundError::InvalidProportions(
                "at least one asset is required".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(assets.len());
        for asset in assets {
            if !seen.insert(asset) {
                return Err(FundError::InvalidProportions(format!(
                    "asset {asset} is listed more than once"
                )));
            }
        }
        let total: u32 = weights.iter().map(|w| u32::from(*w)).sum();
        if total != TOTAL_WEIGHT {
            return Err(FundError::InvalidProportions(format!(
                "weights sum to {total}, expected {TOTAL_WEIGHT}"
            )));
        }

        let entries = assets
            .iter()
            .zip(weights)
            .map(|(asset, weight)| ProportionEntry {
                asset: asset.clone(),
                weight: *weight,
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ProportionEntry] {
        &self.entries
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.entries.iter().map(|e| &e.asset)
    }

    /// Target weight of `asset`; assets not in the table have weight 0.
    pub fn weight_of(&self, asset: &Asset) -> u8 {
        self.entries
            .iter()
            .find(|e| &e.asset == asset)
            .map_or(0, |e| e.weight)
    }

    pub fn as_pairs(&self) -> Vec<(Asset, u8)> {
        self.entries
            .iter()
            .map(|e| (e.asset.clone(), e.weight))
            .collect()
    }

    /// Splits `amount` across the table by weight, in table order.
    ///
    /// Each portion is `amount * weight / 100` rounded down. The division
    /// remainder goes to the first entry with a non-zero weight, so the
    /// portions always add up to `amount`.
    pub fn split(&self, amount: u128) -> Result<Vec<(Asset, u128)>, FundError> {
        let mut portions = Vec::with_capacity(self.entries.len());
        let mut allocated: u128 = 0;
        for entry in &self.entries {
            let portion = mul_div(amount, u128::from(entry.weight), u128::from(TOTAL_WEIGHT))?;
            allocated += portion;
            portions.push((entry.asset.clone(), portion));
        }

        let remainder = amount - allocated;
        if remainder > 0 {
            if let Some(index) = self.entries.iter().position(|e| e.weight > 0) {
                portions[index].1 += remainder;
            }
        }
        Ok(portions)
    }
}
