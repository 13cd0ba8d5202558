use crate::error::FundError;
use core_types::{Asset, AssetAmount, CoreError};
use serde::Serialize;
use std::collections::BTreeMap;

/// Amounts of each asset the fund custodies. Zero entries are pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Holdings(BTreeMap<Asset, u128>);

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset: &Asset) -> u128 {
        self.0.get(asset).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, asset: &Asset, amount: u128) -> Result<(), FundError> {
        if amount == 0 {
            return Ok(());
        }
        let updated = self.get(asset).checked_add(amount).ok_or(CoreError::Overflow)?;
        self.0.insert(asset.clone(), updated);
        Ok(())
    }

    pub fn debit(&mut self, asset: &Asset, amount: u128) -> Result<(), FundError> {
        if amount == 0 {
            return Ok(());
        }
        let available = self.get(asset);
        if amount > available {
            return Err(FundError::InsufficientHoldings {
                asset: asset.clone(),
                requested: amount,
                available,
            });
        }
        if amount == available {
            self.0.remove(asset);
        } else {
            self.0.insert(asset.clone(), available - amount);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Asset, u128)> {
        self.0.iter().map(|(asset, amount)| (asset, *amount))
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_amounts(&self) -> Vec<AssetAmount> {
        self.iter()
            .map(|(asset, amount)| AssetAmount::new(asset.clone(), amount))
            .collect()
    }
}
