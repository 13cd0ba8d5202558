use crate::error::FundError;
use crate::holdings::Holdings;
use crate::ledger::FundLedger;
use crate::proportions::{ProportionEntry, ProportionTable};
use chrono::{DateTime, Utc};
use core_types::{AccountId, Asset, AssetAmount, FundId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The immutable descriptive part of a fund, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundIdentity {
    pub id: FundId,
    pub name: String,
    pub ticker: String,
    pub creator: AccountId,
    pub created_at: DateTime<Utc>,
}

/// Everything a fund owns. Only ever accessed behind the `Fund` lock.
#[derive(Debug, Clone)]
pub struct FundState {
    pub(crate) identity: Arc<FundIdentity>,
    pub(crate) base_asset: Asset,
    /// Assets a future proportion table may name besides current holdings:
    /// the initial table plus the base asset.
    pub(crate) known_assets: BTreeSet<Asset>,
    pub(crate) managers: BTreeSet<AccountId>,
    pub(crate) proportions: ProportionTable,
    pub(crate) holdings: Holdings,
    pub(crate) ledger: FundLedger,
}

impl FundState {
    pub fn new(identity: FundIdentity, base_asset: Asset, proportions: ProportionTable) -> Self {
        let mut known_assets: BTreeSet<Asset> = proportions.assets().cloned().collect();
        known_assets.insert(base_asset.clone());
        Self {
            identity: Arc::new(identity),
            base_asset,
            known_assets,
            managers: BTreeSet::new(),
            proportions,
            holdings: Holdings::new(),
            ledger: FundLedger::new(),
        }
    }

    pub fn identity(&self) -> &FundIdentity {
        &self.identity
    }

    pub fn base_asset(&self) -> &Asset {
        &self.base_asset
    }

    pub fn proportions(&self) -> &ProportionTable {
        &self.proportions
    }

    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    pub fn ledger(&self) -> &FundLedger {
        &self.ledger
    }

    pub fn managers(&self) -> impl Iterator<Item = &AccountId> {
        self.managers.iter()
    }

    /// The creator and every manager may change weights and rebalance.
    pub fn is_authorized(&self, account: &AccountId) -> bool {
        account == &self.identity.creator || self.managers.contains(account)
    }

    pub(crate) fn ensure_authorized(
        &self,
        account: &AccountId,
        action: &str,
    ) -> Result<(), FundError> {
        if self.is_authorized(account) {
            Ok(())
        } else {
            Err(FundError::Unauthorized(account.clone(), action.to_string()))
        }
    }

    fn ensure_creator(&self, account: &AccountId, action: &str) -> Result<(), FundError> {
        if account == &self.identity.creator {
            Ok(())
        } else {
            Err(FundError::Unauthorized(account.clone(), action.to_string()))
        }
    }

    /// Replaces the whole proportion table. No asset moves until a rebalance.
    pub fn set_proportions(
        &mut self,
        caller: &AccountId,
        assets: &[Asset],
        weights: &[u8],
    ) -> Result<(), FundError> {
        self.ensure_authorized(caller, "set proportions")?;
        let table = ProportionTable::new(assets, weights)?;
        if let Some(unknown) = assets
            .iter()
            .find(|a| !self.known_assets.contains(*a) && self.holdings.get(a) == 0)
        {
            return Err(FundError::InvalidProportions(format!(
                "asset {unknown} is not tradable by this fund"
            )));
        }
        self.proportions = table;
        Ok(())
    }

    /// Returns `false` if `account` already was a manager.
    pub fn add_manager(
        &mut self,
        caller: &AccountId,
        account: AccountId,
    ) -> Result<bool, FundError> {
        self.ensure_creator(caller, "add managers")?;
        Ok(self.managers.insert(account))
    }

    /// Returns `false` if `account` was not a manager.
    pub fn remove_manager(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
    ) -> Result<bool, FundError> {
        self.ensure_creator(caller, "remove managers")?;
        Ok(self.managers.remove(account))
    }

    pub fn snapshot(&self) -> FundSnapshot {
        FundSnapshot {
            identity: (*self.identity).clone(),
            base_asset: self.base_asset.clone(),
            managers: self.managers.iter().cloned().collect(),
            proportions: self.proportions.entries().to_vec(),
            holdings: self.holdings.to_amounts(),
            balances: self.ledger.holders(),
            total_supply: self.ledger.total_supply(),
        }
    }
}

/// A serializable point-in-time view of a fund's committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundSnapshot {
    #[serde(flatten)]
    pub identity: FundIdentity,
    pub base_asset: Asset,
    pub managers: Vec<AccountId>,
    pub proportions: Vec<ProportionEntry>,
    pub holdings: Vec<AssetAmount>,
    pub balances: Vec<(AccountId, u128)>,
    pub total_supply: u128,
}
