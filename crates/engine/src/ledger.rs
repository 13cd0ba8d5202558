use crate::error::FundError;
use core_types::{AccountId, CoreError, mul_div};
use std::collections::HashMap;

/// Share balances of a single fund.
///
/// `total_supply` always equals the sum of all balances. Balances only change
/// through `mint` and `burn`.
#[derive(Debug, Clone, Default)]
pub struct FundLedger {
    balances: HashMap<AccountId, u128>,
    total_supply: u128,
}

impl FundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, holder: &AccountId, shares: u128) -> Result<(), FundError> {
        if shares == 0 {
            return Err(FundError::ZeroAmount);
        }
        let supply = self
            .total_supply
            .checked_add(shares)
            .ok_or(CoreError::Overflow)?;
        let balance = self.balance_of(holder);
        // Cannot overflow: balance <= total_supply.
        self.balances.insert(holder.clone(), balance + shares);
        self.total_supply = supply;
        Ok(())
    }

    pub fn burn(&mut self, holder: &AccountId, shares: u128) -> Result<(), FundError> {
        if shares == 0 {
            return Err(FundError::ZeroAmount);
        }
        let available = self.balance_of(holder);
        if shares > available {
            return Err(FundError::InsufficientBalance {
                requested: shares,
                available,
            });
        }
        let remaining = available - shares;
        if remaining == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(holder.clone(), remaining);
        }
        self.total_supply -= shares;
        Ok(())
    }

    pub fn balance_of(&self, holder: &AccountId) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Holders with a non-zero balance, sorted by account id.
    pub fn holders(&self) -> Vec<(AccountId, u128)> {
        let mut holders: Vec<_> = self
            .balances
            .iter()
            .map(|(holder, balance)| (holder.clone(), *balance))
            .collect();
        holders.sort();
        holders
    }

    /// Shares to issue for a deposit worth `deposit_value`, given the fund's
    /// net asset value before the deposit.
    ///
    /// The first deposit into an empty supply is issued 1:1 with value.
    pub fn shares_for_deposit(
        &self,
        deposit_value: u128,
        nav_before: u128,
    ) -> Result<u128, FundError> {
        if self.total_supply == 0 {
            return Ok(deposit_value);
        }
        if nav_before == 0 {
            return Err(FundError::ZeroNetAssetValue);
        }
        Ok(mul_div(deposit_value, self.total_supply, nav_before)?)
    }
}
