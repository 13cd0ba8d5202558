use crate::error::FactoryError;
use core_types::AccountId;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// The fungible token creation fees are paid in.
#[derive(Debug, Default)]
pub struct FeeToken {
    balances: Mutex<HashMap<AccountId, u128>>,
}

impl FeeToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `account` out of thin air.
    pub async fn mint(&self, account: &AccountId, amount: u128) {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(account.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub async fn balance_of(&self, account: &AccountId) -> u128 {
        self.balances.lock().await.get(account).copied().unwrap_or(0)
    }

    /// Moves `amount` from `from` to `to`, or nothing at all.
    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), FactoryError> {
        let mut balances = self.balances.lock().await;
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(FactoryError::InsufficientFee {
                required: amount,
                available,
            });
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        balances.insert(from.clone(), available - amount);
        let credited = balances.entry(to.clone()).or_insert(0);
        *credited = credited.saturating_add(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transfer_moves_balance() {
        let token = FeeToken::new();
        let (alice, treasury) = (AccountId::new("alice"), AccountId::new("treasury"));
        token.mint(&alice, 10).await;

        token.transfer(&alice, &treasury, 4).await.unwrap();
        assert_eq!(token.balance_of(&alice).await, 6);
        assert_eq!(token.balance_of(&treasury).await, 4);
    }

    #[tokio::test]
    async fn transfer_beyond_balance_fails_whole() {
        let token = FeeToken::new();
        let (alice, treasury) = (AccountId::new("alice"), AccountId::new("treasury"));
        token.mint(&alice, 3).await;

        assert_eq!(
            token.transfer(&alice, &treasury, 5).await,
            Err(FactoryError::InsufficientFee {
                required: 5,
                available: 3
            })
        );
        assert_eq!(token.balance_of(&alice).await, 3);
        assert_eq!(token.balance_of(&treasury).await, 0);
    }
}
