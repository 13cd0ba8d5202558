use crate::error::FundError;
use crate::holdings::Holdings;
use crate::proportions::ProportionTable;
use crate::state::{FundIdentity, FundSnapshot, FundState};
use crate::valuation::PriceBook;
use chrono::Utc;
use configuration::EngineSettings;
use core_types::{
    AccountId, Asset, AssetAmount, BPS_DENOMINATOR, CoreError, FundId, amount_for_value, mul_div,
};
use events::{EventSender, FundEvent, publish};
use oracle::PriceOracle;
use router::SwapRouter;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What a successful `buy` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyReceipt {
    pub shares: u128,
    pub deposit_value: u128,
    pub nav_before: u128,
    /// Amounts added to the fund's holdings, in table order.
    pub acquired: Vec<AssetAmount>,
}

/// What a successful `sell` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellReceipt {
    pub shares: u128,
    /// Base asset paid out to the seller.
    pub proceeds: u128,
    /// Amounts taken out of the fund's holdings.
    pub withdrawn: Vec<AssetAmount>,
}

/// One executed swap that may have to be reversed.
#[derive(Debug, Clone)]
struct SwapLeg {
    asset: Asset,
    amount_in: u128,
    amount_out: u128,
}

/// A handle to one fund.
///
/// Cloning is cheap and every clone refers to the same state. All operations
/// take the fund lock for their whole duration, including the awaited oracle
/// and router calls, so operations on one fund never interleave.
#[derive(Clone)]
pub struct Fund {
    pub(crate) identity: Arc<FundIdentity>,
    pub(crate) state: Arc<Mutex<FundState>>,
    pub(crate) oracle: Arc<dyn PriceOracle>,
    pub(crate) router: Arc<dyn SwapRouter>,
    pub(crate) settings: EngineSettings,
    pub(crate) events: Option<EventSender>,
}

impl std::fmt::Debug for Fund {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fund")
            .field("id", &self.identity.id)
            .field("ticker", &self.identity.ticker)
            .finish_non_exhaustive()
    }
}

impl Fund {
    pub fn new(
        state: FundState,
        oracle: Arc<dyn PriceOracle>,
        router: Arc<dyn SwapRouter>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            identity: Arc::clone(&state.identity),
            state: Arc::new(Mutex::new(state)),
            oracle,
            router,
            settings,
            events: None,
        }
    }

    /// Publishes every committed or rolled back operation on `sender`.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn id(&self) -> FundId {
        self.identity.id
    }

    pub fn fund_name(&self) -> &str {
        &self.identity.name
    }

    pub fn fund_ticker(&self) -> &str {
        &self.identity.ticker
    }

    pub fn creator(&self) -> &AccountId {
        &self.identity.creator
    }

    pub fn identity(&self) -> &FundIdentity {
        &self.identity
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // --- Queries ---

    /// Amount of `asset` the fund currently holds.
    pub async fn token_balance(&self, asset: &Asset) -> u128 {
        self.state.lock().await.holdings.get(asset)
    }

    /// Target weight of `asset` in percentage points.
    pub async fn target_proportions(&self, asset: &Asset) -> u8 {
        self.state.lock().await.proportions.weight_of(asset)
    }

    pub async fn balance_of(&self, holder: &AccountId) -> u128 {
        self.state.lock().await.ledger.balance_of(holder)
    }

    pub async fn total_supply(&self) -> u128 {
        self.state.lock().await.ledger.total_supply()
    }

    pub async fn proportions(&self) -> ProportionTable {
        self.state.lock().await.proportions.clone()
    }

    pub async fn holdings(&self) -> Holdings {
        self.state.lock().await.holdings.clone()
    }

    pub async fn base_asset(&self) -> Asset {
        self.state.lock().await.base_asset.clone()
    }

    pub async fn managers(&self) -> Vec<AccountId> {
        self.state.lock().await.managers().cloned().collect()
    }

    pub async fn is_authorized(&self, account: &AccountId) -> bool {
        self.state.lock().await.is_authorized(account)
    }

    /// Oracle value of everything the fund holds.
    pub async fn net_asset_value(&self) -> Result<u128, FundError> {
        let state = self.state.lock().await;
        let book = self.price_book(state.holdings.assets()).await?;
        book.nav(&state.holdings)
    }

    pub async fn snapshot(&self) -> FundSnapshot {
        self.state.lock().await.snapshot()
    }

    // --- Administration ---

    /// Replaces the target weights. Creator or manager only.
    pub async fn set_proportions(
        &self,
        caller: &AccountId,
        assets: &[Asset],
        weights: &[u8],
    ) -> Result<(), FundError> {
        let mut state = self.state.lock().await;
        state.set_proportions(caller, assets, weights)?;
        let proportions = state.proportions.as_pairs();
        drop(state);

        tracing::info!(fund = %self.identity.id, %caller, ?proportions, "Proportions updated");
        self.emit(FundEvent::ProportionsUpdated {
            fund: self.identity.id,
            by: caller.clone(),
            proportions,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Grants `account` the manager role. Creator only.
    pub async fn add_manager(
        &self,
        caller: &AccountId,
        account: AccountId,
    ) -> Result<(), FundError> {
        let added = self
            .state
            .lock()
            .await
            .add_manager(caller, account.clone())?;
        if added {
            tracing::info!(fund = %self.identity.id, manager = %account, "Manager added");
            self.emit(FundEvent::ManagerAdded {
                fund: self.identity.id,
                manager: account,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Revokes the manager role from `account`. Creator only.
    pub async fn remove_manager(
        &self,
        caller: &AccountId,
        account: &AccountId,
    ) -> Result<(), FundError> {
        let removed = self.state.lock().await.remove_manager(caller, account)?;
        if removed {
            tracing::info!(fund = %self.identity.id, manager = %account, "Manager removed");
            self.emit(FundEvent::ManagerRemoved {
                fund: self.identity.id,
                manager: account.clone(),
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    // --- Buy ---

    /// Converts a base-asset deposit into the basket and issues shares.
    ///
    /// Either every leg succeeds and the fund commits holdings and shares
    /// together, or the fund state is left exactly as it was. Once any swap has
    /// executed, a failure unwinds the executed swaps and is reported as
    /// `FundError::RolledBack` carrying what the caller gets back.
    pub async fn buy(&self, caller: &AccountId, deposit: u128) -> Result<BuyReceipt, FundError> {
        if deposit == 0 {
            return Err(FundError::ZeroAmount);
        }
        let mut state = self.state.lock().await;
        let base = state.base_asset.clone();

        // 1. Price everything held, every weighted target and the base asset.
        let mut to_price: BTreeSet<&Asset> = state.holdings.assets().collect();
        to_price.extend(
            state
                .proportions
                .entries()
                .iter()
                .filter(|e| e.weight > 0)
                .map(|e| &e.asset),
        );
        to_price.insert(&base);
        let book = self.price_book(to_price).await?;
        let nav_before = book.nav(&state.holdings)?;

        // 2. Split the deposit by target weight.
        let portions = state.proportions.split(deposit)?;
        tracing::debug!(fund = %self.identity.id, %caller, deposit, nav_before, ?portions, "Buying basket");

        // 3. Execute and stage. Nothing below touches `state` until commit.
        let mut legs: Vec<SwapLeg> = Vec::new();
        let staged = self
            .stage_buy(&state, &book, &base, caller, &portions, nav_before, &mut legs)
            .await;

        match staged {
            Ok((holdings, ledger, receipt)) => {
                // 4. Commit.
                state.holdings = holdings;
                state.ledger = ledger;
                drop(state);

                tracing::info!(
                    fund = %self.identity.id, %caller, deposit,
                    deposit_value = receipt.deposit_value, shares = receipt.shares,
                    "Buy committed"
                );
                self.emit(FundEvent::Bought {
                    fund: self.identity.id,
                    holder: caller.clone(),
                    deposit,
                    deposit_value: receipt.deposit_value,
                    shares: receipt.shares,
                    timestamp: Utc::now(),
                });
                Ok(receipt)
            }
            Err(cause) if legs.is_empty() => Err(cause),
            Err(cause) => {
                let refund = self.unwind_buy(&base, deposit, &legs).await;
                drop(state);
                tracing::warn!(
                    fund = %self.identity.id, %caller, deposit, error = %cause, ?refund,
                    "Buy rolled back"
                );
                self.emit(FundEvent::BuyRolledBack {
                    fund: self.identity.id,
                    holder: caller.clone(),
                    deposit,
                    refund: refund.clone(),
                    reason: cause.to_string(),
                    timestamp: Utc::now(),
                });
                Err(FundError::RolledBack {
                    cause: Box::new(cause),
                    refund,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_buy(
        &self,
        state: &FundState,
        book: &PriceBook,
        base: &Asset,
        caller: &AccountId,
        portions: &[(Asset, u128)],
        nav_before: u128,
        legs: &mut Vec<SwapLeg>,
    ) -> Result<(Holdings, crate::ledger::FundLedger, BuyReceipt), FundError> {
        let mut acquired = Vec::with_capacity(portions.len());
        for (asset, portion) in portions {
            if *portion == 0 {
                continue;
            }
            if asset == base {
                acquired.push(AssetAmount::new(asset.clone(), *portion));
                continue;
            }
            let min_out = self.min_amount_out(book, base, asset, *portion)?;
            let received = self
                .router
                .swap_exact_in(base, asset, *portion, min_out)
                .await?;
            tracing::debug!(%asset, amount_in = portion, received, min_out, "Buy leg executed");
            legs.push(SwapLeg {
                asset: asset.clone(),
                amount_in: *portion,
                amount_out: received,
            });
            acquired.push(AssetAmount::new(asset.clone(), received));
        }

        // 4. Value what was actually received, then price it in shares.
        let mut deposit_value: u128 = 0;
        for item in &acquired {
            deposit_value = deposit_value
                .checked_add(book.value_of(&item.asset, item.amount)?)
                .ok_or(CoreError::Overflow)?;
        }
        let shares = state.ledger.shares_for_deposit(deposit_value, nav_before)?;
        if shares == 0 {
            return Err(FundError::ZeroAmount);
        }

        let mut holdings = state.holdings.clone();
        for item in &acquired {
            holdings.credit(&item.asset, item.amount)?;
        }
        let mut ledger = state.ledger.clone();
        ledger.mint(caller, shares)?;

        Ok((
            holdings,
            ledger,
            BuyReceipt {
                shares,
                deposit_value,
                nav_before,
                acquired,
            },
        ))
    }

    /// Reverses executed buy legs, newest first, and works out the refund:
    /// the unspent deposit plus whatever the unwinds recovered, and in-kind
    /// amounts for legs that could not be reversed.
    async fn unwind_buy(&self, base: &Asset, deposit: u128, legs: &[SwapLeg]) -> Vec<AssetAmount> {
        let spent: u128 = legs.iter().map(|leg| leg.amount_in).sum();
        let mut refund_base = deposit.saturating_sub(spent);
        let mut in_kind = Vec::new();
        for leg in legs.iter().rev() {
            match self
                .router
                .swap_exact_in(&leg.asset, base, leg.amount_out, 0)
                .await
            {
                Ok(recovered) => {
                    tracing::debug!(asset = %leg.asset, amount = leg.amount_out, recovered, "Buy leg unwound");
                    refund_base = refund_base.saturating_add(recovered);
                }
                Err(e) => {
                    tracing::error!(
                        fund = %self.identity.id, asset = %leg.asset, amount = leg.amount_out, error = %e,
                        "Failed to unwind buy leg; refunding in kind"
                    );
                    in_kind.push(AssetAmount::new(leg.asset.clone(), leg.amount_out));
                }
            }
        }

        let mut refund = Vec::with_capacity(in_kind.len() + 1);
        if refund_base > 0 {
            refund.push(AssetAmount::new(base.clone(), refund_base));
        }
        refund.extend(in_kind);
        refund
    }

    // --- Sell ---

    /// Redeems `shares` for a pro-rata slice of every holding, converted to
    /// the base asset.
    ///
    /// On failure no shares are burnt. Executed swaps are reversed and the
    /// fund keeps whatever the reversal recovered, or the base proceeds if the
    /// reversal itself fails.
    pub async fn sell(&self, caller: &AccountId, shares: u128) -> Result<SellReceipt, FundError> {
        if shares == 0 {
            return Err(FundError::ZeroAmount);
        }
        let mut state = self.state.lock().await;
        let available = state.ledger.balance_of(caller);
        if shares > available {
            return Err(FundError::InsufficientBalance {
                requested: shares,
                available,
            });
        }
        let supply_before = state.ledger.total_supply();
        let base = state.base_asset.clone();

        let mut to_price: BTreeSet<&Asset> = state.holdings.assets().collect();
        to_price.insert(&base);
        let book = self.price_book(to_price).await?;

        // Work out each withdrawal up front: one floor per holding.
        let mut withdrawals = Vec::new();
        for (asset, holding) in state.holdings.iter() {
            let withdraw = mul_div(holding, shares, supply_before)?;
            if withdraw > 0 {
                withdrawals.push(AssetAmount::new(asset.clone(), withdraw));
            }
        }
        tracing::debug!(fund = %self.identity.id, %caller, shares, supply_before, ?withdrawals, "Selling basket");

        let mut legs: Vec<SwapLeg> = Vec::new();
        let staged = self
            .stage_sell(&state, &book, &base, caller, shares, &withdrawals, &mut legs)
            .await;

        match staged {
            Ok((holdings, ledger, proceeds)) => {
                state.holdings = holdings;
                state.ledger = ledger;
                drop(state);

                tracing::info!(fund = %self.identity.id, %caller, shares, proceeds, "Sell committed");
                self.emit(FundEvent::Sold {
                    fund: self.identity.id,
                    holder: caller.clone(),
                    shares,
                    proceeds,
                    timestamp: Utc::now(),
                });
                Ok(SellReceipt {
                    shares,
                    proceeds,
                    withdrawn: withdrawals,
                })
            }
            Err(cause) if legs.is_empty() => Err(cause),
            Err(cause) => {
                self.unwind_sell(&mut state, &base, &legs).await;
                drop(state);
                tracing::warn!(fund = %self.identity.id, %caller, shares, error = %cause, "Sell rolled back");
                self.emit(FundEvent::SellRolledBack {
                    fund: self.identity.id,
                    holder: caller.clone(),
                    shares,
                    reason: cause.to_string(),
                    timestamp: Utc::now(),
                });
                Err(FundError::RolledBack {
                    cause: Box::new(cause),
                    refund: Vec::new(),
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_sell(
        &self,
        state: &FundState,
        book: &PriceBook,
        base: &Asset,
        caller: &AccountId,
        shares: u128,
        withdrawals: &[AssetAmount],
        legs: &mut Vec<SwapLeg>,
    ) -> Result<(Holdings, crate::ledger::FundLedger, u128), FundError> {
        let mut proceeds: u128 = 0;
        for item in withdrawals {
            let received = if &item.asset == base {
                item.amount
            } else {
                let min_out = self.min_amount_out(book, &item.asset, base, item.amount)?;
                let received = self
                    .router
                    .swap_exact_in(&item.asset, base, item.amount, min_out)
                    .await?;
                tracing::debug!(asset = %item.asset, amount_in = item.amount, received, min_out, "Sell leg executed");
                legs.push(SwapLeg {
                    asset: item.asset.clone(),
                    amount_in: item.amount,
                    amount_out: received,
                });
                received
            };
            proceeds = proceeds.checked_add(received).ok_or(CoreError::Overflow)?;
        }

        let mut holdings = state.holdings.clone();
        for item in withdrawals {
            holdings.debit(&item.asset, item.amount)?;
        }
        let mut ledger = state.ledger.clone();
        ledger.burn(caller, shares)?;
        Ok((holdings, ledger, proceeds))
    }

    /// Swaps executed sell legs back into their assets. The holdings end up
    /// with the recovered amount in place of what was withdrawn, or with the
    /// base proceeds if a leg cannot be reversed.
    async fn unwind_sell(&self, state: &mut FundState, base: &Asset, legs: &[SwapLeg]) {
        for leg in legs.iter().rev() {
            let reversal = self
                .router
                .swap_exact_in(base, &leg.asset, leg.amount_out, 0)
                .await;
            let applied = match reversal {
                Ok(recovered) => {
                    tracing::debug!(asset = %leg.asset, amount = leg.amount_out, recovered, "Sell leg unwound");
                    state
                        .holdings
                        .debit(&leg.asset, leg.amount_in)
                        .and_then(|_| state.holdings.credit(&leg.asset, recovered))
                }
                Err(e) => {
                    tracing::error!(
                        fund = %self.identity.id, asset = %leg.asset, amount = leg.amount_out, error = %e,
                        "Failed to unwind sell leg; fund keeps base proceeds"
                    );
                    state
                        .holdings
                        .debit(&leg.asset, leg.amount_in)
                        .and_then(|_| state.holdings.credit(base, leg.amount_out))
                }
            };
            if let Err(e) = applied {
                tracing::error!(fund = %self.identity.id, asset = %leg.asset, error = %e, "Could not record sell unwind");
            }
        }
    }

    // --- Helpers ---

    pub(crate) async fn price_book<'a>(
        &self,
        assets: impl IntoIterator<Item = &'a Asset>,
    ) -> Result<PriceBook, FundError> {
        PriceBook::load(
            self.oracle.as_ref(),
            assets,
            self.settings.max_price_age_secs,
            Utc::now(),
        )
        .await
    }

    /// Oracle-expected output of converting `amount_in`, less the configured
    /// slippage allowance.
    pub(crate) fn min_amount_out(
        &self,
        book: &PriceBook,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: u128,
    ) -> Result<u128, FundError> {
        let expected = amount_for_value(
            book.value_of(asset_in, amount_in)?,
            book.price(asset_out)?,
        )?;
        let kept = BPS_DENOMINATOR.saturating_sub(u128::from(self.settings.max_slippage_bps));
        Ok(mul_div(expected, kept, BPS_DENOMINATOR)?)
    }

    pub(crate) fn emit(&self, event: FundEvent) {
        publish(self.events.as_ref(), event);
    }
}
