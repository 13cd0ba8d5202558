use crate::error::RouterError;
use crate::SwapRouter;
use async_trait::async_trait;
use configuration::Simulation;
use core_types::{Asset, BPS_DENOMINATOR, amount_for_value, mul_div, value_of};
use oracle::PriceOracle;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Converts a configured fraction (0.003) into basis points (30).
fn pct_to_bps(name: &str, pct: Decimal) -> Result<u128, RouterError> {
    if pct.is_sign_negative() || pct >= Decimal::ONE {
        return Err(RouterError::InvalidParameters(format!(
            "{name} must be in [0, 1), got {pct}"
        )));
    }
    (pct * dec!(10000))
        .round()
        .to_u128()
        .ok_or_else(|| RouterError::InvalidParameters(format!("{name} is not representable")))
}

/// The "virtual venue" for simulations.
///
/// Swaps execute at the oracle rate, less the configured fee and slippage, and
/// are paid out of per-asset reserves. An asset without a reserve has no route.
pub struct SimulatedRouter {
    params: Simulation,
    fee_bps: u128,
    slippage_bps: u128,
    oracle: Arc<dyn PriceOracle>,
    reserves: Mutex<HashMap<Asset, u128>>,
    disabled_routes: Mutex<HashSet<(Asset, Asset)>>,
}

impl SimulatedRouter {
    /// Creates a venue seeded with the reserves listed in `params.pools`.
    pub fn new(params: Simulation, oracle: Arc<dyn PriceOracle>) -> Result<Self, RouterError> {
        let fee_bps = pct_to_bps("swap_fee_pct", params.swap_fee_pct)?;
        let slippage_bps = pct_to_bps("slippage_pct", params.slippage_pct)?;
        if fee_bps + slippage_bps >= BPS_DENOMINATOR {
            return Err(RouterError::InvalidParameters(
                "swap_fee_pct + slippage_pct must be below 1".to_string(),
            ));
        }
        let reserves = params
            .pools
            .iter()
            .map(|pool| (pool.asset.clone(), u128::from(pool.reserve)))
            .collect();
        Ok(Self {
            params,
            fee_bps,
            slippage_bps,
            oracle,
            reserves: Mutex::new(reserves),
            disabled_routes: Mutex::new(HashSet::new()),
        })
    }

    pub fn params(&self) -> &Simulation {
        &self.params
    }

    /// Adds `amount` to the reserve of `asset`, opening a pool if needed.
    pub async fn add_liquidity(&self, asset: Asset, amount: u128) {
        let mut reserves = self.reserves.lock().await;
        let reserve = reserves.entry(asset).or_insert(0);
        *reserve = reserve.saturating_add(amount);
    }

    pub async fn reserve_of(&self, asset: &Asset) -> Option<u128> {
        self.reserves.lock().await.get(asset).copied()
    }

    /// Makes swaps from `asset_in` to `asset_out` fail with `InsufficientLiquidity`.
    pub async fn disable_route(&self, asset_in: Asset, asset_out: Asset) {
        self.disabled_routes.lock().await.insert((asset_in, asset_out));
    }

    pub async fn enable_route(&self, asset_in: &Asset, asset_out: &Asset) {
        self.disabled_routes
            .lock()
            .await
            .remove(&(asset_in.clone(), asset_out.clone()));
    }

    /// Calculates the output of a swap, modeling fee and slippage.
    ///
    /// The fair output is the oracle value of `amount_in` expressed in
    /// `asset_out`; both costs reduce it proportionally.
    pub async fn quote(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: u128,
    ) -> Result<u128, RouterError> {
        let price_in = self.oracle.get_price(asset_in).await?.price;
        let price_out = self.oracle.get_price(asset_out).await?.price;
        let fair = amount_for_value(value_of(amount_in, price_in)?, price_out)?;
        let kept = BPS_DENOMINATOR - self.fee_bps - self.slippage_bps;
        let amount_out = mul_div(fair, kept, BPS_DENOMINATOR)?;
        tracing::debug!(
            %asset_in, %asset_out, amount_in, fair, amount_out,
            "Simulated swap quote"
        );
        Ok(amount_out)
    }
}

#[async_trait]
impl SwapRouter for SimulatedRouter {
    async fn swap_exact_in(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, RouterError> {
        if amount_in == 0 {
            return Err(RouterError::ZeroAmount);
        }
        if asset_in == asset_out {
            return Err(RouterError::SameAsset(asset_in.clone()));
        }
        let no_route = |reason: &str| RouterError::InsufficientLiquidity {
            asset_in: asset_in.clone(),
            asset_out: asset_out.clone(),
            reason: reason.to_string(),
        };

        if self
            .disabled_routes
            .lock()
            .await
            .contains(&(asset_in.clone(), asset_out.clone()))
        {
            return Err(no_route("route disabled"));
        }

        // 1. Price the swap before touching reserves.
        let amount_out = self.quote(asset_in, asset_out, amount_in).await?;

        // 2. Check the output against the caller's bound and the reserve.
        let mut reserves = self.reserves.lock().await;
        if !reserves.contains_key(asset_in) {
            return Err(no_route("no pool for input asset"));
        }
        let available = *reserves
            .get(asset_out)
            .ok_or_else(|| no_route("no pool for output asset"))?;
        if amount_out > available {
            return Err(no_route(&format!(
                "output {amount_out} exceeds reserve {available}"
            )));
        }
        if amount_out < min_amount_out {
            return Err(RouterError::SlippageExceeded {
                asset_in: asset_in.clone(),
                asset_out: asset_out.clone(),
                min_amount_out,
                amount_out,
            });
        }

        // 3. Settle.
        if let Some(reserve) = reserves.get_mut(asset_out) {
            *reserve -= amount_out;
        }
        if let Some(reserve) = reserves.get_mut(asset_in) {
            *reserve = reserve.saturating_add(amount_in);
        }
        Ok(amount_out)
    }
}
