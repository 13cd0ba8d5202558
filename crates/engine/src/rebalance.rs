//! Moving a fund's holdings back toward its target weights.
//!
//! A rebalance first sells every overweight asset into the base asset, then
//! spends the proceeds on the underweight assets in proportion to how far
//! below target each one is. Legs are independent: one failing swap is logged
//! and reported, and the others still run.

use crate::error::FundError;
use crate::fund::Fund;
use crate::holdings::Holdings;
use crate::proportions::{ProportionTable, TOTAL_WEIGHT};
use crate::valuation::PriceBook;
use chrono::Utc;
use core_types::{AccountId, Asset, amount_for_value, bps_of, mul_div};
use events::FundEvent;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LegDirection {
    /// Overweight asset sold into the base asset.
    Decrease,
    /// Base asset spent on an underweight asset.
    Increase,
}

/// A swap the rebalance executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebalanceLeg {
    pub asset: Asset,
    pub direction: LegDirection,
    pub amount_in: u128,
    pub amount_out: u128,
}

/// A swap the rebalance attempted and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegFailure {
    pub asset: Asset,
    pub direction: LegDirection,
    pub amount_in: u128,
    pub reason: String,
}

/// Current and target weight of one asset, in percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightDrift {
    pub asset: Asset,
    pub current_pct: Decimal,
    pub target_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebalanceReport {
    pub nav_before: u128,
    /// NAV after the legs, valued at the prices the rebalance ran with.
    pub nav_after_estimate: u128,
    /// `false` when some weight drifted beyond the tolerance and legs ran.
    pub within_tolerance: bool,
    pub legs: Vec<RebalanceLeg>,
    pub failures: Vec<LegFailure>,
    pub weights_before: Vec<WeightDrift>,
    pub weights_after: Vec<WeightDrift>,
}

impl RebalanceReport {
    fn untouched(nav: u128, weights: Vec<WeightDrift>) -> Self {
        Self {
            nav_before: nav,
            nav_after_estimate: nav,
            within_tolerance: true,
            legs: Vec::new(),
            failures: Vec::new(),
            weights_before: weights.clone(),
            weights_after: weights,
        }
    }
}

/// One asset's position relative to its target, in value units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Position {
    pub asset: Asset,
    pub holding: u128,
    pub value: u128,
    pub target_value: u128,
    pub current_bps: u128,
    pub target_bps: u128,
}

impl Position {
    fn drift_bps(&self) -> u128 {
        self.current_bps.abs_diff(self.target_bps)
    }
}

/// The ordered work a rebalance will attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RebalancePlan {
    /// Overweight positions, largest excess first.
    pub decreases: Vec<Position>,
    /// Underweight positions, largest deficit first.
    pub increases: Vec<Position>,
}

/// Values every asset that is held or named in the table against `nav`.
pub(crate) fn positions(
    holdings: &Holdings,
    table: &ProportionTable,
    book: &PriceBook,
    nav: u128,
) -> Result<Vec<Position>, FundError> {
    let assets: BTreeSet<&Asset> = holdings.assets().chain(table.assets()).collect();
    assets
        .into_iter()
        .map(|asset| -> Result<Position, FundError> {
            let holding = holdings.get(asset);
            let weight = u128::from(table.weight_of(asset));
            let value = book.value_of(asset, holding)?;
            Ok(Position {
                asset: asset.clone(),
                holding,
                value,
                target_value: mul_div(nav, weight, u128::from(TOTAL_WEIGHT))?,
                current_bps: bps_of(value, nav)?,
                target_bps: weight * 100,
            })
        })
        .collect()
}

/// Decides which positions to trade.
///
/// Nothing trades unless at least one asset drifted further than
/// `tolerance_bps`. Once triggered, every asset off its target value
/// participates so the whole basket converges together.
pub(crate) fn plan(positions: &[Position], tolerance_bps: u32) -> RebalancePlan {
    let triggered = positions
        .iter()
        .any(|p| p.drift_bps() > u128::from(tolerance_bps));
    if !triggered {
        return RebalancePlan::default();
    }

    let mut decreases: Vec<Position> = positions
        .iter()
        .filter(|p| p.value > p.target_value)
        .cloned()
        .collect();
    let mut increases: Vec<Position> = positions
        .iter()
        .filter(|p| p.value < p.target_value)
        .cloned()
        .collect();
    // Stable sorts: ties keep asset order.
    decreases.sort_by(|a, b| (b.value - b.target_value).cmp(&(a.value - a.target_value)));
    increases.sort_by(|a, b| (b.target_value - b.value).cmp(&(a.target_value - a.value)));
    RebalancePlan {
        decreases,
        increases,
    }
}

/// Expresses weights in percent for reports.
fn drift(positions: &[Position]) -> Vec<WeightDrift> {
    let pct = |bps: u128| Decimal::new(i64::try_from(bps).unwrap_or(i64::MAX), 2);
    positions
        .iter()
        .map(|p| WeightDrift {
            asset: p.asset.clone(),
            current_pct: pct(p.current_bps),
            target_pct: pct(p.target_bps),
        })
        .collect()
}

impl Fund {
    /// Moves holdings toward the target weights. Creator or manager only.
    ///
    /// Every leg is applied to the holdings as soon as it completes, with the
    /// base asset as the buffer between the sell and the buy side. A failed
    /// leg is skipped and listed in `RebalanceReport::failures`; it is not
    /// retried within the call.
    pub async fn rebalance(&self, caller: &AccountId) -> Result<RebalanceReport, FundError> {
        let mut state = self.state.lock().await;
        state.ensure_authorized(caller, "rebalance")?;
        let base = state.base_asset.clone();

        let mut to_price: BTreeSet<&Asset> = state.holdings.assets().collect();
        to_price.extend(state.proportions.assets());
        to_price.insert(&base);
        let book = self.price_book(to_price).await?;

        let nav_before = book.nav(&state.holdings)?;
        if nav_before == 0 {
            tracing::debug!(fund = %self.identity.id, "Nothing to rebalance in an empty fund");
            return Ok(RebalanceReport::untouched(0, Vec::new()));
        }

        let before = positions(&state.holdings, &state.proportions, &book, nav_before)?;
        let plan = plan(&before, self.settings.rebalance_tolerance_bps);
        if plan.decreases.is_empty() && plan.increases.is_empty() {
            tracing::debug!(fund = %self.identity.id, nav_before, "Weights within tolerance");
            return Ok(RebalanceReport::untouched(nav_before, drift(&before)));
        }
        tracing::info!(
            fund = %self.identity.id, %caller, nav_before,
            decreases = plan.decreases.len(), increases = plan.increases.len(),
            "Rebalancing"
        );

        let mut legs = Vec::new();
        let mut failures = Vec::new();
        let price_base = book.price(&base)?;

        // 1. Sell down overweight assets. The budget is base units freed up.
        let mut budget: u128 = 0;
        for position in &plan.decreases {
            let excess = position.value - position.target_value;
            if position.asset == base {
                let freed = amount_for_value(excess, price_base)?.min(position.holding);
                budget = budget.saturating_add(freed);
                continue;
            }
            let amount_in = if position.target_value == 0 {
                position.holding
            } else {
                mul_div(position.holding, excess, position.value)?
            };
            if amount_in == 0 {
                continue;
            }
            let outcome = self
                .rebalance_leg(&book, &position.asset, &base, amount_in)
                .await;
            match outcome {
                Ok(amount_out) => {
                    state.holdings.debit(&position.asset, amount_in)?;
                    state.holdings.credit(&base, amount_out)?;
                    budget = budget.saturating_add(amount_out);
                    legs.push(RebalanceLeg {
                        asset: position.asset.clone(),
                        direction: LegDirection::Decrease,
                        amount_in,
                        amount_out,
                    });
                }
                Err(e) => {
                    tracing::warn!(fund = %self.identity.id, asset = %position.asset, amount_in, error = %e, "Rebalance sell leg failed");
                    failures.push(LegFailure {
                        asset: position.asset.clone(),
                        direction: LegDirection::Decrease,
                        amount_in,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // 2. Spend the budget on underweight assets, pro rata to the deficit.
        let total_deficit: u128 = plan
            .increases
            .iter()
            .map(|p| p.target_value - p.value)
            .sum();
        let mut allocations = Vec::with_capacity(plan.increases.len());
        for position in &plan.increases {
            let deficit = position.target_value - position.value;
            allocations.push(mul_div(budget, deficit, total_deficit)?);
        }
        let allocated: u128 = allocations.iter().sum();
        if let Some(first) = allocations.first_mut() {
            *first += budget - allocated;
        }

        for (position, allocation) in plan.increases.iter().zip(allocations) {
            if position.asset == base {
                // Already held as the base asset.
                continue;
            }
            let cap = amount_for_value(position.target_value - position.value, price_base)?;
            let amount_in = allocation.min(cap).min(state.holdings.get(&base));
            if amount_in == 0 {
                continue;
            }
            let outcome = self
                .rebalance_leg(&book, &base, &position.asset, amount_in)
                .await;
            match outcome {
                Ok(amount_out) => {
                    state.holdings.debit(&base, amount_in)?;
                    state.holdings.credit(&position.asset, amount_out)?;
                    legs.push(RebalanceLeg {
                        asset: position.asset.clone(),
                        direction: LegDirection::Increase,
                        amount_in,
                        amount_out,
                    });
                }
                Err(e) => {
                    tracing::warn!(fund = %self.identity.id, asset = %position.asset, amount_in, error = %e, "Rebalance buy leg failed");
                    failures.push(LegFailure {
                        asset: position.asset.clone(),
                        direction: LegDirection::Increase,
                        amount_in,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let nav_after_estimate = book.nav(&state.holdings)?;
        let after = positions(
            &state.holdings,
            &state.proportions,
            &book,
            nav_after_estimate.max(1),
        )?;
        drop(state);

        tracing::info!(
            fund = %self.identity.id, nav_before, nav_after_estimate,
            legs = legs.len(), failed = failures.len(),
            "Rebalance finished"
        );
        self.emit(FundEvent::Rebalanced {
            fund: self.identity.id,
            by: caller.clone(),
            legs_executed: legs.len(),
            legs_failed: failures.len(),
            timestamp: Utc::now(),
        });

        Ok(RebalanceReport {
            nav_before,
            nav_after_estimate,
            within_tolerance: false,
            legs,
            failures,
            weights_before: drift(&before),
            weights_after: drift(&after),
        })
    }

    async fn rebalance_leg(
        &self,
        book: &PriceBook,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: u128,
    ) -> Result<u128, FundError> {
        let min_out = self.min_amount_out(book, asset_in, asset_out, amount_in)?;
        let amount_out = self
            .router
            .swap_exact_in(asset_in, asset_out, amount_in, min_out)
            .await?;
        tracing::debug!(%asset_in, %asset_out, amount_in, amount_out, min_out, "Rebalance leg executed");
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(asset: &str, value: u128, weight: u128, nav: u128) -> Position {
        Position {
            asset: Asset::token(asset),
            holding: value,
            value,
            target_value: nav * weight / 100,
            current_bps: value * 10_000 / nav,
            target_bps: weight * 100,
        }
    }

    #[test]
    fn within_tolerance_plans_nothing() {
        let positions = vec![position("A", 502, 50, 1_000), position("B", 498, 50, 1_000)];
        assert_eq!(plan(&positions, 50), RebalancePlan::default());
    }

    #[test]
    fn orders_decreases_and_increases_by_size() {
        let positions = vec![
            position("A", 500, 40, 1_000),
            position("B", 500, 30, 1_000),
            position("C", 0, 20, 1_000),
            position("D", 0, 10, 1_000),
        ];
        let plan = plan(&positions, 50);
        let names = |v: &[Position]| v.iter().map(|p| p.asset.to_string()).collect::<Vec<_>>();
        assert_eq!(names(&plan.decreases), vec!["B", "A"]);
        assert_eq!(names(&plan.increases), vec!["C", "D"]);
    }

    #[test]
    fn small_drifts_join_once_triggered() {
        // A is 10 bps over target, which alone would not trigger.
        let positions = vec![
            position("A", 501, 50, 1_000),
            position("B", 399, 50, 1_000),
            position("C", 100, 0, 1_000),
        ];
        let plan = plan(&positions, 50);
        let names = |v: &[Position]| v.iter().map(|p| p.asset.to_string()).collect::<Vec<_>>();
        assert_eq!(names(&plan.decreases), vec!["C", "A"]);
        assert_eq!(names(&plan.increases), vec!["B"]);
    }

    #[test]
    fn drift_reports_percentages() {
        let weights = drift(&[position("A", 250, 40, 1_000)]);
        assert_eq!(weights[0].current_pct, Decimal::new(25, 0));
        assert_eq!(weights[0].target_pct, Decimal::new(40, 0));
    }
}
