use crate::SimulateArgs;
use crate::ui;
use anyhow::{Context, Result, bail};
use configuration::Config;
use core_types::{AccountId, Asset};
use engine::{BuyReceipt, Fund, FundError, FundSnapshot, RebalanceReport, SellReceipt};
use events::FundEvent;
use factory::{FeeToken, FundFactory};
use oracle::FeedRegistry;
use router::SimulatedRouter;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A deposit and how it ended.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DepositOutcome {
    Committed { deposit: u128, receipt: BuyReceipt },
    Failed { deposit: u128, error: String },
}

/// Everything a simulation run produced.
#[derive(Debug, Serialize)]
struct SimulationOutcome {
    deposits: Vec<DepositOutcome>,
    rebalance: Option<RebalanceReport>,
    redemption: Option<SellReceipt>,
    net_asset_value: u128,
    fund: FundSnapshot,
    events: Vec<FundEvent>,
}

pub async fn run(config: &Config, args: SimulateArgs) -> Result<()> {
    if args.assets.len() != args.weights.len() {
        bail!(
            "--assets lists {} assets but --weights lists {} weights",
            args.assets.len(),
            args.weights.len()
        );
    }

    // 1. Wire up the oracle, the venue and the factory from config.
    let feeds = Arc::new(
        FeedRegistry::from_settings(&config.oracle).context("Invalid oracle feed configuration")?,
    );
    let router = Arc::new(
        SimulatedRouter::new(config.simulation.clone(), feeds.clone())
            .context("Invalid simulation parameters")?,
    );
    let fee_token = Arc::new(FeeToken::new());
    fee_token
        .mint(&args.creator, u128::from(config.factory.creation_fee))
        .await;

    let (tx, mut rx) = broadcast::channel(1_024);
    let factory = FundFactory::new(
        config.factory.clone(),
        config.engine.clone(),
        feeds,
        router,
        fee_token,
    )
    .with_events(tx);

    // 2. Create the fund.
    let fund = factory
        .create_fund(&args.name, &args.ticker, &args.assets, &args.weights, &args.creator)
        .await
        .context("Failed to create fund")?;
    tracing::info!(fund = %fund.id(), ticker = fund.fund_ticker(), "Simulation fund ready");

    // 3. Deposits. A rolled back deposit is reported, not fatal.
    let depositor = args.depositor.clone().unwrap_or_else(|| args.creator.clone());
    let mut deposits = Vec::with_capacity(args.deposits.len());
    for deposit in args.deposits.iter().copied().map(u128::from) {
        match fund.buy(&depositor, deposit).await {
            Ok(receipt) => deposits.push(DepositOutcome::Committed { deposit, receipt }),
            Err(e) => {
                tracing::warn!(deposit, error = %e, "Deposit failed");
                deposits.push(DepositOutcome::Failed {
                    deposit,
                    error: e.to_string(),
                });
            }
        }
    }

    // 4. Optional re-weight and rebalance.
    let rebalance = if args.rebalance.is_empty() {
        None
    } else {
        let (assets, weights): (Vec<Asset>, Vec<u8>) = args.rebalance.iter().cloned().unzip();
        fund.set_proportions(&args.creator, &assets, &weights)
            .await
            .context("Failed to set new proportions")?;
        Some(
            fund.rebalance(&args.creator)
                .await
                .context("Rebalance failed")?,
        )
    };

    // 5. Optional redemption.
    let redemption = match args.redeem_percent {
        Some(percent) => redeem(&fund, &depositor, percent).await?,
        None => None,
    };

    let net_asset_value = fund.net_asset_value().await.context("Failed to value the fund")?;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let outcome = SimulationOutcome {
        deposits,
        rebalance,
        redemption,
        net_asset_value,
        fund: fund.snapshot().await,
        events,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_tables(&outcome);
    }
    Ok(())
}

async fn redeem(fund: &Fund, holder: &AccountId, percent: u8) -> Result<Option<SellReceipt>> {
    let balance = fund.balance_of(holder).await;
    let shares = balance * u128::from(percent) / 100;
    if shares == 0 {
        tracing::warn!(%holder, balance, percent, "Nothing to redeem");
        return Ok(None);
    }
    match fund.sell(holder, shares).await {
        Ok(receipt) => Ok(Some(receipt)),
        Err(e @ FundError::RolledBack { .. }) => {
            tracing::warn!(%holder, shares, error = %e, "Redemption rolled back");
            Ok(None)
        }
        Err(e) => Err(e).context("Redemption failed"),
    }
}

fn print_tables(outcome: &SimulationOutcome) {
    let fund = &outcome.fund;
    println!(
        "{}",
        ui::title(&format!("{} ({})", fund.identity.name, fund.identity.ticker))
    );
    println!("Fund id:   {}", fund.identity.id);
    println!("Creator:   {}", fund.identity.creator);
    println!("Supply:    {}", fund.total_supply);
    println!("NAV:       {}", outcome.net_asset_value);

    let mut holdings = ui::new_styled_table(&["Asset", "Holding", "Target %"]);
    for entry in &fund.proportions {
        let held = fund
            .holdings
            .iter()
            .find(|h| h.asset == entry.asset)
            .map_or(0, |h| h.amount);
        holdings.add_row(vec![
            ui::amount_cell(&entry.asset),
            ui::amount_cell(held),
            ui::amount_cell(entry.weight),
        ]);
    }
    for held in fund
        .holdings
        .iter()
        .filter(|h| !fund.proportions.iter().any(|e| e.asset == h.asset))
    {
        holdings.add_row(vec![
            ui::amount_cell(&held.asset),
            ui::amount_cell(held.amount),
            ui::amount_cell(0),
        ]);
    }
    println!("{}", ui::title("Holdings"));
    println!("{holdings}");

    if !outcome.deposits.is_empty() {
        let mut table =
            ui::new_styled_table(&["Deposit", "Value", "Shares", "NAV before", "Result"]);
        for deposit in &outcome.deposits {
            match deposit {
                DepositOutcome::Committed { deposit, receipt } => table.add_row(vec![
                    ui::amount_cell(deposit),
                    ui::amount_cell(receipt.deposit_value),
                    ui::amount_cell(receipt.shares),
                    ui::amount_cell(receipt.nav_before),
                    ui::amount_cell("ok"),
                ]),
                DepositOutcome::Failed { deposit, error } => table.add_row(vec![
                    ui::amount_cell(deposit),
                    ui::amount_cell("-"),
                    ui::amount_cell("-"),
                    ui::amount_cell("-"),
                    ui::error_cell(error),
                ]),
            };
        }
        println!("{}", ui::title("Deposits"));
        println!("{table}");
    }

    if let Some(report) = &outcome.rebalance {
        let mut table = ui::new_styled_table(&["Asset", "Direction", "In", "Out"]);
        for leg in &report.legs {
            table.add_row(vec![
                ui::amount_cell(&leg.asset),
                ui::amount_cell(format!("{:?}", leg.direction)),
                ui::amount_cell(leg.amount_in),
                ui::amount_cell(leg.amount_out),
            ]);
        }
        for failure in &report.failures {
            table.add_row(vec![
                ui::amount_cell(&failure.asset),
                ui::amount_cell(format!("{:?}", failure.direction)),
                ui::amount_cell(failure.amount_in),
                ui::error_cell(&failure.reason),
            ]);
        }
        println!("{}", ui::title("Rebalance"));
        println!(
            "NAV before: {}  NAV after (est.): {}",
            report.nav_before, report.nav_after_estimate
        );
        println!("{table}");

        let mut weights = ui::new_styled_table(&["Asset", "Before %", "After %", "Target %"]);
        for after in &report.weights_after {
            let before = report
                .weights_before
                .iter()
                .find(|w| w.asset == after.asset)
                .map_or(Decimal::ZERO, |w| w.current_pct);
            weights.add_row(vec![
                ui::amount_cell(&after.asset),
                ui::amount_cell(before),
                ui::amount_cell(after.current_pct),
                ui::amount_cell(after.target_pct),
            ]);
        }
        println!("{weights}");
    }

    if let Some(receipt) = &outcome.redemption {
        println!("{}", ui::title("Redemption"));
        println!("Redeemed {} shares for {} base", receipt.shares, receipt.proceeds);
    }
    println!("\n{} events published", outcome.events.len());
}
