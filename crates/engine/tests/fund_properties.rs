mod common;

use common::*;
use core_types::Asset;
use engine::FundError;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn sequential_buys_issue_shares_pro_rata_to_deposits() {
    let (fund, _, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    let deposits = [(alice(), 100u128), (bob(), 300), (alice(), 55), (creator(), 1_001)];
    for (holder, amount) in &deposits {
        fund.buy(holder, *amount).await.unwrap();
    }

    let total_deposits: u128 = deposits.iter().map(|(_, amount)| amount).sum();
    let supply = fund.total_supply().await;
    for holder in [alice(), bob(), creator()] {
        let deposited: u128 = deposits
            .iter()
            .filter(|(h, _)| h == &holder)
            .map(|(_, amount)| amount)
            .sum();
        let shares = fund.balance_of(&holder).await;
        // shares / supply == deposited / total_deposits, cross-multiplied,
        // allowing one unit of rounding per deposit.
        let lhs = shares * total_deposits;
        let rhs = deposited * supply;
        assert!(
            lhs.abs_diff(rhs) <= supply * deposits.len() as u128,
            "{holder}: {shares}/{supply} vs {deposited}/{total_deposits}"
        );
    }
}

#[tokio::test]
async fn selling_the_whole_supply_empties_the_fund() {
    let assets = ["A", "B"];
    let feeds = dollar_feeds(&assets).await;
    let router = Arc::new(venue(Arc::clone(&feeds), &assets, dec!(0.003)));
    let fund = fund(feeds, router, &assets, &[50, 50]);

    fund.buy(&alice(), 1_000).await.unwrap();
    let nav = fund.net_asset_value().await.unwrap();
    let shares = fund.balance_of(&alice()).await;
    assert_eq!(shares, fund.total_supply().await);

    let receipt = fund.sell(&alice(), shares).await.unwrap();
    assert!(fund.holdings().await.is_empty());
    assert_eq!(fund.total_supply().await, 0);
    assert_eq!(fund.net_asset_value().await.unwrap(), 0);

    // Proceeds are the NAV less one swap fee per leg, give or take rounding.
    assert!(receipt.proceeds <= nav);
    let after_fees = nav * 9_970 / 10_000;
    assert!(
        receipt.proceeds + 2 >= after_fees,
        "proceeds {} vs nav {nav}",
        receipt.proceeds
    );
}

#[tokio::test]
async fn invalid_proportions_leave_the_table_unchanged() {
    let (fund, _, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    let before = fund.proportions().await;

    for weights in [[50u8, 49], [60, 60], [100, 1]] {
        let err = fund
            .set_proportions(&creator(), &[token("A"), token("B")], &weights)
            .await
            .unwrap_err();
        assert!(matches!(err, FundError::InvalidProportions(_)), "{weights:?}");
    }
    assert_eq!(fund.proportions().await, before);
}

#[tokio::test]
async fn rebalance_converges_to_new_targets() {
    let assets = ["A", "B", "C", "D"];
    let (fund, _, _) = simple_fund(&assets, &[50, 50, 0, 0]).await;
    fund.buy(&alice(), 1_000).await.unwrap();
    let before = fund.holdings().await;

    let targets = [40u8, 30, 20, 10];
    let tokens: Vec<Asset> = assets.iter().map(|name| token(name)).collect();
    fund.set_proportions(&creator(), &tokens, &targets).await.unwrap();
    let report = fund.rebalance(&creator()).await.unwrap();
    assert!(report.failures.is_empty());
    assert!(!report.within_tolerance);

    let nav = fund.net_asset_value().await.unwrap();
    let after = fund.holdings().await;
    let tolerance_bps = u128::from(fund.settings().rebalance_tolerance_bps);
    for (asset, target) in tokens.iter().zip(targets) {
        let target_bps = u128::from(target) * 100;
        let bps_before = before.get(asset) * 10_000 / 1_000;
        let bps_after = after.get(asset) * 10_000 / nav;
        assert!(
            bps_after.abs_diff(target_bps) <= tolerance_bps,
            "{asset}: {bps_after} bps vs target {target_bps}"
        );
        assert!(bps_after.abs_diff(target_bps) <= bps_before.abs_diff(target_bps));
    }
    assert_eq!(after.get(&Asset::Native), 0);
}

#[tokio::test]
async fn zero_deposit_changes_nothing() {
    let (fund, _, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    fund.buy(&alice(), 100).await.unwrap();
    let before = fund.snapshot().await;

    assert_eq!(fund.buy(&bob(), 0).await.unwrap_err(), FundError::ZeroAmount);
    assert_eq!(fund.snapshot().await, before);
}

#[tokio::test]
async fn first_and_second_deposit_into_even_basket() {
    let (fund, _, _) = simple_fund(&["A", "B"], &[50, 50]).await;

    let receipt = fund.buy(&alice(), 100).await.unwrap();
    assert_eq!(receipt.shares, 100);
    assert_eq!(receipt.nav_before, 0);
    assert_eq!(fund.token_balance(&token("A")).await, 50);
    assert_eq!(fund.token_balance(&token("B")).await, 50);
    assert_eq!(fund.balance_of(&alice()).await, 100);

    let receipt = fund.buy(&bob(), 100).await.unwrap();
    assert_eq!(receipt.nav_before, 100);
    assert_eq!(fund.total_supply().await, 200);
    assert_eq!(fund.balance_of(&alice()).await, 100);
    assert_eq!(fund.balance_of(&bob()).await, 100);
}
