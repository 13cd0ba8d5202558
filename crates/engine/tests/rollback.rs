mod common;

use chrono::{Duration, Utc};
use common::*;
use core_types::{Asset, AssetAmount};
use engine::{FundError, LegDirection};
use events::FundEvent;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;

async fn flaky_fund(failing_calls: &[usize]) -> (engine::Fund, Arc<FlakyRouter>) {
    let assets = ["A", "B"];
    let feeds = dollar_feeds(&assets).await;
    let router = Arc::new(FlakyRouter::new(
        venue(Arc::clone(&feeds), &assets, Decimal::ZERO),
        failing_calls,
    ));
    let fund = fund(feeds, router.clone(), &assets, &[50, 50]);
    (fund, router)
}

#[tokio::test]
async fn failed_buy_leg_unwinds_and_refunds_base() {
    let (fund, _, router) = simple_fund(&["A", "B"], &[50, 50]).await;
    router.disable_route(Asset::Native, token("B")).await;

    let err = fund.buy(&alice(), 100).await.unwrap_err();
    match &err {
        FundError::RolledBack { cause, refund } => {
            assert!(matches!(**cause, FundError::InsufficientLiquidity { .. }));
            assert_eq!(refund, &vec![AssetAmount::new(Asset::Native, 100)]);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert!(matches!(err.root_cause(), FundError::InsufficientLiquidity { .. }));
    assert!(fund.holdings().await.is_empty());
    assert_eq!(fund.total_supply().await, 0);
    assert_eq!(fund.balance_of(&alice()).await, 0);
}

#[tokio::test]
async fn failure_before_any_swap_is_reported_plainly() {
    let (fund, _, router) = simple_fund(&["A", "B"], &[50, 50]).await;
    router.disable_route(Asset::Native, token("A")).await;

    let err = fund.buy(&alice(), 100).await.unwrap_err();
    assert!(matches!(err, FundError::InsufficientLiquidity { .. }));
    assert_eq!(fund.total_supply().await, 0);
}

#[tokio::test]
async fn failed_buy_unwind_refunds_in_kind() {
    // Call 0 buys A, call 1 (B) fails, call 2 (unwinding A) fails.
    let (fund, router) = flaky_fund(&[1, 2]).await;

    let err = fund.buy(&alice(), 100).await.unwrap_err();
    let FundError::RolledBack { refund, .. } = err else {
        panic!("expected rollback");
    };
    assert_eq!(
        refund,
        vec![
            AssetAmount::new(Asset::Native, 50),
            AssetAmount::new(token("A"), 50)
        ]
    );
    assert_eq!(router.calls(), 3);
    assert!(fund.holdings().await.is_empty());
    assert_eq!(fund.total_supply().await, 0);
}

#[tokio::test]
async fn failed_sell_keeps_shares_and_holdings() {
    // Calls 0 and 1 fill the fund; call 3 (B -> native) fails.
    let (fund, _) = flaky_fund(&[3]).await;
    fund.buy(&alice(), 1_000).await.unwrap();
    let before = fund.holdings().await;

    let err = fund.sell(&alice(), 500).await.unwrap_err();
    assert_eq!(
        err,
        FundError::RolledBack {
            cause: Box::new(FundError::InsufficientLiquidity {
                asset_in: token("B"),
                asset_out: Asset::Native,
                reason: "scripted failure on call 3".to_string(),
            }),
            refund: vec![],
        }
    );
    assert_eq!(fund.balance_of(&alice()).await, 1_000);
    assert_eq!(fund.total_supply().await, 1_000);
    // A cost-free venue recovers exactly what was sold.
    assert_eq!(fund.holdings().await, before);
}

#[tokio::test]
async fn failed_sell_unwind_keeps_base_proceeds_in_fund() {
    // Call 3 (B -> native) fails and call 4 (native -> A unwind) fails too.
    let (fund, _) = flaky_fund(&[3, 4]).await;
    fund.buy(&alice(), 1_000).await.unwrap();

    let err = fund.sell(&alice(), 500).await.unwrap_err();
    assert!(matches!(err, FundError::RolledBack { .. }));
    assert_eq!(fund.balance_of(&alice()).await, 1_000);
    assert_eq!(fund.token_balance(&token("A")).await, 250);
    assert_eq!(fund.token_balance(&token("B")).await, 500);
    assert_eq!(fund.token_balance(&Asset::Native).await, 250);
    assert_eq!(fund.net_asset_value().await.unwrap(), 1_000);
}

#[tokio::test]
async fn sell_rejects_more_than_balance() {
    let (fund, _, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    fund.buy(&alice(), 100).await.unwrap();
    assert_eq!(
        fund.sell(&alice(), 101).await.unwrap_err(),
        FundError::InsufficientBalance {
            requested: 101,
            available: 100
        }
    );
    assert_eq!(fund.sell(&bob(), 0).await.unwrap_err(), FundError::ZeroAmount);
}

#[tokio::test]
async fn partial_sell_withdraws_pro_rata() {
    let (fund, _, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    fund.buy(&alice(), 1_000).await.unwrap();
    fund.buy(&bob(), 1_000).await.unwrap();

    let receipt = fund.sell(&bob(), 500).await.unwrap();
    assert_eq!(receipt.proceeds, 500);
    assert_eq!(
        receipt.withdrawn,
        vec![
            AssetAmount::new(token("A"), 250),
            AssetAmount::new(token("B"), 250)
        ]
    );
    assert_eq!(fund.total_supply().await, 1_500);
    assert_eq!(fund.token_balance(&token("A")).await, 750);
}

#[tokio::test]
async fn stale_price_blocks_buy_without_side_effects() {
    let (fund, feeds, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    feeds.track_feed(token("B"), 8).await;
    feeds
        .submit(&token("B"), DOLLAR, Utc::now() - Duration::hours(2))
        .await
        .unwrap();

    let err = fund.buy(&alice(), 100).await.unwrap_err();
    assert!(matches!(err, FundError::PriceUnavailable { .. }));
    assert_eq!(fund.total_supply().await, 0);
}

#[tokio::test]
async fn failed_rebalance_leg_is_reported_and_others_complete() {
    let assets = ["A", "B", "C", "D"];
    let (fund, _, router) = simple_fund(&assets, &[50, 50, 0, 0]).await;
    fund.buy(&alice(), 1_000).await.unwrap();
    router.disable_route(Asset::Native, token("C")).await;

    let tokens: Vec<Asset> = assets.iter().map(|name| token(name)).collect();
    fund.set_proportions(&creator(), &tokens, &[40, 30, 20, 10])
        .await
        .unwrap();
    let report = fund.rebalance(&creator()).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].asset, token("C"));
    assert_eq!(report.failures[0].direction, LegDirection::Increase);
    assert_eq!(report.legs.len(), 3);
    // C's budget stays in the fund as the base asset.
    assert_eq!(fund.token_balance(&Asset::Native).await, 200);
    assert_eq!(fund.token_balance(&token("D")).await, 100);
    assert_eq!(report.nav_after_estimate, report.nav_before);
}

#[tokio::test]
async fn rebalance_requires_creator_or_manager() {
    let (fund, _, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    assert!(matches!(
        fund.rebalance(&alice()).await,
        Err(FundError::Unauthorized(..))
    ));

    fund.add_manager(&creator(), alice()).await.unwrap();
    let report = fund.rebalance(&alice()).await.unwrap();
    assert!(report.within_tolerance);
    assert!(report.legs.is_empty());

    fund.remove_manager(&creator(), &alice()).await.unwrap();
    assert!(!fund.is_authorized(&alice()).await);
}

#[tokio::test]
async fn committed_and_rolled_back_operations_are_published() {
    let (fund, _, router) = simple_fund(&["A", "B"], &[50, 50]).await;
    let (tx, mut rx) = broadcast::channel(16);
    let fund = fund.with_events(tx);

    fund.buy(&alice(), 100).await.unwrap();
    match rx.recv().await.unwrap() {
        FundEvent::Bought { holder, shares, .. } => {
            assert_eq!(holder, alice());
            assert_eq!(shares, 100);
        }
        other => panic!("unexpected event {other:?}"),
    }

    router.disable_route(Asset::Native, token("B")).await;
    let _ = fund.buy(&bob(), 100).await;
    assert!(matches!(
        rx.recv().await.unwrap(),
        FundEvent::BuyRolledBack { .. }
    ));
}

#[tokio::test]
async fn venue_cost_above_slippage_bound_fails_buy() {
    let assets = ["A", "B"];
    let feeds = dollar_feeds(&assets).await;
    // 2% fee against the default 100 bps bound.
    let router = Arc::new(venue(Arc::clone(&feeds), &assets, Decimal::new(2, 2)));
    let fund = fund(feeds, router, &assets, &[50, 50]);

    let err = fund.buy(&alice(), 1_000).await.unwrap_err();
    assert_eq!(
        err.root_cause(),
        &FundError::SlippageExceeded {
            asset_in: Asset::Native,
            asset_out: token("A"),
            min_amount_out: 495,
            amount_out: 490,
        }
    );
    assert_eq!(fund.total_supply().await, 0);
    assert!(fund.holdings().await.is_empty());
}

#[tokio::test]
async fn venue_cost_within_slippage_bound_is_accepted() {
    let assets = ["A", "B"];
    let feeds = dollar_feeds(&assets).await;
    let router = Arc::new(venue(Arc::clone(&feeds), &assets, Decimal::new(5, 3)));
    let fund = fund(feeds, router, &assets, &[50, 50]);

    fund.buy(&alice(), 1_000).await.unwrap();
    assert_eq!(fund.token_balance(&token("A")).await, 497);
    assert_eq!(fund.token_balance(&token("B")).await, 497);
    assert!(fund.total_supply().await > 0);
}

#[tokio::test]
async fn slippage_on_later_buy_leg_rolls_back() {
    let assets = ["A", "B"];
    let feeds = dollar_feeds(&assets).await;
    // The venue prices B at $1.05 while the fund's oracle says $1.
    let venue_feeds = dollar_feeds(&assets).await;
    venue_feeds.set_price(token("B"), DOLLAR * 105 / 100).await;
    let router = Arc::new(venue(venue_feeds, &assets, Decimal::ZERO));
    let fund = fund(feeds, router, &assets, &[50, 50]);

    let err = fund.buy(&alice(), 1_000).await.unwrap_err();
    match &err {
        FundError::RolledBack { cause, refund } => {
            assert_eq!(
                **cause,
                FundError::SlippageExceeded {
                    asset_in: Asset::Native,
                    asset_out: token("B"),
                    min_amount_out: 495,
                    amount_out: 476,
                }
            );
            assert_eq!(refund, &vec![AssetAmount::new(Asset::Native, 1_000)]);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(fund.total_supply().await, 0);
    assert!(fund.holdings().await.is_empty());
}

#[tokio::test]
async fn stale_price_blocks_sell_without_side_effects() {
    let (fund, feeds, _) = simple_fund(&["A", "B"], &[50, 50]).await;
    fund.buy(&alice(), 1_000).await.unwrap();
    let before = fund.holdings().await;

    feeds.track_feed(token("A"), 8).await;
    feeds
        .submit(&token("A"), DOLLAR, Utc::now() - Duration::hours(2))
        .await
        .unwrap();

    let err = fund.sell(&alice(), 500).await.unwrap_err();
    assert!(matches!(err, FundError::PriceUnavailable { ref asset, .. } if asset == &token("A")));
    assert_eq!(fund.balance_of(&alice()).await, 1_000);
    assert_eq!(fund.holdings().await, before);
}

#[tokio::test]
async fn zero_price_blocks_rebalance_without_side_effects() {
    let assets = ["A", "B", "C"];
    let (fund, feeds, _) = simple_fund(&assets, &[50, 50, 0]).await;
    fund.buy(&alice(), 1_000).await.unwrap();
    let tokens: Vec<Asset> = assets.iter().map(|name| token(name)).collect();
    fund.set_proportions(&creator(), &tokens, &[40, 40, 20])
        .await
        .unwrap();
    let before = fund.holdings().await;

    feeds.set_price(token("C"), 0).await;
    let err = fund.rebalance(&creator()).await.unwrap_err();
    assert!(matches!(err, FundError::PriceUnavailable { ref asset, .. } if asset == &token("C")));
    assert_eq!(fund.holdings().await, before);
}

#[tokio::test]
async fn buy_unwind_runs_under_the_fund_lock() {
    let assets = ["A", "B"];
    let feeds = dollar_feeds(&assets).await;
    // Call 0 buys A, call 1 (B) fails, call 2 unwinds A.
    let flaky = FlakyRouter::new(venue(Arc::clone(&feeds), &assets, Decimal::ZERO), &[1]);
    let router = Arc::new(LockWatchingRouter::new(flaky));
    let fund = fund(feeds, router.clone(), &assets, &[50, 50]);
    router.watch(fund.clone());

    let err = fund.buy(&alice(), 100).await.unwrap_err();
    assert!(matches!(err, FundError::RolledBack { .. }));
    assert_eq!(router.readable_during_swaps(), vec![false, false, false]);
    assert_eq!(fund.total_supply().await, 0);
}
