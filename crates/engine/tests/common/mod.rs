#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use configuration::{EngineSettings, PoolConfig, Simulation};
use core_types::{AccountId, Asset, FundId, PRICE_SCALE};
use engine::{Fund, FundIdentity, FundState, ProportionTable};
use oracle::FeedRegistry;
use router::{RouterError, SimulatedRouter, SwapRouter};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

pub const DOLLAR: u128 = PRICE_SCALE;
pub const DEEP_POOL: u64 = 1_000_000_000_000;

pub fn creator() -> AccountId {
    AccountId::new("creator")
}

pub fn alice() -> AccountId {
    AccountId::new("alice")
}

pub fn bob() -> AccountId {
    AccountId::new("bob")
}

pub fn token(name: &str) -> Asset {
    Asset::token(name)
}

/// A registry pricing the native asset and every listed token at $1.
pub async fn dollar_feeds(tokens: &[&str]) -> Arc<FeedRegistry> {
    let feeds = Arc::new(FeedRegistry::new());
    feeds.set_price(Asset::Native, DOLLAR).await;
    for name in tokens {
        feeds.set_price(token(name), DOLLAR).await;
    }
    feeds
}

/// A venue with deep pools for the native asset and every listed token.
pub fn venue(feeds: Arc<FeedRegistry>, tokens: &[&str], fee_pct: Decimal) -> SimulatedRouter {
    let mut pools = vec![PoolConfig {
        asset: Asset::Native,
        reserve: DEEP_POOL,
    }];
    pools.extend(tokens.iter().map(|name| PoolConfig {
        asset: token(name),
        reserve: DEEP_POOL,
    }));
    let params = Simulation {
        swap_fee_pct: fee_pct,
        slippage_pct: Decimal::ZERO,
        pools,
    };
    SimulatedRouter::new(params, feeds).unwrap()
}

pub fn fund(
    feeds: Arc<FeedRegistry>,
    router: Arc<dyn SwapRouter>,
    assets: &[&str],
    weights: &[u8],
) -> Fund {
    let assets: Vec<Asset> = assets.iter().map(|name| token(name)).collect();
    let table = ProportionTable::new(&assets, weights).unwrap();
    let identity = FundIdentity {
        id: FundId::new(),
        name: "Test Basket".to_string(),
        ticker: "TEST".to_string(),
        creator: creator(),
        created_at: Utc::now(),
    };
    let state = FundState::new(identity, Asset::Native, table);
    Fund::new(state, feeds, router, EngineSettings::default())
}

/// Fund over `assets` with $1 prices and a cost-free venue.
pub async fn simple_fund(
    assets: &[&str],
    weights: &[u8],
) -> (Fund, Arc<FeedRegistry>, Arc<SimulatedRouter>) {
    let feeds = dollar_feeds(assets).await;
    let router = Arc::new(venue(Arc::clone(&feeds), assets, Decimal::ZERO));
    let fund = fund(Arc::clone(&feeds), router.clone(), assets, weights);
    (fund, feeds, router)
}

/// Wraps a venue and fails the calls whose zero-based index is listed.
pub struct FlakyRouter {
    inner: SimulatedRouter,
    failing_calls: HashSet<usize>,
    calls: AtomicUsize,
}

impl FlakyRouter {
    pub fn new(inner: SimulatedRouter, failing_calls: &[usize]) -> Self {
        Self {
            inner,
            failing_calls: failing_calls.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwapRouter for FlakyRouter {
    async fn swap_exact_in(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, RouterError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.contains(&call) {
            return Err(RouterError::InsufficientLiquidity {
                asset_in: asset_in.clone(),
                asset_out: asset_out.clone(),
                reason: format!("scripted failure on call {call}"),
            });
        }
        self.inner
            .swap_exact_in(asset_in, asset_out, amount_in, min_amount_out)
            .await
    }
}

/// Records, for every swap, whether the watched fund could be read while the
/// swap was in flight.
pub struct LockWatchingRouter {
    inner: FlakyRouter,
    fund: OnceLock<Fund>,
    readable: Mutex<Vec<bool>>,
}

impl LockWatchingRouter {
    pub fn new(inner: FlakyRouter) -> Self {
        Self {
            inner,
            fund: OnceLock::new(),
            readable: Mutex::new(Vec::new()),
        }
    }

    pub fn watch(&self, fund: Fund) {
        let _ = self.fund.set(fund);
    }

    pub fn readable_during_swaps(&self) -> Vec<bool> {
        self.readable.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapRouter for LockWatchingRouter {
    async fn swap_exact_in(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, RouterError> {
        if let Some(fund) = self.fund.get() {
            let read = tokio::time::timeout(Duration::from_millis(20), fund.total_supply()).await;
            self.readable.lock().unwrap().push(read.is_ok());
        }
        self.inner
            .swap_exact_in(asset_in, asset_out, amount_in, min_amount_out)
            .await
    }
}
