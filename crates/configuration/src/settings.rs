use crate::error::ConfigError;
use core_types::{AccountId, Asset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSettings,
    pub simulation: Simulation,
    pub factory: FactorySettings,
    #[serde(default)]
    pub oracle: OracleSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Parameters every fund engine instance runs with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Quotes older than this are treated as unavailable.
    pub max_price_age_secs: u64,
    /// Rebalance leaves an asset alone when its weight is within this many
    /// basis points of target.
    pub rebalance_tolerance_bps: u32,
    /// `min_amount_out` passed to the router is the oracle-expected output
    /// reduced by this many basis points.
    pub max_slippage_bps: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_price_age_secs: 3_600,
            rebalance_tolerance_bps: 50,
            max_slippage_bps: 100,
        }
    }
}

/// Contains parameters for the simulated swap venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// The fee the venue keeps on every swap.
    /// 0.003 corresponds to 0.3%.
    pub swap_fee_pct: Decimal,

    /// The assumed price impact of every swap, applied on top of the fee.
    /// 0.001 means output is 0.1% worse than the oracle rate.
    pub slippage_pct: Decimal,

    /// Initial reserves available to pay out each asset.
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// One seeded reserve in the simulated venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub asset: Asset,
    pub reserve: u64,
}

/// Parameters for fund creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorySettings {
    /// Fee charged in the fee token for every fund created.
    pub creation_fee: u64,
    /// Account that receives creation fees.
    pub treasury: AccountId,
    /// The currency deposits are made in and redemptions are paid out in.
    #[serde(default = "default_base_asset")]
    pub base_asset: Asset,
}

fn default_base_asset() -> Asset {
    Asset::Native
}

/// Feeds to register with the price oracle at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleSettings {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub asset: Asset,
    /// Decimals the feed reports `price` with.
    pub decimals: u8,
    /// Initial USD price in feed decimals.
    pub price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_file_prefix() -> String {
    "basket.log".to_string()
}

impl Config {
    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bps_max = 10_000;
        if self.engine.rebalance_tolerance_bps > bps_max {
            return Err(ConfigError::ValidationError(
                "engine.rebalance_tolerance_bps must be at most 10000".to_string(),
            ));
        }
        if self.engine.max_slippage_bps > bps_max {
            return Err(ConfigError::ValidationError(
                "engine.max_slippage_bps must be at most 10000".to_string(),
            ));
        }
        for (name, pct) in [
            ("simulation.swap_fee_pct", self.simulation.swap_fee_pct),
            ("simulation.slippage_pct", self.simulation.slippage_pct),
        ] {
            if pct.is_sign_negative() || pct >= Decimal::ONE {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be in [0, 1), got {pct}"
                )));
            }
        }
        for feed in &self.oracle.feeds {
            if feed.decimals > 30 {
                return Err(ConfigError::ValidationError(format!(
                    "oracle feed for {} has unsupported decimals {}",
                    feed.asset, feed.decimals
                )));
            }
        }
        Ok(())
    }
}
