use core_types::{AccountId, Asset, AssetAmount, CoreError};
use oracle::OracleError;
use router::RouterError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FundError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Insufficient share balance. Requested: {requested}, Available: {available}")]
    InsufficientBalance { requested: u128, available: u128 },

    #[error("Invalid proportions: {0}")]
    InvalidProportions(String),

    #[error("Account {0} is not authorized to {1}")]
    Unauthorized(AccountId, String),

    #[error("Price unavailable for {asset}: {reason}")]
    PriceUnavailable { asset: Asset, reason: String },

    #[error("Slippage exceeded swapping {asset_in} -> {asset_out}: received {amount_out}, minimum {min_amount_out}")]
    SlippageExceeded {
        asset_in: Asset,
        asset_out: Asset,
        min_amount_out: u128,
        amount_out: u128,
    },

    #[error("Insufficient liquidity swapping {asset_in} -> {asset_out}: {reason}")]
    InsufficientLiquidity {
        asset_in: Asset,
        asset_out: Asset,
        reason: String,
    },

    #[error("No price feed is configured for {0}")]
    FeedNotConfigured(Asset),

    #[error("The fund has outstanding shares but zero net asset value")]
    ZeroNetAssetValue,

    #[error("Fund holds {available} of {asset}, cannot release {requested}")]
    InsufficientHoldings {
        asset: Asset,
        requested: u128,
        available: u128,
    },

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] CoreError),

    #[error("Swap venue error: {0}")]
    Swap(String),

    #[error("Operation rolled back: {cause}")]
    RolledBack {
        #[source]
        cause: Box<FundError>,
        /// What the caller gets back. Empty for sells: the fund keeps its assets.
        refund: Vec<AssetAmount>,
    },
}

impl FundError {
    /// The underlying failure, looking through `RolledBack`.
    pub fn root_cause(&self) -> &FundError {
        match self {
            FundError::RolledBack { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

impl From<OracleError> for FundError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::FeedNotConfigured(asset) => FundError::FeedNotConfigured(asset),
            OracleError::NoFeedValue(asset) => FundError::PriceUnavailable {
                asset,
                reason: "feed has not reported a value".to_string(),
            },
            OracleError::InvalidPrice(asset, reason) => {
                FundError::PriceUnavailable { asset, reason }
            }
        }
    }
}

impl From<RouterError> for FundError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::SlippageExceeded {
                asset_in,
                asset_out,
                min_amount_out,
                amount_out,
            } => FundError::SlippageExceeded {
                asset_in,
                asset_out,
                min_amount_out,
                amount_out,
            },
            RouterError::InsufficientLiquidity {
                asset_in,
                asset_out,
                reason,
            } => FundError::InsufficientLiquidity {
                asset_in,
                asset_out,
                reason,
            },
            RouterError::Oracle(e) => e.into(),
            RouterError::Math(e) => FundError::Arithmetic(e),
            other => FundError::Swap(other.to_string()),
        }
    }
}
