use core_types::{Asset, CoreError};
use oracle::OracleError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Swap {asset_in} -> {asset_out} would return {amount_out}, below the minimum of {min_amount_out}")]
    SlippageExceeded {
        asset_in: Asset,
        asset_out: Asset,
        min_amount_out: u128,
        amount_out: u128,
    },

    #[error("Insufficient liquidity to swap {asset_in} -> {asset_out}: {reason}")]
    InsufficientLiquidity {
        asset_in: Asset,
        asset_out: Asset,
        reason: String,
    },

    #[error("Swap amount must be greater than zero")]
    ZeroAmount,

    #[error("Cannot swap {0} into itself")]
    SameAsset(Asset),

    #[error("Router parameters are invalid: {0}")]
    InvalidParameters(String),

    #[error("Oracle error while pricing swap: {0}")]
    Oracle(#[from] OracleError),

    #[error("Calculation error while pricing swap: {0}")]
    Math(#[from] CoreError),
}
