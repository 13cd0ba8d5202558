use engine::FundError;
use oracle::OracleError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("Invalid fund definition: {0}")]
    InvalidFund(String),

    #[error("Insufficient fee balance. Required: {required}, Available: {available}")]
    InsufficientFee { required: u128, available: u128 },

    #[error("Fund error: {0}")]
    Fund(#[from] FundError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}
