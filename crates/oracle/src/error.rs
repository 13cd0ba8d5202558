use core_types::Asset;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("No price feed is configured for asset {0}")]
    FeedNotConfigured(Asset),

    #[error("The price feed for asset {0} has not reported a value yet")]
    NoFeedValue(Asset),

    #[error("Invalid price for asset {0}: {1}")]
    InvalidPrice(Asset, String),
}
