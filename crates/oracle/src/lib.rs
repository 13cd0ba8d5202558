//! # Basket Oracle
//!
//! USD valuations for every asset a fund can hold. The `PriceOracle` trait is
//! the seam the fund engine consumes; `FeedRegistry` is an in-memory adapter
//! that keeps one feed per asset and normalizes reported values to
//! `core_types::PRICE_DECIMALS`.

pub mod error;
pub mod feed;

pub use error::OracleError;
pub use feed::FeedRegistry;

use async_trait::async_trait;
use core_types::{Asset, PriceQuote};

/// An interface to access price data.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Returns the latest USD price for one raw unit of `asset`, scaled by
    /// `PRICE_SCALE`, with the time it was observed.
    ///
    /// Fails with `OracleError::FeedNotConfigured` if no feed is registered.
    async fn get_price(&self, asset: &Asset) -> Result<PriceQuote, OracleError>;
}
