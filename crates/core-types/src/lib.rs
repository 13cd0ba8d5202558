//! # Basket Core Types
//!
//! The foundational vocabulary shared by every crate in the workspace: asset and
//! account identifiers, price quotes, and the fixed-point arithmetic used for
//! value and share calculations.
//!
//! As a Layer 0 crate it depends on no other workspace crate.

pub mod enums;
pub mod error;
pub mod math;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::Asset;
pub use error::CoreError;
pub use math::{
    BPS_DENOMINATOR, PRICE_DECIMALS, PRICE_SCALE, amount_for_value, bps_of, mul_div, value_of,
};
pub use structs::{AccountId, AssetAmount, FundId, PriceQuote};
