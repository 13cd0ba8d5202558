//! Fixed-point helpers for value and share arithmetic.
//!
//! Amounts and prices are `u128`. Their products are taken in 256 bits so that
//! `a * b / c` is exact up to a single floor at the end, no matter how large the
//! operands are.

use crate::error::CoreError;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer for intermediate products.
    pub struct U256(4);
}

/// Number of decimals in every `PriceQuote::price`.
pub const PRICE_DECIMALS: u32 = 8;

/// `10^PRICE_DECIMALS`, i.e. a price of exactly $1.
pub const PRICE_SCALE: u128 = 100_000_000;

/// Basis points in a whole (100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Computes `a * b / c`, rounding down.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, CoreError> {
    if c == 0 {
        return Err(CoreError::DivisionByZero);
    }
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    if result > U256::from(u128::MAX) {
        return Err(CoreError::Overflow);
    }
    Ok(result.low_u128())
}

/// USD value of `amount` raw units at `price`, in the canonical value unit
/// (one unit of value per raw unit of an asset priced at $1).
pub fn value_of(amount: u128, price: u128) -> Result<u128, CoreError> {
    mul_div(amount, price, PRICE_SCALE)
}

/// Number of raw units worth `value` at `price`. The inverse of `value_of`.
pub fn amount_for_value(value: u128, price: u128) -> Result<u128, CoreError> {
    mul_div(value, PRICE_SCALE, price)
}

/// `part / whole` expressed in basis points.
pub fn bps_of(part: u128, whole: u128) -> Result<u128, CoreError> {
    mul_div(part, BPS_DENOMINATOR, whole)
}
