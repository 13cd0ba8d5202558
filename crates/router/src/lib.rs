//! # Basket Router
//!
//! The swap-execution seam. Funds never assume a swap succeeds: every
//! conversion goes through the `SwapRouter` trait and returns either the
//! amount actually received or a `RouterError`.
//!
//! ## Public API
//!
//! - `SwapRouter`: The core trait for all swap venues.
//! - `SimulatedRouter`: An oracle-priced, reserve-backed venue for simulations and tests.
//! - `RouterError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod simulated;

// Re-export the key components to provide a clean, public-facing API.
pub use error::RouterError;
pub use simulated::SimulatedRouter;

use async_trait::async_trait;
use core_types::Asset;

/// A generic trait for a swap venue.
///
/// This trait allows the fund engine to be agnostic about whether it is
/// swapping against a simulation or a real venue.
#[async_trait]
pub trait SwapRouter: Send + Sync {
    /// Swaps exactly `amount_in` of `asset_in` into `asset_out`.
    ///
    /// Returns the amount of `asset_out` received, which is authoritative.
    /// Fails with `RouterError::SlippageExceeded` if it would be below
    /// `min_amount_out`, and with `RouterError::InsufficientLiquidity` if no
    /// route exists or it cannot cover the output.
    async fn swap_exact_in(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, RouterError>;
}
