//! # Basket Engine
//!
//! Fund accounting and rebalancing. A `Fund` owns one `FundState` (its share
//! ledger, target proportions and custodied holdings) and serializes every
//! operation on it behind a single lock. Prices come from a `PriceOracle` and
//! every conversion goes through a `SwapRouter`.
//!
//! ## Public API
//!
//! - `Fund`: buy, sell, rebalance, proportion and manager administration, queries.
//! - `FundState` / `FundSnapshot`: the per-fund aggregate and its serializable view.
//! - `ProportionTable`: validated target weights and the deposit split.
//! - `FundLedger`: share balances and share issuance.
//! - `FundError`: every way a fund operation can fail.

pub mod error;
pub mod fund;
pub mod holdings;
pub mod ledger;
pub mod proportions;
pub mod rebalance;
pub mod state;
pub mod valuation;

pub use error::FundError;
pub use fund::{BuyReceipt, Fund, SellReceipt};
pub use holdings::Holdings;
pub use ledger::FundLedger;
pub use proportions::{ProportionEntry, ProportionTable};
pub use rebalance::{LegDirection, LegFailure, RebalanceLeg, RebalanceReport, WeightDrift};
pub use state::{FundIdentity, FundSnapshot, FundState};
pub use valuation::PriceBook;
