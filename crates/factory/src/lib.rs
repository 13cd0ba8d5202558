//! # Basket Factory
//!
//! Creates fund instances for a creation fee and keeps the registry of every
//! fund it created. Fees are paid in a `FeeToken` and credited to the
//! configured treasury account.

pub mod error;
pub mod fee_token;
pub mod registry;

pub use error::FactoryError;
pub use fee_token::FeeToken;
pub use registry::FundFactory;
