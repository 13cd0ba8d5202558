//! # Basket Events
//!
//! This crate defines the event structures funds and the factory publish after
//! every committed (or rolled back) operation.
//!
//! As a Layer 0 crate, it depends only on `core-types`.

// Declare the modules that make up this crate.
pub mod error;
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use messages::{EventSender, FundEvent, publish};
