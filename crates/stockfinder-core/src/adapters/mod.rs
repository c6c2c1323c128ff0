//! Provider adapters.
//!
//! Each adapter maps one provider's payloads onto the canonical domain types
//! through the declarative tables in [`mapping`].

pub mod alphavantage;
pub mod mapping;
pub mod yahoo;

pub use alphavantage::AlphaVantageAdapter;
pub use yahoo::YahooAdapter;
