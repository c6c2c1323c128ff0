//! # Domain Models
//!
//! Canonical market-data types shared by adapters, the aggregator and the
//! response assembler.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated uppercase ticker |
//! | [`Datum`] | Provider value or the `"N/A"` marker |
//! | [`NormalizedQuote`] | Point-in-time quote fields |
//! | [`FundamentalSnapshot`] | Revenue, net income, EPS, market cap, P/E |
//! | [`CompanyProfile`] | Name, sector, industry, description |
//! | [`HistoricalSeries`] | Daily bars over a brief or extended window |
//! | [`TradingDate`] / [`UtcDateTime`] | Calendar date and UTC timestamp |
//!
//! Constructors validate their invariants; missing provider data is carried
//! as [`Datum::Unavailable`] and never defaulted to zero.

mod datum;
mod models;
mod symbol;
mod timestamp;

pub(crate) use datum::is_placeholder;
pub use datum::{Datum, UNAVAILABLE_MARKER};
pub use models::{
    to_billions, CompanyProfile, DailyBar, FundamentalSnapshot, HistoricalSeries, HistoryMode,
    NormalizedQuote, QuoteField, SeriesOrder, TickerCandidate,
};
pub use symbol::{Symbol, MAX_SYMBOL_LEN};
pub use timestamp::{TradingDate, UtcDateTime};
