//! # StockFinder Core
//!
//! Company-name to ticker resolution and multi-provider market data
//! aggregation.
//!
//! ## Overview
//!
//! - **Ticker resolution** through a text-completion service, with a raw-input
//!   probe against the primary provider as fallback
//! - **Provider adapters** for Yahoo Finance and Alpha Vantage, normalized
//!   through declarative field-mapping tables
//! - **Aggregation** with per-field first-match-wins and source attribution
//! - **Response assembly** into an immutable, serializable record
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo Finance and Alpha Vantage adapters |
//! | [`aggregator`] | Parallel/sequential fan-out and merge |
//! | [`assembler`] | Response validation and flat rendering |
//! | [`completion`] | Completion service client |
//! | [`config`] | Environment-backed configuration |
//! | [`data_source`] | Adapter trait and request/result types |
//! | [`domain`] | Symbols, quotes, bars, fundamentals, profiles |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pipeline`] | The `lookup` boundary |
//! | [`resolver`] | Ticker resolution |
//! | [`retry`] | Retry policy for outbound calls |
//! | [`source`] | Provider identifiers |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockfinder_core::{ReqwestHttpClient, StockFinder, StockFinderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StockFinderConfig::from_env()?;
//!     let finder = StockFinder::from_config(&config, Arc::new(ReqwestHttpClient::new()))?;
//!
//!     let response = finder.lookup("Apple").await?;
//!     println!("{} {:?}", response.ticker, response.quote.current_price);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! company name
//!      │
//!      ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ TickerResolver  │────▶│ Completion API   │
//! └────────┬────────┘     └──────────────────┘
//!          │ ticker (or raw-input probe)
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Aggregator      │────▶│ Yahoo / Alpha    │
//! │ (fan-out/merge) │     │ Vantage adapters │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ ResultAssembler │
//! └─────────────────┘
//! ```
//!
//! ## Security
//!
//! - API keys are read from the environment only and never logged
//! - Query strings and header values are redacted from request debug output

pub mod adapters;
pub mod aggregator;
pub mod assembler;
pub mod completion;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod source;

// Adapter implementations
pub use adapters::{AlphaVantageAdapter, YahooAdapter};

// Aggregation and assembly
pub use aggregator::{
    AggregationFailure, AggregationOptions, Aggregator, FanOut, MergeMode, MergedData, Sourced,
};
pub use assembler::{AggregatedResponse, ResultAssembler};

// Completion service
pub use completion::{
    ChatMessage, CompletionClient, CompletionError, CompletionRequest, OpenAiCompletionClient,
};

// Configuration
pub use config::{
    AggregationConfig, CompletionConfig, ConfigError, HttpConfig, ProvidersConfig,
    StockFinderConfig,
};

// Data source trait and types
pub use data_source::{
    CapabilitySet, DataSource, FetchRequest, HistoryRequest, ProviderData, ProviderResult,
    Section, SourceError, SourceErrorKind, SymbolProbe,
};

// Domain models
pub use domain::{
    to_billions, CompanyProfile, DailyBar, Datum, FundamentalSnapshot, HistoricalSeries,
    HistoryMode, NormalizedQuote, QuoteField, SeriesOrder, Symbol, TickerCandidate, TradingDate,
    UtcDateTime, MAX_SYMBOL_LEN, UNAVAILABLE_MARKER,
};

// Envelope types
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Pipeline
pub use pipeline::{LookupError, StockFinder};

// Resolution
pub use resolver::{
    CompletionFailure, ProbeFailure, ResolutionError, ResolutionMethod, ResolutionMode,
    ResolverConfig, TickerResolution, TickerResolver,
};

// Retry logic
pub use retry::{execute_with_retry, Backoff, RetryConfig};

// Source identifiers
pub use source::ProviderId;
