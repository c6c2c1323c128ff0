//! Provider adapter contract and the values that cross it.
//!
//! An adapter answers one [`FetchRequest`] with one [`ProviderResult`]: either
//! [`ProviderData`] (possibly with non-fatal partial errors) or a
//! [`SourceError`]. Failures never escape as panics or transport errors.
//!
//! | Section | Yahoo | Alpha Vantage |
//! |---------|-------|---------------|
//! | quote | chart meta | `GLOBAL_QUOTE` + `OVERVIEW` |
//! | history | chart bars + events | - |
//! | fundamentals | `quoteSummary` | `OVERVIEW` |
//! | profile | `quoteSummary` | `OVERVIEW` |
//! | options | options v7 | - |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{
    CompanyProfile, EnvelopeError, FundamentalSnapshot, HistoricalSeries, HistoryMode, HttpError,
    NormalizedQuote, ProviderId, SeriesOrder, Symbol, TradingDate,
};

/// Independently fetched part of a provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Quote,
    History,
    Fundamentals,
    Profile,
    Options,
}

impl Section {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::History => "history",
            Self::Fundamentals => "fundamentals",
            Self::Profile => "profile",
            Self::Options => "options",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sections an adapter can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub quote: bool,
    pub history: bool,
    pub fundamentals: bool,
    pub profile: bool,
    pub options: bool,
}

impl CapabilitySet {
    pub const fn new(
        quote: bool,
        history: bool,
        fundamentals: bool,
        profile: bool,
        options: bool,
    ) -> Self {
        Self {
            quote,
            history,
            fundamentals,
            profile,
            options,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true, true, true)
    }

    pub const fn supports(self, section: Section) -> bool {
        match section {
            Section::Quote => self.quote,
            Section::History => self.history,
            Section::Fundamentals => self.fundamentals,
            Section::Profile => self.profile,
            Section::Options => self.options,
        }
    }

    pub fn supported_sections(self) -> Vec<&'static str> {
        [
            Section::Quote,
            Section::History,
            Section::Fundamentals,
            Section::Profile,
            Section::Options,
        ]
        .into_iter()
        .filter(|section| self.supports(*section))
        .map(Section::as_str)
        .collect()
    }
}

/// Window and direction for the daily price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRequest {
    pub mode: HistoryMode,
    pub order: SeriesOrder,
}

/// One logical query batch for a single ticker. The quote is always requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: Symbol,
    pub history: Option<HistoryRequest>,
    pub fundamentals: bool,
    pub profile: bool,
    pub options: bool,
}

impl FetchRequest {
    /// Quote, brief ascending history, fundamentals, profile and options.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            history: Some(HistoryRequest {
                mode: HistoryMode::Brief,
                order: SeriesOrder::Ascending,
            }),
            fundamentals: true,
            profile: true,
            options: true,
        }
    }

    /// Quote only.
    pub fn quote_only(symbol: Symbol) -> Self {
        Self {
            symbol,
            history: None,
            fundamentals: false,
            profile: false,
            options: false,
        }
    }

    pub fn with_history(mut self, history: Option<HistoryRequest>) -> Self {
        self.history = history;
        self
    }

    pub fn wants(&self, section: Section) -> bool {
        match section {
            Section::Quote => true,
            Section::History => self.history.is_some(),
            Section::Fundamentals => self.fundamentals,
            Section::Profile => self.profile,
            Section::Options => self.options,
        }
    }
}

/// Normalized output of one adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderData {
    pub quote: NormalizedQuote,
    pub history: Option<HistoricalSeries>,
    pub fundamentals: Option<FundamentalSnapshot>,
    pub profile: Option<CompanyProfile>,
    pub option_expirations: Option<Vec<TradingDate>>,
    /// Supplementary sections that failed after the core fetch succeeded.
    pub partial_errors: Vec<SourceError>,
}

impl ProviderData {
    pub fn has_history(&self) -> bool {
        self.history.as_ref().is_some_and(|series| !series.is_empty())
    }

    pub fn has_fundamentals(&self) -> bool {
        self.fundamentals
            .as_ref()
            .is_some_and(|snapshot| !snapshot.is_empty())
    }

    pub fn has_profile(&self) -> bool {
        self.profile.as_ref().is_some_and(|profile| !profile.is_empty())
    }

    pub fn has_options(&self) -> bool {
        self.option_expirations
            .as_ref()
            .is_some_and(|dates| !dates.is_empty())
    }

    /// Whether anything in this payload can reach the response.
    pub fn is_usable(&self) -> bool {
        !self.quote.is_empty()
            || self.has_history()
            || self.has_fundamentals()
            || self.has_profile()
            || self.has_options()
    }
}

/// Per-provider outcome; "no data" and "provider errored" stay distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    pub provider: ProviderId,
    pub outcome: Result<ProviderData, SourceError>,
}

impl ProviderResult {
    pub fn new(provider: ProviderId, outcome: Result<ProviderData, SourceError>) -> Self {
        Self { provider, outcome }
    }

    pub fn data(&self) -> Option<&ProviderData> {
        self.outcome.as_ref().ok()
    }

    pub fn is_usable(&self) -> bool {
        self.data().is_some_and(ProviderData::is_usable)
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    Unauthorized,
    InvalidRequest,
    NotFound,
    Malformed,
    UnsupportedSection,
    Internal,
}

/// Structured adapter error with a stable `source.*` code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message, true)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message, true)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unauthorized, message, false)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message, false)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message, false)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Malformed, message, false)
    }

    pub fn unsupported_section(section: Section) -> Self {
        Self::new(
            SourceErrorKind::UnsupportedSection,
            format!("section '{section}' is not supported by this source"),
            false,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message, false)
    }

    /// Maps a transport failure; timeouts and connect errors stay retryable.
    pub fn from_http(context: &str, error: &HttpError) -> Self {
        Self::new(
            SourceErrorKind::Unavailable,
            format!("{context}: {}", error.message()),
            error.retryable(),
        )
    }

    /// Maps a non-2xx upstream status.
    pub fn from_status(context: &str, status: u16) -> Self {
        let message = format!("{context} returned HTTP {status}");
        match status {
            401 | 403 => Self::unauthorized(message),
            404 => Self::not_found(message),
            429 => Self::rate_limited(message),
            500..=599 => Self::unavailable(message),
            _ => Self::invalid_request(message),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Unauthorized => "source.unauthorized",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::UnsupportedSection => "source.unsupported_section",
            SourceErrorKind::Internal => "source.internal",
        }
    }

    /// Envelope form of this error attributed to `provider`.
    pub fn to_envelope_error(&self, provider: ProviderId) -> EnvelopeError {
        let message = if self.message.trim().is_empty() {
            String::from("provider returned an error without a message")
        } else {
            self.message.clone()
        };

        EnvelopeError {
            code: self.code().to_owned(),
            message,
            retryable: Some(self.retryable),
            source: Some(provider),
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Boxed future returned by [`DataSource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = ProviderResult> + Send + 'a>>;

/// Provider adapter contract.
///
/// Implementations are stateless across calls and must be `Send + Sync` so the
/// aggregator can query them concurrently.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    /// Fetches every requested section the adapter supports.
    ///
    /// Unsupported sections are skipped silently; a failed core fetch yields
    /// `Err` in [`ProviderResult::outcome`], a failed supplementary section
    /// lands in [`ProviderData::partial_errors`].
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a>;
}

/// Live check that a raw symbol has price data, used by the resolver fallback.
pub trait SymbolProbe: Send + Sync {
    fn probe<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<bool, SourceError>> + Send + 'a>>;
}
