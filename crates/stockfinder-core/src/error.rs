use thiserror::Error;

/// Validation and contract errors exposed by `stockfinder-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("company name cannot be empty")]
    EmptyCompanyName,

    #[error("ticker cannot be empty")]
    EmptySymbol,
    #[error("ticker length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("ticker must not contain whitespace: '{value}'")]
    SymbolContainsWhitespace { value: String },
    #[error("ticker must start with a letter or digit, got '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of yahoo, alphavantage")]
    InvalidSource { value: String },
    #[error("invalid history mode '{value}', expected one of none, brief, extended")]
    InvalidHistoryMode { value: String },

    #[error("series order must be asc or desc, got '{value}'")]
    InvalidSeriesOrder { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,

    #[error("historical series for {symbol} has no bars")]
    EmptySeries { symbol: String },
    #[error("historical series symbol {series} does not match ticker {ticker}")]
    SeriesSymbolMismatch { series: String, ticker: String },
    #[error("historical series bars are not in {order} order")]
    SeriesOutOfOrder { order: &'static str },
    #[error("option expirations must be non-empty and strictly ascending")]
    InvalidOptionExpirations,

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
