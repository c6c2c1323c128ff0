use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Datum, Symbol, TradingDate, ValidationError};

/// Canonical quote fields merged across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteField {
    CurrentPrice,
    DayHigh,
    DayLow,
    PreviousClose,
    FiftyTwoWeekHigh,
    FiftyTwoWeekLow,
    MarketCap,
    Volume,
}

impl QuoteField {
    pub const ALL: [Self; 8] = [
        Self::CurrentPrice,
        Self::DayHigh,
        Self::DayLow,
        Self::PreviousClose,
        Self::FiftyTwoWeekHigh,
        Self::FiftyTwoWeekLow,
        Self::MarketCap,
        Self::Volume,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CurrentPrice => "current_price",
            Self::DayHigh => "day_high",
            Self::DayLow => "day_low",
            Self::PreviousClose => "previous_close",
            Self::FiftyTwoWeekHigh => "fifty_two_week_high",
            Self::FiftyTwoWeekLow => "fifty_two_week_low",
            Self::MarketCap => "market_cap",
            Self::Volume => "volume",
        }
    }
}

impl Display for QuoteField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time quote in the shape shared by every provider adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuote {
    pub current_price: Datum<f64>,
    pub day_high: Datum<f64>,
    pub day_low: Datum<f64>,
    pub previous_close: Datum<f64>,
    pub fifty_two_week_high: Datum<f64>,
    pub fifty_two_week_low: Datum<f64>,
    pub market_cap: Datum<f64>,
    pub volume: Datum<u64>,
}

impl NormalizedQuote {
    pub fn is_available(&self, field: QuoteField) -> bool {
        match field {
            QuoteField::CurrentPrice => self.current_price.is_available(),
            QuoteField::DayHigh => self.day_high.is_available(),
            QuoteField::DayLow => self.day_low.is_available(),
            QuoteField::PreviousClose => self.previous_close.is_available(),
            QuoteField::FiftyTwoWeekHigh => self.fifty_two_week_high.is_available(),
            QuoteField::FiftyTwoWeekLow => self.fifty_two_week_low.is_available(),
            QuoteField::MarketCap => self.market_cap.is_available(),
            QuoteField::Volume => self.volume.is_available(),
        }
    }

    /// Stores a provider number into `field`; negative or non-finite input is unavailable.
    pub fn set_number(&mut self, field: QuoteField, value: f64) {
        let datum = if value.is_finite() && value >= 0.0 {
            Datum::Available(value)
        } else {
            Datum::Unavailable
        };

        match field {
            QuoteField::CurrentPrice => self.current_price = datum,
            QuoteField::DayHigh => self.day_high = datum,
            QuoteField::DayLow => self.day_low = datum,
            QuoteField::PreviousClose => self.previous_close = datum,
            QuoteField::FiftyTwoWeekHigh => self.fifty_two_week_high = datum,
            QuoteField::FiftyTwoWeekLow => self.fifty_two_week_low = datum,
            QuoteField::MarketCap => self.market_cap = datum,
            QuoteField::Volume => self.volume = datum.map(|volume| volume.round() as u64),
        }
    }

    /// Copies one field from another quote, regardless of availability.
    pub fn copy_field(&mut self, field: QuoteField, from: &Self) {
        match field {
            QuoteField::CurrentPrice => self.current_price = from.current_price,
            QuoteField::DayHigh => self.day_high = from.day_high,
            QuoteField::DayLow => self.day_low = from.day_low,
            QuoteField::PreviousClose => self.previous_close = from.previous_close,
            QuoteField::FiftyTwoWeekHigh => self.fifty_two_week_high = from.fifty_two_week_high,
            QuoteField::FiftyTwoWeekLow => self.fifty_two_week_low = from.fifty_two_week_low,
            QuoteField::MarketCap => self.market_cap = from.market_cap,
            QuoteField::Volume => self.volume = from.volume,
        }
    }

    /// Fills every unavailable field of `self` from `other`.
    pub fn fill_from(&mut self, other: &Self) {
        for field in QuoteField::ALL {
            if !self.is_available(field) && other.is_available(field) {
                self.copy_field(field, other);
            }
        }
    }

    pub fn available_fields(&self) -> Vec<QuoteField> {
        QuoteField::ALL
            .into_iter()
            .filter(|field| self.is_available(*field))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        QuoteField::ALL.iter().all(|field| !self.is_available(*field))
    }
}

/// Accounting-derived metrics. Money figures are raw currency units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub revenue: Datum<f64>,
    pub net_income: Datum<f64>,
    pub eps: Datum<f64>,
    pub market_cap: Datum<f64>,
    pub pe_ratio: Datum<f64>,
}

impl FundamentalSnapshot {
    pub fn is_empty(&self) -> bool {
        !(self.revenue.is_available()
            || self.net_income.is_available()
            || self.eps.is_available()
            || self.market_cap.is_available()
            || self.pe_ratio.is_available())
    }
}

/// Descriptive company data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: Datum<String>,
    pub sector: Datum<String>,
    pub industry: Datum<String>,
    pub description: Datum<String>,
}

impl CompanyProfile {
    pub fn is_empty(&self) -> bool {
        !(self.name.is_available()
            || self.sector.is_available()
            || self.industry.is_available()
            || self.description.is_available())
    }
}

/// Lookback window for the daily price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Last 5 trading days.
    Brief,
    /// Last 15 trading days.
    Extended,
}

impl HistoryMode {
    pub const fn lookback_days(self) -> usize {
        match self {
            Self::Brief => 5,
            Self::Extended => 15,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Extended => "extended",
        }
    }
}

impl FromStr for HistoryMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "brief" | "5d" => Ok(Self::Brief),
            "extended" | "15d" => Ok(Self::Extended),
            other => Err(ValidationError::InvalidHistoryMode {
                value: other.to_owned(),
            }),
        }
    }
}

/// Chronological direction of a [`HistoricalSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesOrder {
    #[default]
    Ascending,
    Descending,
}

impl SeriesOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl FromStr for SeriesOrder {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(ValidationError::InvalidSeriesOrder {
                value: other.to_owned(),
            }),
        }
    }
}

/// One daily OHLCV bar with optional corporate-action columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: TradingDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividends: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_splits: Option<f64>,
}

impl DailyBar {
    pub fn new(
        date: TradingDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            dividends: None,
            stock_splits: None,
        })
    }

    pub fn with_dividends(mut self, amount: f64) -> Self {
        self.dividends = Some(amount);
        self
    }

    pub fn with_stock_split(mut self, ratio: f64) -> Self {
        self.stock_splits = Some(ratio);
        self
    }
}

/// Daily bars for one ticker over a fixed lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub symbol: Symbol,
    pub mode: HistoryMode,
    pub order: SeriesOrder,
    pub bars: Vec<DailyBar>,
}

impl HistoricalSeries {
    /// Sorts `bars`, keeps the most recent `mode.lookback_days()` sessions and
    /// lays them out in `order`. Duplicate dates keep the last bar seen.
    pub fn from_bars(
        symbol: Symbol,
        mode: HistoryMode,
        order: SeriesOrder,
        mut bars: Vec<DailyBar>,
    ) -> Self {
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                std::mem::swap(later, earlier);
                true
            } else {
                false
            }
        });

        let keep = mode.lookback_days();
        if bars.len() > keep {
            bars.drain(..bars.len() - keep);
        }
        if order == SeriesOrder::Descending {
            bars.reverse();
        }

        Self {
            symbol,
            mode,
            order,
            bars,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&DailyBar> {
        match self.order {
            SeriesOrder::Ascending => self.bars.last(),
            SeriesOrder::Descending => self.bars.first(),
        }
    }

    /// Checks the bars are strictly ordered in the declared direction.
    pub fn validate_order(&self) -> Result<(), ValidationError> {
        let ordered = self.bars.windows(2).all(|pair| match self.order {
            SeriesOrder::Ascending => pair[0].date < pair[1].date,
            SeriesOrder::Descending => pair[0].date > pair[1].date,
        });

        if ordered {
            Ok(())
        } else {
            Err(ValidationError::SeriesOutOfOrder {
                order: self.order.as_str(),
            })
        }
    }
}

/// One "Company Name (TICKER)" line from the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerCandidate {
    pub name: String,
    pub symbol: Symbol,
}

/// Converts a raw currency amount to billions rounded to two decimals.
pub fn to_billions(value: f64) -> f64 {
    (value / 1_000_000_000.0 * 100.0).round() / 100.0
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
