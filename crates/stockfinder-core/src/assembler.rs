//! Packages merged provider output into the immutable response record.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::aggregator::{MergedData, Sourced};
use crate::resolver::TickerResolution;
use crate::{
    CompanyProfile, Datum, EnvelopeError, FundamentalSnapshot, HistoricalSeries, NormalizedQuote,
    ProviderId, QuoteField, Symbol, TradingDate, UtcDateTime, ValidationError,
    UNAVAILABLE_MARKER,
};

/// Final lookup output. Every available quote field has exactly one entry in
/// `field_sources`; unavailable fields have none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub ticker: Symbol,
    pub quote: NormalizedQuote,
    pub field_sources: BTreeMap<QuoteField, ProviderId>,
    pub sources: Vec<ProviderId>,
    pub errors: Vec<EnvelopeError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Sourced<HistoricalSeries>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamentals: Option<Sourced<FundamentalSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Sourced<CompanyProfile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_expirations: Option<Sourced<Vec<TradingDate>>>,
    /// Absent when the caller supplied the ticker directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<TickerResolution>,
    pub generated_at: UtcDateTime,
}

impl AggregatedResponse {
    /// Flat `key -> value` rendering. Unavailable values render as `"N/A"`.
    pub fn to_flat_map(&self) -> BTreeMap<String, String> {
        let mut flat = BTreeMap::new();
        flat.insert(String::from("ticker"), self.ticker.to_string());
        flat.insert(
            String::from("generated_at"),
            self.generated_at.format_rfc3339(),
        );
        flat.insert(String::from("sources"), join(&self.sources));

        if let Some(resolution) = &self.resolution {
            flat.insert(
                String::from("resolution.method"),
                resolution.method.to_string(),
            );
            for (index, candidate) in resolution.candidates.iter().enumerate() {
                flat.insert(
                    format!("resolution.candidates.{index}"),
                    format!("{} ({})", candidate.name, candidate.symbol),
                );
            }
        }

        for field in QuoteField::ALL {
            let key = format!("quote.{field}");
            let value = match field {
                QuoteField::CurrentPrice => text(&self.quote.current_price),
                QuoteField::DayHigh => text(&self.quote.day_high),
                QuoteField::DayLow => text(&self.quote.day_low),
                QuoteField::PreviousClose => text(&self.quote.previous_close),
                QuoteField::FiftyTwoWeekHigh => text(&self.quote.fifty_two_week_high),
                QuoteField::FiftyTwoWeekLow => text(&self.quote.fifty_two_week_low),
                QuoteField::MarketCap => text(&self.quote.market_cap),
                QuoteField::Volume => text(&self.quote.volume),
            };
            if let Some(source) = self.field_sources.get(&field) {
                flat.insert(format!("{key}.source"), source.to_string());
            }
            flat.insert(key, value);
        }

        if let Some(fundamentals) = &self.fundamentals {
            let snapshot = &fundamentals.value;
            flat.insert(
                String::from("fundamentals.source"),
                fundamentals.source.to_string(),
            );
            flat.insert(String::from("fundamentals.revenue"), text(&snapshot.revenue));
            flat.insert(
                String::from("fundamentals.net_income"),
                text(&snapshot.net_income),
            );
            flat.insert(String::from("fundamentals.eps"), text(&snapshot.eps));
            flat.insert(
                String::from("fundamentals.market_cap"),
                text(&snapshot.market_cap),
            );
            flat.insert(String::from("fundamentals.pe_ratio"), text(&snapshot.pe_ratio));
        }

        if let Some(profile) = &self.profile {
            flat.insert(String::from("profile.source"), profile.source.to_string());
            flat.insert(String::from("profile.name"), text(&profile.value.name));
            flat.insert(String::from("profile.sector"), text(&profile.value.sector));
            flat.insert(String::from("profile.industry"), text(&profile.value.industry));
            flat.insert(
                String::from("profile.description"),
                text(&profile.value.description),
            );
        }

        if let Some(history) = &self.history {
            flat.insert(String::from("history.source"), history.source.to_string());
            flat.insert(
                String::from("history.order"),
                history.value.order.as_str().to_owned(),
            );
            for (index, bar) in history.value.bars.iter().enumerate() {
                let prefix = format!("history.{index}");
                flat.insert(format!("{prefix}.date"), bar.date.to_string());
                flat.insert(format!("{prefix}.open"), bar.open.to_string());
                flat.insert(format!("{prefix}.high"), bar.high.to_string());
                flat.insert(format!("{prefix}.low"), bar.low.to_string());
                flat.insert(format!("{prefix}.close"), bar.close.to_string());
                flat.insert(
                    format!("{prefix}.volume"),
                    bar.volume
                        .map(|volume| volume.to_string())
                        .unwrap_or_else(|| String::from(UNAVAILABLE_MARKER)),
                );
                if let Some(dividends) = bar.dividends {
                    flat.insert(format!("{prefix}.dividends"), dividends.to_string());
                }
                if let Some(ratio) = bar.stock_splits {
                    flat.insert(format!("{prefix}.stock_splits"), ratio.to_string());
                }
            }
        }

        if let Some(options) = &self.option_expirations {
            flat.insert(String::from("options.source"), options.source.to_string());
            flat.insert(String::from("options.expirations"), join(&options.value));
        }

        for (index, error) in self.errors.iter().enumerate() {
            let prefix = format!("errors.{index}");
            flat.insert(format!("{prefix}.code"), error.code.clone());
            flat.insert(format!("{prefix}.message"), error.message.clone());
            if let Some(source) = error.source {
                flat.insert(format!("{prefix}.source"), source.to_string());
            }
        }

        flat
    }
}

/// Validates section shapes and stamps the generation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn assemble(
        &self,
        merged: MergedData,
        resolution: Option<TickerResolution>,
    ) -> Result<AggregatedResponse, ValidationError> {
        self.assemble_at(merged, resolution, UtcDateTime::now())
    }

    pub fn assemble_at(
        &self,
        merged: MergedData,
        resolution: Option<TickerResolution>,
        generated_at: UtcDateTime,
    ) -> Result<AggregatedResponse, ValidationError> {
        if let Some(history) = &merged.history {
            validate_history(&history.value, &merged.symbol)?;
        }
        if let Some(options) = &merged.option_expirations {
            validate_expirations(&options.value)?;
        }
        for error in &merged.errors {
            error.validate()?;
        }

        Ok(AggregatedResponse {
            ticker: merged.symbol,
            quote: merged.quote,
            field_sources: merged.field_sources,
            sources: merged.sources,
            errors: merged.errors,
            history: merged.history,
            fundamentals: merged.fundamentals,
            profile: merged.profile,
            option_expirations: merged.option_expirations,
            resolution,
            generated_at,
        })
    }
}

fn validate_history(series: &HistoricalSeries, ticker: &Symbol) -> Result<(), ValidationError> {
    if series.is_empty() {
        return Err(ValidationError::EmptySeries {
            symbol: series.symbol.to_string(),
        });
    }
    if &series.symbol != ticker {
        return Err(ValidationError::SeriesSymbolMismatch {
            series: series.symbol.to_string(),
            ticker: ticker.to_string(),
        });
    }
    series.validate_order()
}

fn validate_expirations(dates: &[TradingDate]) -> Result<(), ValidationError> {
    if dates.is_empty() || dates.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(ValidationError::InvalidOptionExpirations);
    }
    Ok(())
}

fn text<T: Display>(value: &Datum<T>) -> String {
    match value {
        Datum::Available(value) => value.to_string(),
        Datum::Unavailable => String::from(UNAVAILABLE_MARKER),
    }
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
