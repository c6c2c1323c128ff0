//! Declarative provider-key to canonical-field tables.
//!
//! Each adapter owns `const` tables of [`Mapping`] rows. A row lists JSON
//! pointers tried in order; the first usable value wins. Values may be JSON
//! numbers, numeric strings or Yahoo's `{ "raw": .. }` wrappers. Blank,
//! placeholder and non-finite values map to [`Datum::Unavailable`].

use serde_json::Value;

use crate::domain::is_placeholder;
use crate::{CompanyProfile, Datum, FundamentalSnapshot, NormalizedQuote, QuoteField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundamentalField {
    Revenue,
    NetIncome,
    Eps,
    MarketCap,
    PeRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Sector,
    Industry,
    Description,
}

/// One canonical field and the provider locations that may carry it.
#[derive(Debug, Clone, Copy)]
pub struct Mapping<F: 'static> {
    pub field: F,
    pub pointers: &'static [&'static str],
}

impl<F> Mapping<F> {
    pub const fn new(field: F, pointers: &'static [&'static str]) -> Self {
        Self { field, pointers }
    }
}

/// Builds a quote from `payload`; fields missing from the table stay unavailable.
pub fn map_quote(payload: &Value, table: &[Mapping<QuoteField>]) -> NormalizedQuote {
    let mut quote = NormalizedQuote::default();
    for row in table {
        if let Datum::Available(value) = first_number(payload, row.pointers) {
            quote.set_number(row.field, value);
        }
    }
    quote
}

pub fn map_fundamentals(payload: &Value, table: &[Mapping<FundamentalField>]) -> FundamentalSnapshot {
    let mut snapshot = FundamentalSnapshot::default();
    for row in table {
        let value = first_number(payload, row.pointers);
        match row.field {
            FundamentalField::Revenue => snapshot.revenue = value,
            FundamentalField::NetIncome => snapshot.net_income = value,
            FundamentalField::Eps => snapshot.eps = value,
            FundamentalField::MarketCap => snapshot.market_cap = value,
            FundamentalField::PeRatio => snapshot.pe_ratio = value,
        }
    }
    snapshot
}

pub fn map_profile(payload: &Value, table: &[Mapping<ProfileField>]) -> CompanyProfile {
    let mut profile = CompanyProfile::default();
    for row in table {
        let value = first_text(payload, row.pointers);
        match row.field {
            ProfileField::Name => profile.name = value,
            ProfileField::Sector => profile.sector = value,
            ProfileField::Industry => profile.industry = value,
            ProfileField::Description => profile.description = value,
        }
    }
    profile
}

pub fn first_number(payload: &Value, pointers: &[&str]) -> Datum<f64> {
    pointers
        .iter()
        .filter_map(|pointer| payload.pointer(pointer))
        .map(number)
        .find(Datum::is_available)
        .unwrap_or_default()
}

pub fn first_text(payload: &Value, pointers: &[&str]) -> Datum<String> {
    pointers
        .iter()
        .filter_map(|pointer| payload.pointer(pointer))
        .filter_map(Value::as_str)
        .map(Datum::text)
        .find(Datum::is_available)
        .unwrap_or_default()
}

/// Reads one provider value as a finite number.
pub fn number(value: &Value) -> Datum<f64> {
    match value {
        Value::Number(number) => number.as_f64().map_or(Datum::Unavailable, Datum::finite),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || is_placeholder(trimmed) {
                return Datum::Unavailable;
            }
            trimmed
                .parse::<f64>()
                .map_or(Datum::Unavailable, Datum::finite)
        }
        Value::Object(object) => object.get("raw").map_or(Datum::Unavailable, number),
        _ => Datum::Unavailable,
    }
}
