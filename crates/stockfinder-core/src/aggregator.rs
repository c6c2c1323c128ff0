//! Multi-provider fan-out and field-level merge.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, ProviderData, ProviderResult, SourceError,
};
use crate::{
    CompanyProfile, EnvelopeError, FundamentalSnapshot, HistoricalSeries, NormalizedQuote,
    ProviderId, QuoteField, Symbol, TradingDate,
};

/// How adapters are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOut {
    #[default]
    Parallel,
    Sequential,
}

impl FanOut {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

impl FromStr for FanOut {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("invalid fan-out '{other}', expected parallel or sequential")),
        }
    }
}

/// How provider payloads are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Each field comes from the first adapter, in priority order, that has it.
    #[default]
    PerField,
    /// The first adapter with any usable data supplies everything.
    FirstUsable,
}

impl MergeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerField => "per_field",
            Self::FirstUsable => "first_usable",
        }
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per_field" | "per-field" => Ok(Self::PerField),
            "first_usable" | "first-usable" => Ok(Self::FirstUsable),
            other => Err(format!(
                "invalid merge mode '{other}', expected per_field or first_usable"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregationOptions {
    pub fan_out: FanOut,
    pub merge: MergeMode,
}

/// A section value and the provider it was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub source: ProviderId,
    pub value: T,
}

/// Merge output handed to the result assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedData {
    pub symbol: Symbol,
    pub quote: NormalizedQuote,
    pub field_sources: BTreeMap<QuoteField, ProviderId>,
    /// Providers that contributed at least one field or section, in priority order.
    pub sources: Vec<ProviderId>,
    /// Providers that were queried, in priority order.
    pub source_chain: Vec<ProviderId>,
    pub errors: Vec<EnvelopeError>,
    pub history: Option<Sourced<HistoricalSeries>>,
    pub fundamentals: Option<Sourced<FundamentalSnapshot>>,
    pub profile: Option<Sourced<CompanyProfile>>,
    pub option_expirations: Option<Sourced<Vec<TradingDate>>>,
}

impl MergedData {
    fn has_anything(&self) -> bool {
        !self.field_sources.is_empty()
            || self.history.is_some()
            || self.fundamentals.is_some()
            || self.profile.is_some()
            || self.option_expirations.is_some()
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregationFailure {
    #[error("no data providers are configured")]
    NoProviders,
    #[error("{provider} failed for {symbol}: {error}")]
    ProviderError {
        symbol: Symbol,
        provider: ProviderId,
        error: SourceError,
        errors: Vec<EnvelopeError>,
    },
    #[error("no provider returned usable data for {symbol}")]
    NoData {
        symbol: Symbol,
        source_chain: Vec<ProviderId>,
        errors: Vec<EnvelopeError>,
    },
}

/// Queries adapters in priority order and merges their normalized output.
#[derive(Clone)]
pub struct Aggregator {
    adapters: Vec<Arc<dyn DataSource>>,
    options: AggregationOptions,
}

impl Aggregator {
    /// `adapters` are in priority order, highest first.
    pub fn new(adapters: Vec<Arc<dyn DataSource>>) -> Self {
        Self {
            adapters,
            options: AggregationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AggregationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> AggregationOptions {
        self.options
    }

    /// Configured providers and their capabilities, in priority order.
    pub fn providers(&self) -> Vec<(ProviderId, CapabilitySet)> {
        self.adapters
            .iter()
            .map(|adapter| (adapter.id(), adapter.capabilities()))
            .collect()
    }

    pub async fn aggregate(&self, request: &FetchRequest) -> Result<MergedData, AggregationFailure> {
        if self.adapters.is_empty() {
            return Err(AggregationFailure::NoProviders);
        }

        let results = self.collect(request).await;
        let merged = merge(request.symbol.clone(), &results, self.options.merge);

        if merged.has_anything() {
            info!(
                symbol = %merged.symbol,
                fields = merged.field_sources.len(),
                sources = ?merged.sources,
                errors = merged.errors.len(),
                "aggregated provider data"
            );
            return Ok(merged);
        }

        match results.as_slice() {
            [ProviderResult {
                provider,
                outcome: Err(error),
            }] => Err(AggregationFailure::ProviderError {
                symbol: merged.symbol,
                provider: *provider,
                error: error.clone(),
                errors: merged.errors,
            }),
            _ => Err(AggregationFailure::NoData {
                symbol: merged.symbol,
                source_chain: merged.source_chain,
                errors: merged.errors,
            }),
        }
    }

    async fn collect(&self, request: &FetchRequest) -> Vec<ProviderResult> {
        match self.options.fan_out {
            FanOut::Parallel => {
                join_all(self.adapters.iter().map(|adapter| adapter.fetch(request))).await
            }
            FanOut::Sequential => {
                let mut results = Vec::with_capacity(self.adapters.len());
                for adapter in &self.adapters {
                    let result = adapter.fetch(request).await;
                    let stop = self.options.merge == MergeMode::FirstUsable && result.is_usable();
                    results.push(result);
                    if stop {
                        break;
                    }
                }
                results
            }
        }
    }
}

/// Merges results given in priority order. Pure and deterministic.
pub fn merge(symbol: Symbol, results: &[ProviderResult], mode: MergeMode) -> MergedData {
    let mut merged = MergedData {
        symbol,
        quote: NormalizedQuote::default(),
        field_sources: BTreeMap::new(),
        sources: Vec::new(),
        source_chain: results.iter().map(|result| result.provider).collect(),
        errors: Vec::new(),
        history: None,
        fundamentals: None,
        profile: None,
        option_expirations: None,
    };

    for result in results {
        match &result.outcome {
            Ok(data) => {
                for error in &data.partial_errors {
                    merged.errors.push(error.to_envelope_error(result.provider));
                }
            }
            Err(error) => {
                warn!(provider = %result.provider, %error, "provider failed");
                merged.errors.push(error.to_envelope_error(result.provider));
            }
        }
    }

    let contributors: Vec<(ProviderId, &ProviderData)> = match mode {
        MergeMode::PerField => results
            .iter()
            .filter_map(|result| Some((result.provider, result.data()?)))
            .collect(),
        MergeMode::FirstUsable => results
            .iter()
            .find(|result| result.is_usable())
            .and_then(|result| Some((result.provider, result.data()?)))
            .into_iter()
            .collect(),
    };

    for field in QuoteField::ALL {
        if let Some((provider, data)) = contributors
            .iter()
            .find(|(_, data)| data.quote.is_available(field))
        {
            merged.quote.copy_field(field, &data.quote);
            merged.field_sources.insert(field, *provider);
        }
    }

    merged.history = first_section(&contributors, ProviderData::has_history, |data| {
        data.history.clone()
    });
    merged.fundamentals = first_section(&contributors, ProviderData::has_fundamentals, |data| {
        data.fundamentals.clone()
    });
    merged.profile = first_section(&contributors, ProviderData::has_profile, |data| {
        data.profile.clone()
    });
    merged.option_expirations = first_section(&contributors, ProviderData::has_options, |data| {
        data.option_expirations.clone()
    });

    let mut used = merged.field_sources.values().copied().collect::<Vec<_>>();
    used.extend(merged.history.as_ref().map(|section| section.source));
    used.extend(merged.fundamentals.as_ref().map(|section| section.source));
    used.extend(merged.profile.as_ref().map(|section| section.source));
    used.extend(merged.option_expirations.as_ref().map(|section| section.source));
    merged.sources = merged
        .source_chain
        .iter()
        .copied()
        .filter(|provider| used.contains(provider))
        .fold(Vec::new(), |mut acc, provider| {
            if !acc.contains(&provider) {
                acc.push(provider);
            }
            acc
        });

    merged
}

fn first_section<T>(
    contributors: &[(ProviderId, &ProviderData)],
    present: impl Fn(&ProviderData) -> bool,
    take: impl Fn(&ProviderData) -> Option<T>,
) -> Option<Sourced<T>> {
    contributors
        .iter()
        .find(|(_, data)| present(data))
        .and_then(|(provider, data)| {
            Some(Sourced {
                source: *provider,
                value: take(data)?,
            })
        })
}
