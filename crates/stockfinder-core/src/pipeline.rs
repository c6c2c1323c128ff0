//! Company name in, aggregated market data out.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::{AlphaVantageAdapter, YahooAdapter};
use crate::aggregator::{AggregationFailure, Aggregator};
use crate::assembler::{AggregatedResponse, ResultAssembler};
use crate::completion::{CompletionClient, OpenAiCompletionClient};
use crate::config::{AggregationConfig, ConfigError, StockFinderConfig};
use crate::data_source::{DataSource, SymbolProbe};
use crate::http_client::HttpClient;
use crate::resolver::{ResolutionError, TickerResolution, TickerResolver};
use crate::{EnvelopeError, ProviderId, Symbol};

/// Boundary error of [`StockFinder`]. `code()` is stable for API consumers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    #[error("company name is required")]
    NoCompanyName,
    #[error("ticker could not be resolved: {0}")]
    TickerNotResolved(#[source] ResolutionError),
    #[error("no data found for ticker {symbol}")]
    NoDataForTicker {
        symbol: Symbol,
        errors: Vec<EnvelopeError>,
    },
    #[error("provider error: {message}")]
    ProviderError {
        provider: Option<ProviderId>,
        message: String,
        errors: Vec<EnvelopeError>,
    },
}

impl LookupError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoCompanyName => "no_company_name",
            Self::TickerNotResolved(_) => "ticker_not_resolved",
            Self::NoDataForTicker { .. } => "no_data_for_ticker",
            Self::ProviderError { .. } => "provider_error",
        }
    }

    /// Per-provider errors collected before the lookup failed.
    pub fn provider_errors(&self) -> &[EnvelopeError] {
        match self {
            Self::NoDataForTicker { errors, .. } | Self::ProviderError { errors, .. } => errors,
            Self::NoCompanyName | Self::TickerNotResolved(_) => &[],
        }
    }

    pub fn to_envelope_error(&self) -> EnvelopeError {
        EnvelopeError {
            code: self.code().to_owned(),
            message: self.to_string(),
            retryable: None,
            source: match self {
                Self::ProviderError { provider, .. } => *provider,
                _ => None,
            },
        }
    }
}

impl From<ResolutionError> for LookupError {
    fn from(error: ResolutionError) -> Self {
        match error {
            ResolutionError::EmptyQuery => Self::NoCompanyName,
            other => Self::TickerNotResolved(other),
        }
    }
}

impl From<AggregationFailure> for LookupError {
    fn from(failure: AggregationFailure) -> Self {
        match failure {
            AggregationFailure::NoProviders => Self::ProviderError {
                provider: None,
                message: String::from("no data providers are configured"),
                errors: Vec::new(),
            },
            AggregationFailure::ProviderError {
                provider,
                ref error,
                ref errors,
                ..
            } => Self::ProviderError {
                provider: Some(provider),
                message: format!("{provider}: {error}"),
                errors: errors.clone(),
            },
            AggregationFailure::NoData { symbol, errors, .. } => {
                Self::NoDataForTicker { symbol, errors }
            }
        }
    }
}

/// Resolver, aggregator and assembler wired together for one configuration.
#[derive(Clone)]
pub struct StockFinder {
    resolver: Option<TickerResolver>,
    aggregator: Aggregator,
    assembler: ResultAssembler,
    aggregation: AggregationConfig,
}

impl StockFinder {
    pub fn new(
        resolver: Option<TickerResolver>,
        aggregator: Aggregator,
        aggregation: AggregationConfig,
    ) -> Self {
        let aggregator = aggregator.with_options(aggregation.options());
        Self {
            resolver,
            aggregator,
            assembler: ResultAssembler,
            aggregation,
        }
    }

    /// Builds production adapters over `http_client`. The resolver is only
    /// wired when a completion key is configured.
    pub fn from_config(
        config: &StockFinderConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        let completion = match config.completion.require_api_key() {
            Ok(key) => {
                let client = OpenAiCompletionClient::new(key, &config.completion.base_url)
                    .map_err(|error| ConfigError::Invalid {
                        key: "STOCKFINDER_COMPLETION_BASE_URL",
                        value: config.completion.base_url.clone(),
                        reason: error.to_string(),
                    })?
                    .with_retry(config.http.retry.clone())
                    .with_timeout_ms(config.http.timeout_ms);
                Some(Arc::new(client) as Arc<dyn CompletionClient>)
            }
            Err(_) => None,
        };

        Self::from_config_with_completion(config, http_client, completion)
    }

    /// Same as [`StockFinder::from_config`] with a caller-supplied completion
    /// client. `None` leaves the finder without a resolver.
    pub fn from_config_with_completion(
        config: &StockFinderConfig,
        http_client: Arc<dyn HttpClient>,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> Result<Self, ConfigError> {
        let active = config.providers.active();
        if active.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut adapters: Vec<Arc<dyn DataSource>> = Vec::with_capacity(active.len());
        let mut probe: Option<Arc<dyn SymbolProbe>> = None;
        for provider in active {
            match provider {
                ProviderId::Yahoo => {
                    let yahoo = Arc::new(
                        YahooAdapter::new(http_client.clone())
                            .with_retry(config.http.retry.clone())
                            .with_timeout_ms(config.http.timeout_ms),
                    );
                    if probe.is_none() {
                        probe = Some(yahoo.clone());
                    }
                    adapters.push(yahoo);
                }
                ProviderId::Alphavantage => {
                    let Some(key) = config.providers.alphavantage_api_key.clone() else {
                        continue;
                    };
                    adapters.push(Arc::new(
                        AlphaVantageAdapter::new(http_client.clone(), key)
                            .with_retry(config.http.retry.clone())
                            .with_timeout_ms(config.http.timeout_ms),
                    ));
                }
            }
        }

        let resolver = completion.map(|completion| {
            let resolver = TickerResolver::new(completion, config.completion.resolver_config());
            match probe {
                Some(probe) => resolver.with_probe(probe),
                None => resolver,
            }
        });

        Ok(Self::new(
            resolver,
            Aggregator::new(adapters),
            config.aggregation.clone(),
        ))
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    /// Resolves `company_name` to a validated ticker without fetching data.
    pub async fn resolve(&self, company_name: &str) -> Result<TickerResolution, LookupError> {
        if company_name.trim().is_empty() {
            return Err(LookupError::NoCompanyName);
        }
        let resolver = self
            .resolver
            .as_ref()
            .ok_or(LookupError::TickerNotResolved(ResolutionError::NotConfigured))?;

        resolver.resolve(company_name).await.map_err(|error| {
            warn!(company_name, %error, "ticker resolution failed");
            LookupError::from(error)
        })
    }

    /// Aggregates data for an explicit ticker. No completion call is made.
    pub async fn aggregate(&self, symbol: Symbol) -> Result<AggregatedResponse, LookupError> {
        self.aggregate_with(symbol, None).await
    }

    pub async fn lookup(&self, company_name: &str) -> Result<AggregatedResponse, LookupError> {
        let resolution = self.resolve(company_name).await?;
        let symbol = resolution.symbol.clone();
        self.aggregate_with(symbol, Some(resolution)).await
    }

    async fn aggregate_with(
        &self,
        symbol: Symbol,
        resolution: Option<TickerResolution>,
    ) -> Result<AggregatedResponse, LookupError> {
        let request = self.aggregation.fetch_request(symbol);
        let merged = self.aggregator.aggregate(&request).await.map_err(|failure| {
            warn!(symbol = %request.symbol, %failure, "aggregation failed");
            LookupError::from(failure)
        })?;

        let errors = merged.errors.clone();
        let response = self
            .assembler
            .assemble(merged, resolution)
            .map_err(|error| {
                warn!(%error, "provider data failed validation");
                LookupError::ProviderError {
                    provider: None,
                    message: format!("provider data failed validation: {error}"),
                    errors,
                }
            })?;
        info!(
            ticker = %response.ticker,
            sources = ?response.sources,
            errors = response.errors.len(),
            "lookup complete"
        );
        Ok(response)
    }
}
