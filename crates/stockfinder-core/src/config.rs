//! Environment-backed configuration, built once and injected into the pipeline.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

use crate::aggregator::{AggregationOptions, FanOut, MergeMode};
use crate::completion::{DEFAULT_COMPLETION_BASE_URL, DEFAULT_COMPLETION_MODEL};
use crate::data_source::{FetchRequest, HistoryRequest};
use crate::http_client::DEFAULT_TIMEOUT_MS;
use crate::resolver::{ResolutionMode, ResolverConfig};
use crate::retry::RetryConfig;
use crate::{HistoryMode, ProviderId, SeriesOrder, Symbol};

/// Upper bound for `STOCKFINDER_MAX_RETRIES`; transient failures get one more try.
pub const MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("completion API key is not set (STOCKFINDER_OPENAI_API_KEY or OPENAI_API_KEY)")]
    MissingCompletionKey,
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("no data providers are enabled")]
    NoProviders,
}

#[derive(Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub mode: ResolutionMode,
    pub strict_max_tokens: u32,
    pub candidates_max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        let resolver = ResolverConfig::default();
        Self {
            api_key: None,
            base_url: String::from(DEFAULT_COMPLETION_BASE_URL),
            model: String::from(DEFAULT_COMPLETION_MODEL),
            mode: resolver.mode,
            strict_max_tokens: resolver.strict_max_tokens,
            candidates_max_tokens: resolver.candidates_max_tokens,
        }
    }
}

impl CompletionConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingCompletionKey)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            model: self.model.clone(),
            mode: self.mode,
            strict_max_tokens: self.strict_max_tokens,
            candidates_max_tokens: self.candidates_max_tokens,
        }
    }
}

impl Debug for CompletionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("strict_max_tokens", &self.strict_max_tokens)
            .field("candidates_max_tokens", &self.candidates_max_tokens)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProvidersConfig {
    pub yahoo_enabled: bool,
    pub alphavantage_enabled: bool,
    pub alphavantage_api_key: Option<String>,
    /// Highest priority first.
    pub priority: Vec<ProviderId>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            yahoo_enabled: true,
            alphavantage_enabled: true,
            alphavantage_api_key: None,
            priority: ProviderId::ALL.to_vec(),
        }
    }
}

impl ProvidersConfig {
    /// Providers that will actually be queried. Alpha Vantage needs a key.
    pub fn active(&self) -> Vec<ProviderId> {
        self.priority
            .iter()
            .copied()
            .filter(|provider| match provider {
                ProviderId::Yahoo => self.yahoo_enabled,
                ProviderId::Alphavantage => {
                    self.alphavantage_enabled
                        && self
                            .alphavantage_api_key
                            .as_deref()
                            .is_some_and(|key| !key.trim().is_empty())
                }
            })
            .collect()
    }
}

impl Debug for ProvidersConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidersConfig")
            .field("yahoo_enabled", &self.yahoo_enabled)
            .field("alphavantage_enabled", &self.alphavantage_enabled)
            .field("alphavantage_api_key", &redacted(&self.alphavantage_api_key))
            .field("priority", &self.priority)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationConfig {
    pub fan_out: FanOut,
    pub merge: MergeMode,
    /// `None` skips the price history section.
    pub history: Option<HistoryMode>,
    pub order: SeriesOrder,
    pub fundamentals: bool,
    pub profile: bool,
    pub options: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            fan_out: FanOut::default(),
            merge: MergeMode::default(),
            history: Some(HistoryMode::Brief),
            order: SeriesOrder::default(),
            fundamentals: true,
            profile: true,
            options: true,
        }
    }
}

impl AggregationConfig {
    pub fn options(&self) -> AggregationOptions {
        AggregationOptions {
            fan_out: self.fan_out,
            merge: self.merge,
        }
    }

    pub fn fetch_request(&self, symbol: Symbol) -> FetchRequest {
        FetchRequest {
            symbol,
            history: self.history.map(|mode| HistoryRequest {
                mode,
                order: self.order,
            }),
            fundamentals: self.fundamentals,
            profile: self.profile,
            options: self.options,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockFinderConfig {
    pub completion: CompletionConfig,
    pub providers: ProvidersConfig,
    pub http: HttpConfig,
    pub aggregation: AggregationConfig,
}

impl StockFinderConfig {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |primary: &str, fallback: Option<&str>| {
            lookup(primary)
                .or_else(|| fallback.and_then(&lookup))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();

        let completion = CompletionConfig {
            api_key: var("STOCKFINDER_OPENAI_API_KEY", Some("OPENAI_API_KEY")),
            base_url: var("STOCKFINDER_COMPLETION_BASE_URL", None)
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.completion.base_url),
            model: var("STOCKFINDER_COMPLETION_MODEL", None).unwrap_or(defaults.completion.model),
            mode: parse(
                "STOCKFINDER_RESOLUTION",
                var("STOCKFINDER_RESOLUTION", None),
                defaults.completion.mode,
            )?,
            strict_max_tokens: parse(
                "STOCKFINDER_STRICT_MAX_TOKENS",
                var("STOCKFINDER_STRICT_MAX_TOKENS", None),
                defaults.completion.strict_max_tokens,
            )?,
            candidates_max_tokens: parse(
                "STOCKFINDER_CANDIDATES_MAX_TOKENS",
                var("STOCKFINDER_CANDIDATES_MAX_TOKENS", None),
                defaults.completion.candidates_max_tokens,
            )?,
        };

        let providers = ProvidersConfig {
            yahoo_enabled: parse_bool(
                "STOCKFINDER_YAHOO_ENABLED",
                var("STOCKFINDER_YAHOO_ENABLED", None),
                defaults.providers.yahoo_enabled,
            )?,
            alphavantage_enabled: parse_bool(
                "STOCKFINDER_ALPHAVANTAGE_ENABLED",
                var("STOCKFINDER_ALPHAVANTAGE_ENABLED", None),
                defaults.providers.alphavantage_enabled,
            )?,
            alphavantage_api_key: var(
                "STOCKFINDER_ALPHAVANTAGE_API_KEY",
                Some("ALPHAVANTAGE_API_KEY"),
            ),
            priority: match var("STOCKFINDER_PROVIDER_PRIORITY", None) {
                Some(raw) => parse_priority(&raw)?,
                None => defaults.providers.priority,
            },
        };

        let mut retry = defaults.http.retry.clone();
        retry.max_retries = parse(
            "STOCKFINDER_MAX_RETRIES",
            var("STOCKFINDER_MAX_RETRIES", None),
            retry.max_retries,
        )?;
        if retry.max_retries > MAX_RETRIES {
            return Err(invalid(
                "STOCKFINDER_MAX_RETRIES",
                &retry.max_retries.to_string(),
                format!("at most {MAX_RETRIES} retry is allowed"),
            ));
        }
        retry.enabled = retry.max_retries > 0;
        let http = HttpConfig {
            timeout_ms: parse(
                "STOCKFINDER_TIMEOUT_MS",
                var("STOCKFINDER_TIMEOUT_MS", None),
                defaults.http.timeout_ms,
            )?,
            retry,
        };

        let aggregation = AggregationConfig {
            fan_out: parse(
                "STOCKFINDER_FAN_OUT",
                var("STOCKFINDER_FAN_OUT", None),
                defaults.aggregation.fan_out,
            )?,
            merge: parse(
                "STOCKFINDER_MERGE",
                var("STOCKFINDER_MERGE", None),
                defaults.aggregation.merge,
            )?,
            history: match var("STOCKFINDER_HISTORY", None) {
                Some(raw) => parse_history(&raw)
                    .map_err(|reason| invalid("STOCKFINDER_HISTORY", &raw, reason))?,
                None => defaults.aggregation.history,
            },
            order: parse(
                "STOCKFINDER_HISTORY_ORDER",
                var("STOCKFINDER_HISTORY_ORDER", None),
                defaults.aggregation.order,
            )?,
            ..defaults.aggregation
        };

        Ok(Self {
            completion,
            providers,
            http,
            aggregation,
        })
    }
}

/// `none` disables history; otherwise a [`HistoryMode`].
pub fn parse_history(value: &str) -> Result<Option<HistoryMode>, String> {
    if value.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value
        .parse::<HistoryMode>()
        .map(Some)
        .map_err(|error| error.to_string())
}

fn parse_priority(raw: &str) -> Result<Vec<ProviderId>, ConfigError> {
    let mut priority = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let provider = part
            .parse::<ProviderId>()
            .map_err(|error| invalid("STOCKFINDER_PROVIDER_PRIORITY", raw, error))?;
        if !priority.contains(&provider) {
            priority.push(provider);
        }
    }
    if priority.is_empty() {
        return Err(invalid(
            "STOCKFINDER_PROVIDER_PRIORITY",
            raw,
            "at least one provider is required",
        ));
    }
    Ok(priority)
}

fn parse<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|error| invalid(key, &raw, error)),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(_) => Err(invalid(
            key,
            raw.as_deref().unwrap_or_default(),
            "expected true or false",
        )),
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_owned(),
        reason: reason.to_string(),
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    match value {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}
