//! Company name to ticker resolution.
//!
//! The completion service proposes a ticker; when that yields nothing valid
//! the raw input is probed against the primary provider as a last resort.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::completion::{ChatMessage, CompletionClient, CompletionError, CompletionRequest};
use crate::{SourceError, Symbol, SymbolProbe, TickerCandidate, ValidationError};

const SYSTEM_PROMPT: &str =
    "You are an AI that finds the correct stock ticker based on a company name.";

/// Output contract requested from the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// A bare ticker symbol and nothing else.
    Strict,
    /// A list of `Company Name (TICKER)` lines; the first is authoritative.
    #[default]
    Candidates,
}

impl ResolutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Candidates => "candidates",
        }
    }
}

impl FromStr for ResolutionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "candidates" => Ok(Self::Candidates),
            other => Err(format!(
                "invalid resolution mode '{other}', expected strict or candidates"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub model: String,
    pub mode: ResolutionMode,
    pub strict_max_tokens: u32,
    pub candidates_max_tokens: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model: String::from(crate::completion::DEFAULT_COMPLETION_MODEL),
            mode: ResolutionMode::default(),
            strict_max_tokens: 10,
            candidates_max_tokens: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Completion,
    RawInputProbe,
}

/// Resolved ticker plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerResolution {
    pub symbol: Symbol,
    pub method: ResolutionMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<TickerCandidate>,
}

/// Why the completion path produced no ticker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionFailure {
    #[error(transparent)]
    Service(#[from] CompletionError),
    #[error("model output had no 'Company Name (TICKER)' line")]
    NoCandidate,
    #[error("model proposed an invalid ticker '{value}': {source}")]
    InvalidSymbol {
        value: String,
        source: ValidationError,
    },
}

/// Why the raw-input probe did not confirm a ticker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("input is not a valid ticker: {0}")]
    InvalidSymbol(ValidationError),
    #[error("no probe provider is configured")]
    NotConfigured,
    #[error("provider returned no price data for '{0}'")]
    NoData(String),
    #[error(transparent)]
    Provider(SourceError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("company name cannot be empty")]
    EmptyQuery,
    #[error("no completion service is configured")]
    NotConfigured,
    #[error("could not determine a ticker for '{query}': {completion}; fallback: {probe}")]
    Unresolved {
        query: String,
        completion: CompletionFailure,
        probe: ProbeFailure,
    },
}

/// Turns free-text company names into validated tickers.
#[derive(Clone)]
pub struct TickerResolver {
    completion: Arc<dyn CompletionClient>,
    probe: Option<Arc<dyn SymbolProbe>>,
    config: ResolverConfig,
}

impl TickerResolver {
    pub fn new(completion: Arc<dyn CompletionClient>, config: ResolverConfig) -> Self {
        Self {
            completion,
            probe: None,
            config,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn SymbolProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub async fn resolve(&self, company_name: &str) -> Result<TickerResolution, ResolutionError> {
        let query = company_name.trim();
        if query.is_empty() {
            return Err(ResolutionError::EmptyQuery);
        }

        let completion = match self.ask_completion(query).await {
            Ok((symbol, candidates)) => {
                info!(%symbol, mode = self.config.mode.as_str(), "resolved ticker via completion");
                return Ok(TickerResolution {
                    symbol,
                    method: ResolutionMethod::Completion,
                    candidates,
                });
            }
            Err(failure) => failure,
        };
        warn!(query, error = %completion, "completion did not yield a ticker; probing raw input");

        match self.probe_raw(query).await {
            Ok(symbol) => {
                info!(%symbol, "resolved ticker via raw input probe");
                Ok(TickerResolution {
                    symbol,
                    method: ResolutionMethod::RawInputProbe,
                    candidates: Vec::new(),
                })
            }
            Err(probe) => Err(ResolutionError::Unresolved {
                query: query.to_owned(),
                completion,
                probe,
            }),
        }
    }

    async fn ask_completion(
        &self,
        query: &str,
    ) -> Result<(Symbol, Vec<TickerCandidate>), CompletionFailure> {
        let (prompt, max_tokens) = match self.config.mode {
            ResolutionMode::Strict => (
                format!(
                    "Return ONLY the stock ticker symbol for '{query}'. \
                     No company name, no punctuation, no explanation."
                ),
                self.config.strict_max_tokens,
            ),
            ResolutionMode::Candidates => (
                format!(
                    "Find the stock ticker for '{query}'. If multiple results exist, provide a \
                     list of possible companies with their tickers. Use the format \
                     'Company Name (TICKER)' for each entry."
                ),
                self.config.candidates_max_tokens,
            ),
        };

        let text = self
            .completion
            .complete(CompletionRequest {
                model: self.config.model.clone(),
                messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
                max_tokens,
            })
            .await?;
        debug!(chars = text.len(), "completion returned");

        match self.config.mode {
            ResolutionMode::Strict => {
                let cleaned = clean_strict_output(&text);
                let symbol = parse_symbol(cleaned)?;
                Ok((symbol, Vec::new()))
            }
            ResolutionMode::Candidates => {
                let first = first_candidate_ticker(&text).ok_or(CompletionFailure::NoCandidate)?;
                let symbol = parse_symbol(first)?;
                Ok((symbol, parse_candidates(&text)))
            }
        }
    }

    async fn probe_raw(&self, query: &str) -> Result<Symbol, ProbeFailure> {
        let symbol = Symbol::parse(query).map_err(ProbeFailure::InvalidSymbol)?;
        let probe = self.probe.as_ref().ok_or(ProbeFailure::NotConfigured)?;

        match probe.probe(&symbol).await {
            Ok(true) => Ok(symbol),
            Ok(false) => Err(ProbeFailure::NoData(symbol.to_string())),
            Err(error) => Err(ProbeFailure::Provider(error)),
        }
    }
}

impl Display for ResolutionMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Completion => "completion",
            Self::RawInputProbe => "raw_input_probe",
        })
    }
}

fn parse_symbol(value: &str) -> Result<Symbol, CompletionFailure> {
    Symbol::parse(value).map_err(|source| CompletionFailure::InvalidSymbol {
        value: value.to_owned(),
        source,
    })
}

/// Strips quoting, a `$` prefix and trailing punctuation from a bare-ticker answer.
pub fn clean_strict_output(text: &str) -> &str {
    let first_line = text.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    first_line
        .trim_matches(|ch: char| matches!(ch, '"' | '\'' | '`'))
        .trim_start_matches('$')
        .trim_end_matches(|ch: char| matches!(ch, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim()
}

/// Ticker text from the first line carrying a `(` ... `)` pair.
pub fn first_candidate_ticker(text: &str) -> Option<&str> {
    text.lines().find_map(split_candidate_line).map(|(_, ticker)| ticker)
}

/// Every `Company Name (TICKER)` line whose ticker validates.
pub fn parse_candidates(text: &str) -> Vec<TickerCandidate> {
    text.lines()
        .filter_map(split_candidate_line)
        .filter_map(|(name, ticker)| {
            let symbol = Symbol::parse(ticker).ok()?;
            Some(TickerCandidate {
                name: name.to_owned(),
                symbol,
            })
        })
        .collect()
}

fn split_candidate_line(line: &str) -> Option<(&str, &str)> {
    if !line.contains('(') || !line.contains(')') {
        return None;
    }

    let open = line.rfind('(')?;
    let after = &line[open + 1..];
    let ticker = after.split(')').next().unwrap_or(after).trim();
    let name = line[..open]
        .trim()
        .trim_start_matches(|ch: char| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '*' | ')'))
        .trim();
    Some((name, ticker))
}
