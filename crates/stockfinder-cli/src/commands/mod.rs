mod lookup;
mod quote;
mod resolve;
mod sources;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use stockfinder_core::{
    Envelope, EnvelopeError, FanOut, HttpClient, LookupError, MergeMode, ProviderId,
    ReqwestHttpClient, StockFinder, StockFinderConfig,
};
use tracing::debug;

use crate::cli::{Cli, Command, ResolutionArg, SectionArgs};
use crate::error::CliError;
use crate::metadata::Metadata;
use crate::output::Rows;

pub struct CommandResult {
    pub data: Value,
    pub rows: Rows,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub source_chain: Vec<ProviderId>,
    pub failure: Option<LookupError>,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<ProviderId>) -> Self {
        Self {
            data,
            rows: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            source_chain,
            failure: None,
        }
    }

    /// Envelope for a failed lookup: null data, the boundary error first, then
    /// whatever the providers reported.
    pub fn failed(error: LookupError, source_chain: Vec<ProviderId>) -> Self {
        let mut errors = vec![error.to_envelope_error()];
        errors.extend_from_slice(error.provider_errors());
        Self {
            errors,
            failure: Some(error),
            ..Self::ok(Value::Null, source_chain)
        }
    }

    pub fn with_rows(mut self, rows: Rows) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub struct CommandOutput {
    pub envelope: Envelope<Value>,
    pub rows: Rows,
    pub failure: Option<LookupError>,
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let mut config = StockFinderConfig::from_env()?;
    apply_overrides(cli, &mut config);
    debug!(?config, "effective configuration");

    if matches!(cli.command, Command::Lookup(_) | Command::Resolve(_)) {
        config.completion.require_api_key()?;
    }

    let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let finder = StockFinder::from_config(&config, http_client)?;
    let mut warnings = skipped_provider_warnings(cli, &config);

    let started = Instant::now();
    let command_result = match &cli.command {
        Command::Lookup(args) => lookup::run(args, &finder).await?,
        Command::Resolve(args) => resolve::run(args, &finder).await?,
        Command::Quote(args) => quote::run(args, &finder).await?,
        Command::Sources(_) => sources::run(&finder, &config)?,
    };
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let CommandResult {
        data,
        rows,
        warnings: command_warnings,
        errors,
        source_chain,
        failure,
    } = command_result;
    warnings.extend(command_warnings);

    let mut metadata = Metadata::new(source_chain, latency_ms);
    for warning in warnings {
        metadata.push_warning(warning);
    }
    let meta = metadata.into_envelope_meta()?;

    Ok(CommandOutput {
        envelope: Envelope::with_errors(meta, data, errors)?,
        rows,
        failure,
    })
}

fn apply_overrides(cli: &Cli, config: &mut StockFinderConfig) {
    if let Some(timeout_ms) = cli.timeout_ms {
        config.http.timeout_ms = timeout_ms;
    }
    if cli.sequential {
        config.aggregation.fan_out = FanOut::Sequential;
    }
    if cli.first_usable {
        config.aggregation.merge = MergeMode::FirstUsable;
    }
    if cli.no_alphavantage {
        config.providers.alphavantage_enabled = false;
    }

    match &cli.command {
        Command::Lookup(args) => {
            apply_resolution(args.resolution, config);
            apply_sections(&args.sections, config);
        }
        Command::Resolve(args) => apply_resolution(args.resolution, config),
        Command::Quote(args) => apply_sections(&args.sections, config),
        Command::Sources(_) => {}
    }
}

fn apply_resolution(resolution: Option<ResolutionArg>, config: &mut StockFinderConfig) {
    if let Some(mode) = resolution {
        config.completion.mode = mode.into();
    }
}

fn apply_sections(sections: &SectionArgs, config: &mut StockFinderConfig) {
    let aggregation = &mut config.aggregation;
    if let Some(history) = sections.history {
        aggregation.history = history.into_mode();
    }
    if let Some(order) = sections.order {
        aggregation.order = order.into();
    }
    aggregation.fundamentals &= !sections.no_fundamentals;
    aggregation.profile &= !sections.no_profile;
    aggregation.options &= !sections.no_options;
}

fn skipped_provider_warnings(cli: &Cli, config: &StockFinderConfig) -> Vec<String> {
    let wants_alphavantage = config.providers.alphavantage_enabled && !cli.no_alphavantage;
    if wants_alphavantage && !config.providers.active().contains(&ProviderId::Alphavantage) {
        vec![String::from(
            "alphavantage skipped: STOCKFINDER_ALPHAVANTAGE_API_KEY is not set",
        )]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use stockfinder_core::{HistoryMode, ResolutionMode, SeriesOrder};

    use super::*;

    #[test]
    fn cli_flags_override_configuration() {
        let cli = Cli::try_parse_from([
            "stockfinder",
            "lookup",
            "Apple",
            "--resolution",
            "strict",
            "--history",
            "extended",
            "--order",
            "desc",
            "--no-profile",
            "--sequential",
            "--no-alphavantage",
            "--timeout-ms",
            "1500",
        ])
        .expect("arguments parse");
        let mut config = StockFinderConfig::default();

        apply_overrides(&cli, &mut config);

        assert_eq!(config.completion.mode, ResolutionMode::Strict);
        assert_eq!(config.aggregation.history, Some(HistoryMode::Extended));
        assert_eq!(config.aggregation.order, SeriesOrder::Descending);
        assert!(!config.aggregation.profile);
        assert!(config.aggregation.fundamentals);
        assert_eq!(config.aggregation.fan_out, FanOut::Sequential);
        assert!(!config.providers.alphavantage_enabled);
        assert_eq!(config.http.timeout_ms, 1500);
    }

    #[test]
    fn history_none_disables_the_section() {
        let cli = Cli::try_parse_from(["stockfinder", "quote", "AAPL", "--history", "none"])
            .expect("arguments parse");
        let mut config = StockFinderConfig::default();

        apply_overrides(&cli, &mut config);

        assert_eq!(config.aggregation.history, None);
    }

    #[test]
    fn failed_result_lists_boundary_error_first() {
        let provider_error = stockfinder_core::SourceError::unavailable("timed out")
            .to_envelope_error(ProviderId::Yahoo);
        let failure = LookupError::NoDataForTicker {
            symbol: stockfinder_core::Symbol::parse("ZZZZ").expect("valid symbol"),
            errors: vec![provider_error.clone()],
        };

        let result = CommandResult::failed(failure, vec![ProviderId::Yahoo]);

        assert_eq!(result.data, Value::Null);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].code, "no_data_for_ticker");
        assert_eq!(result.errors[1], provider_error);
    }
}
