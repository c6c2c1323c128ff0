//! CLI argument definitions for stockfinder.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lookup` | Resolve a company name and aggregate its market data |
//! | `resolve` | Resolve a company name to a ticker only |
//! | `quote` | Aggregate market data for an explicit ticker |
//! | `sources` | List configured providers and capabilities |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings and provider errors as failures |
//! | `--timeout-ms` | `8000` | Per-request timeout in ms |
//! | `--sequential` | `false` | Query providers one at a time |
//! | `--first-usable` | `false` | Take everything from the first usable provider |
//! | `--no-alphavantage` | `false` | Skip Alpha Vantage even if a key is set |
//!
//! # Examples
//!
//! ```bash
//! stockfinder lookup Apple --pretty
//! stockfinder lookup "Berkshire Hathaway" --history extended --order desc
//! stockfinder resolve Alphabet --resolution strict
//! stockfinder quote MSFT --format table
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use stockfinder_core::{HistoryMode, ResolutionMode, SeriesOrder};

/// Company-name to market-data lookup across Yahoo Finance and Alpha Vantage.
#[derive(Debug, Parser)]
#[command(
    name = "stockfinder",
    author,
    version,
    about = "Find a company's ticker and aggregate its market data",
    long_about = "stockfinder resolves a free-text company name to a stock ticker with a \
language model, then fetches quote, price history, fundamentals, profile and option \
expirations from every configured provider and merges them field by field.\n\
\n\
Configuration is read from the environment (and a .env file):\n\
  STOCKFINDER_OPENAI_API_KEY / OPENAI_API_KEY          completion service key\n\
  STOCKFINDER_ALPHAVANTAGE_API_KEY / ALPHAVANTAGE_API_KEY\n\
  STOCKFINDER_LOG / RUST_LOG                            log filter (default: warn)"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and provider errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Per-request timeout in milliseconds. Overrides STOCKFINDER_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Query providers one at a time in priority order.
    #[arg(long, global = true, default_value_t = false)]
    pub sequential: bool,

    /// Take all data from the first provider that returns anything usable.
    #[arg(long, global = true, default_value_t = false)]
    pub first_usable: bool,

    /// Do not query Alpha Vantage.
    #[arg(long, global = true, default_value_t = false)]
    pub no_alphavantage: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON envelope.
    Json,
    /// Aligned key/value rows for terminals.
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HistoryArg {
    None,
    /// Last 5 trading days.
    Brief,
    /// Last 15 trading days.
    Extended,
}

impl HistoryArg {
    pub fn into_mode(self) -> Option<HistoryMode> {
        match self {
            Self::None => None,
            Self::Brief => Some(HistoryMode::Brief),
            Self::Extended => Some(HistoryMode::Extended),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SeriesOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => Self::Ascending,
            OrderArg::Desc => Self::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionArg {
    /// Ask for a bare ticker symbol.
    Strict,
    /// Ask for "Company Name (TICKER)" candidates and take the first.
    Candidates,
}

impl From<ResolutionArg> for ResolutionMode {
    fn from(mode: ResolutionArg) -> Self {
        match mode {
            ResolutionArg::Strict => Self::Strict,
            ResolutionArg::Candidates => Self::Candidates,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a company name and aggregate its market data.
    ///
    /// # Examples
    ///
    ///   stockfinder lookup Apple
    ///   stockfinder lookup Apple --history none --no-options
    Lookup(LookupArgs),

    /// Resolve a company name to a ticker without fetching market data.
    ///
    /// # Examples
    ///
    ///   stockfinder resolve "International Business Machines"
    Resolve(ResolveArgs),

    /// Aggregate market data for an explicit ticker. No language-model call.
    ///
    /// # Examples
    ///
    ///   stockfinder quote AAPL --format table
    Quote(QuoteArgs),

    /// List configured providers in priority order with their capabilities.
    Sources(SourcesArgs),
}

/// Which optional sections to request.
#[derive(Debug, Clone, Args)]
pub struct SectionArgs {
    /// Price history window.
    #[arg(long, value_enum)]
    pub history: Option<HistoryArg>,

    /// Price history order.
    #[arg(long, value_enum)]
    pub order: Option<OrderArg>,

    #[arg(long, default_value_t = false)]
    pub no_fundamentals: bool,

    #[arg(long, default_value_t = false)]
    pub no_profile: bool,

    #[arg(long, default_value_t = false)]
    pub no_options: bool,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Company name; multiple words are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    pub name: Vec<String>,

    #[arg(long, value_enum)]
    pub resolution: Option<ResolutionArg>,

    #[command(flatten)]
    pub sections: SectionArgs,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Company name; multiple words are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    pub name: Vec<String>,

    #[arg(long, value_enum)]
    pub resolution: Option<ResolutionArg>,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Ticker symbol (e.g. AAPL, BRK.B).
    pub ticker: String,

    #[command(flatten)]
    pub sections: SectionArgs,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lookup_with_section_flags() {
        let cli = Cli::try_parse_from([
            "stockfinder",
            "lookup",
            "Berkshire",
            "Hathaway",
            "--history",
            "extended",
            "--order",
            "desc",
            "--no-options",
            "--format",
            "table",
        ])
        .expect("arguments parse");

        assert_eq!(cli.format, OutputFormat::Table);
        match cli.command {
            Command::Lookup(args) => {
                assert_eq!(args.name, vec!["Berkshire", "Hathaway"]);
                assert_eq!(args.sections.history, Some(HistoryArg::Extended));
                assert_eq!(args.sections.order, Some(OrderArg::Desc));
                assert!(args.sections.no_options);
                assert!(!args.sections.no_profile);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stockfinder",
            "quote",
            "MSFT",
            "--sequential",
            "--first-usable",
            "--timeout-ms",
            "2500",
        ])
        .expect("arguments parse");

        assert!(cli.sequential);
        assert!(cli.first_usable);
        assert_eq!(cli.timeout_ms, Some(2500));
    }

    #[test]
    fn lookup_requires_a_name() {
        assert!(Cli::try_parse_from(["stockfinder", "lookup"]).is_err());
    }
}
