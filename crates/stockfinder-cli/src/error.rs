use stockfinder_core::{ConfigError, LookupError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Lookup(error) => match error {
                LookupError::NoCompanyName => 2,
                LookupError::TickerNotResolved(_) => 3,
                LookupError::NoDataForTicker { .. } => 4,
                LookupError::ProviderError { .. } => 5,
            },
            Self::StrictModeViolation { .. } => 5,
            Self::Config(_) => 6,
            Self::Serialization(_) => 7,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use stockfinder_core::{ResolutionError, Symbol};

    use super::*;

    #[test]
    fn lookup_failures_map_to_distinct_exit_codes() {
        let symbol = Symbol::parse("AAPL").expect("valid symbol");
        let codes = [
            CliError::from(LookupError::NoCompanyName).exit_code(),
            CliError::from(LookupError::TickerNotResolved(ResolutionError::NotConfigured))
                .exit_code(),
            CliError::from(LookupError::NoDataForTicker {
                symbol,
                errors: Vec::new(),
            })
            .exit_code(),
            CliError::from(LookupError::ProviderError {
                provider: None,
                message: String::from("down"),
                errors: Vec::new(),
            })
            .exit_code(),
        ];

        assert_eq!(codes, [2, 3, 4, 5]);
        assert_eq!(CliError::from(ConfigError::NoProviders).exit_code(), 6);
    }
}
