use stockfinder_core::StockFinder;
use tracing::info;

use crate::cli::LookupArgs;
use crate::error::CliError;
use crate::output;

use super::CommandResult;

pub async fn run(args: &LookupArgs, finder: &StockFinder) -> Result<CommandResult, CliError> {
    let name = args.name.join(" ");

    match finder.lookup(&name).await {
        Ok(response) => {
            info!(company = %name, ticker = %response.ticker, "lookup succeeded");
            let rows = output::response_rows(&response);
            let errors = response.errors.clone();
            let data = serde_json::to_value(&response)?;
            Ok(CommandResult::ok(data, response.sources)
                .with_rows(rows)
                .with_errors(errors))
        }
        Err(error) => Ok(CommandResult::failed(error, configured_chain(finder))),
    }
}

pub(super) fn configured_chain(finder: &StockFinder) -> Vec<stockfinder_core::ProviderId> {
    finder
        .aggregator()
        .providers()
        .into_iter()
        .map(|(provider, _)| provider)
        .collect()
}
