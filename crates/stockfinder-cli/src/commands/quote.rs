use stockfinder_core::{StockFinder, Symbol};

use crate::cli::QuoteArgs;
use crate::error::CliError;
use crate::output;

use super::lookup::configured_chain;
use super::CommandResult;

pub async fn run(args: &QuoteArgs, finder: &StockFinder) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.ticker)?;

    match finder.aggregate(symbol).await {
        Ok(response) => {
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
