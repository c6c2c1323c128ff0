use serde::Serialize;
use stockfinder_core::{ResolutionMethod, StockFinder, Symbol, TickerCandidate};

use crate::cli::ResolveArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ResolveResponseData<'a> {
    query: &'a str,
    ticker: Symbol,
    method: ResolutionMethod,
    candidates: Vec<TickerCandidate>,
}

pub async fn run(args: &ResolveArgs, finder: &StockFinder) -> Result<CommandResult, CliError> {
    let query = args.name.join(" ");

    let resolution = match finder.resolve(&query).await {
        Ok(resolution) => resolution,
        Err(error) => return Ok(CommandResult::failed(error, Vec::new())),
    };

    let mut rows = vec![
        (String::from("query"), query.clone()),
        (String::from("ticker"), resolution.symbol.to_string()),
        (String::from("method"), resolution.method.to_string()),
    ];
    for (index, candidate) in resolution.candidates.iter().enumerate() {
        rows.push((
            format!("candidates.{index}"),
            format!("{} ({})", candidate.name, candidate.symbol),
        ));
    }

    let data = serde_json::to_value(ResolveResponseData {
        query: &query,
        ticker: resolution.symbol,
        method: resolution.method,
        candidates: resolution.candidates,
    })?;

    Ok(CommandResult::ok(data, Vec::new()).with_rows(rows))
}
