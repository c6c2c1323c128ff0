use serde::Serialize;
use stockfinder_core::{FanOut, MergeMode, ProviderId, StockFinder, StockFinderConfig};

use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct SourceStatus {
    id: ProviderId,
    priority: usize,
    capabilities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    sources: Vec<SourceStatus>,
    fan_out: FanOut,
    merge: MergeMode,
    resolver_configured: bool,
}

pub fn run(finder: &StockFinder, config: &StockFinderConfig) -> Result<CommandResult, CliError> {
    let sources = finder
        .aggregator()
        .providers()
        .into_iter()
        .enumerate()
        .map(|(index, (id, capabilities))| SourceStatus {
            id,
            priority: index + 1,
            capabilities: capabilities.supported_sections(),
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(sources.len() + 3);
    for source in &sources {
        rows.push((
            format!("{}. {}", source.priority, source.id),
            source.capabilities.join(","),
        ));
    }
    rows.push((
        String::from("fan_out"),
        config.aggregation.fan_out.as_str().to_owned(),
    ));
    rows.push((
        String::from("merge"),
        config.aggregation.merge.as_str().to_owned(),
    ));
    let resolver_configured = finder.has_resolver();
    rows.push((
        String::from("resolver"),
        String::from(if resolver_configured {
            "configured"
        } else {
            "not configured"
        }),
    ));

    let chain = sources.iter().map(|source| source.id).collect::<Vec<_>>();
    let data = serde_json::to_value(SourcesResponseData {
        sources,
        fan_out: config.aggregation.fan_out,
        merge: config.aggregation.merge,
        resolver_configured,
    })?;

    let result = CommandResult::ok(data, chain).with_rows(rows);
    if resolver_configured {
        Ok(result)
    } else {
        Ok(result.with_warning("lookup and resolve need STOCKFINDER_OPENAI_API_KEY"))
    }
}
