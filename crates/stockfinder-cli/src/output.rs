use serde_json::Value;
use stockfinder_core::{to_billions, AggregatedResponse, Envelope};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Flat keys whose values are raw currency amounts.
const MONEY_KEYS: &[&str] = &[
    "quote.market_cap",
    "fundamentals.revenue",
    "fundamentals.net_income",
    "fundamentals.market_cap",
];

pub type Rows = Vec<(String, String)>;

pub fn render(
    envelope: &Envelope<Value>,
    rows: &[(String, String)],
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(envelope, rows)?),
    }

    Ok(())
}

/// Table rows for a lookup response. Money figures are shown in billions.
pub fn response_rows(response: &AggregatedResponse) -> Rows {
    response
        .to_flat_map()
        .into_iter()
        .map(|(key, value)| {
            let value = if MONEY_KEYS.contains(&key.as_str()) {
                value
                    .parse::<f64>()
                    .map(|amount| format!("{:.2}B", to_billions(amount)))
                    .unwrap_or(value)
            } else {
                value
            };
            (key, value)
        })
        .collect()
}

fn render_table(envelope: &Envelope<Value>, rows: &[(String, String)]) -> Result<String, CliError> {
    let mut out = String::new();
    out.push_str(&format!("request_id  : {}\n", envelope.meta.request_id));
    out.push_str(&format!("schema      : {}\n", envelope.meta.schema_version));
    out.push_str(&format!("generated_at: {}\n", envelope.meta.generated_at));
    out.push_str(&format!(
        "sources     : {}\n",
        envelope
            .meta
            .source_chain
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    ));
    out.push_str(&format!("latency_ms  : {}\n", envelope.meta.latency_ms));

    if !envelope.meta.warnings.is_empty() {
        out.push_str("warnings:\n");
        for warning in &envelope.meta.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    out.push_str("data:\n");
    if rows.is_empty() {
        let pretty_data = serde_json::to_string_pretty(&envelope.data)?;
        for line in pretty_data.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    } else {
        let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in rows {
            out.push_str(&format!("  {key:<width$}  {value}\n"));
        }
    }

    if !envelope.errors.is_empty() {
        out.push_str("errors:\n");
        for error in &envelope.errors {
            match error.source {
                Some(source) => {
                    out.push_str(&format!("  - [{source}] {}: {}\n", error.code, error.message))
                }
                None => out.push_str(&format!("  - {}: {}\n", error.code, error.message)),
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use stockfinder_core::{
        EnvelopeMeta, NormalizedQuote, ProviderId, QuoteField, Symbol, UtcDateTime,
    };

    use super::*;

    fn response() -> AggregatedResponse {
        let mut quote = NormalizedQuote::default();
        quote.set_number(QuoteField::CurrentPrice, 189.5);
        quote.set_number(QuoteField::MarketCap, 2_951_234_000_000.0);
        let mut field_sources = BTreeMap::new();
        field_sources.insert(QuoteField::CurrentPrice, ProviderId::Yahoo);
        field_sources.insert(QuoteField::MarketCap, ProviderId::Yahoo);

        AggregatedResponse {
            ticker: Symbol::parse("AAPL").expect("valid symbol"),
            quote,
            field_sources,
            sources: vec![ProviderId::Yahoo],
            errors: Vec::new(),
            history: None,
            fundamentals: None,
            profile: None,
            option_expirations: None,
            resolution: None,
            generated_at: UtcDateTime::parse("2026-01-02T15:04:05Z").expect("valid timestamp"),
        }
    }

    #[test]
    fn money_rows_are_rendered_in_billions() {
        let rows = response_rows(&response());
        let market_cap = rows
            .iter()
            .find(|(key, _)| key == "quote.market_cap")
            .map(|(_, value)| value.as_str());
        let price = rows
            .iter()
            .find(|(key, _)| key == "quote.current_price")
            .map(|(_, value)| value.as_str());

        assert_eq!(market_cap, Some("2951.23B"));
        assert_eq!(price, Some("189.5"));
    }

    #[test]
    fn unavailable_money_stays_marked() {
        let mut response = response();
        response.quote.market_cap = stockfinder_core::Datum::Unavailable;
        response.field_sources.remove(&QuoteField::MarketCap);

        let rows = response_rows(&response);
        assert!(rows
            .iter()
            .any(|(key, value)| key == "quote.market_cap" && value == "N/A"));
    }

    #[test]
    fn table_lists_rows_and_errors() {
        let meta = EnvelopeMeta::new("req-12345678", vec![ProviderId::Yahoo], 12)
            .expect("valid meta");
        let error = stockfinder_core::SourceError::unauthorized("crumb rejected")
            .to_envelope_error(ProviderId::Yahoo);
        let envelope = Envelope::with_errors(meta, Value::Null, vec![error]).expect("valid");
        let rows = vec![(String::from("ticker"), String::from("AAPL"))];

        let table = render_table(&envelope, &rows).expect("renders");

        assert!(table.contains("  ticker  AAPL"));
        assert!(table.contains("[yahoo] source.unauthorized: crumb rejected"));
    }
}
