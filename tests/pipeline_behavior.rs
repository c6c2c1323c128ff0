//! End-to-end behavior of the company-name lookup pipeline.
//!
//! Market data calls go through a scripted HTTP client and the completion
//! service is scripted, so these tests exercise the production adapters,
//! resolver and assembler together.

#[path = "support/mod.rs"]
mod support;

use std::collections::HashMap;
use std::sync::Arc;

use stockfinder_core::{
    AggregationConfig, Aggregator, CompletionClient, Datum, HttpResponse, LookupError,
    ProviderData, ProviderId, QuoteField, ResolutionError, ResolutionMethod, SourceError,
    StockFinder, StockFinderConfig, TradingDate,
};

use support::{
    quote_data, sources, symbol, FakeSource, RouteHttpClient, ScriptedCompletion,
    YAHOO_CHART_NOT_FOUND,
};

fn config(overrides: &[(&str, &str)]) -> StockFinderConfig {
    let mut vars: HashMap<String, String> = [
        ("STOCKFINDER_OPENAI_API_KEY", "sk-test"),
        ("STOCKFINDER_ALPHAVANTAGE_API_KEY", "av-test"),
        ("STOCKFINDER_MAX_RETRIES", "0"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_owned(), value.to_owned()))
    .collect();
    for (key, value) in overrides {
        vars.insert((*key).to_owned(), (*value).to_owned());
    }

    StockFinderConfig::from_lookup(|key| vars.get(key).cloned()).expect("valid configuration")
}

fn finder(
    config: &StockFinderConfig,
    client: &Arc<RouteHttpClient>,
    completion: &Arc<ScriptedCompletion>,
) -> StockFinder {
    let completion: Arc<dyn CompletionClient> = completion.clone();
    StockFinder::from_config_with_completion(config, client.clone(), Some(completion))
        .expect("finder builds")
}

// =============================================================================
// Lookup: Happy path
// =============================================================================

#[tokio::test]
async fn when_looking_up_apple_the_response_carries_price_and_market_cap() {
    // Given: Both providers and the completion service answer
    let client = Arc::new(RouteHttpClient::new().with_yahoo().with_alphavantage());
    let completion = Arc::new(ScriptedCompletion::answering("Apple Inc. (AAPL)"));
    let finder = finder(&config(&[]), &client, &completion);

    // When: The user asks for "Apple"
    let response = finder.lookup("Apple").await.expect("lookup succeeds");

    // Then: The ticker is resolved and the key figures are present
    assert_eq!(response.ticker, symbol("AAPL"));
    assert_eq!(response.quote.current_price, Datum::Available(189.84));
    assert!(response.quote.market_cap.is_available());
    assert_eq!(response.sources.first(), Some(&ProviderId::Yahoo));
    assert!(response.errors.is_empty());

    let resolution = response.resolution.as_ref().expect("resolution recorded");
    assert_eq!(resolution.method, ResolutionMethod::Completion);
    assert_eq!(resolution.candidates.len(), 1);
    assert_eq!(completion.requests().len(), 1);
}

#[tokio::test]
async fn when_looking_up_apple_the_flat_map_attributes_every_value() {
    // Given: A full happy path
    let client = Arc::new(RouteHttpClient::new().with_yahoo().with_alphavantage());
    let completion = Arc::new(ScriptedCompletion::answering("Apple Inc. (AAPL)"));
    let finder = finder(&config(&[]), &client, &completion);

    // When: The response is flattened
    let flat = finder
        .lookup("Apple")
        .await
        .expect("lookup succeeds")
        .to_flat_map();

    // Then: Values and their sources sit side by side
    assert_eq!(flat.get("ticker").map(String::as_str), Some("AAPL"));
    assert_eq!(
        flat.get("quote.current_price").map(String::as_str),
        Some("189.84")
    );
    assert_eq!(
        flat.get("quote.current_price.source").map(String::as_str),
        Some("yahoo")
    );
    assert_eq!(
        flat.get("resolution.candidates.0").map(String::as_str),
        Some("Apple Inc. (AAPL)")
    );
    assert_eq!(flat.get("history.source").map(String::as_str), Some("yahoo"));
    assert!(flat.contains_key("history.2.close"));
    assert!(!flat.keys().any(|key| key.starts_with("errors.")));
}

#[tokio::test]
async fn when_yahoo_is_disabled_alphavantage_serves_the_lookup() {
    // Given: Only Alpha Vantage is active
    let client = Arc::new(RouteHttpClient::new().with_yahoo().with_alphavantage());
    let completion = Arc::new(ScriptedCompletion::answering("Apple Inc. (AAPL)"));
    let finder = finder(
        &config(&[("STOCKFINDER_YAHOO_ENABLED", "false")]),
        &client,
        &completion,
    );

    // When: Looking up
    let response = finder.lookup("Apple").await.expect("lookup succeeds");

    // Then: Only Alpha Vantage sections appear and Yahoo was never called
    assert_eq!(response.sources, vec![ProviderId::Alphavantage]);
    assert_eq!(response.quote.current_price, Datum::Available(185.64));
    assert!(response.history.is_none());
    assert!(response.option_expirations.is_none());
    assert_eq!(client.count("yahoo.com"), 0);
}

// =============================================================================
// Lookup: Boundary errors
// =============================================================================

#[tokio::test]
async fn when_company_name_is_empty_no_outbound_call_is_made() {
    // Given: A fully configured finder
    let client = Arc::new(RouteHttpClient::new().with_yahoo());
    let completion = Arc::new(ScriptedCompletion::answering("Apple Inc. (AAPL)"));
    let finder = finder(&config(&[]), &client, &completion);

    // When: The name is empty or blank
    for name in ["", "   "] {
        let error = finder.lookup(name).await.expect_err("must fail");

        // Then: It fails fast with no_company_name
        assert_eq!(error, LookupError::NoCompanyName);
        assert_eq!(error.code(), "no_company_name");
    }
    assert!(client.requests().is_empty());
    assert!(completion.requests().is_empty());
}

#[tokio::test]
async fn when_the_ticker_cannot_be_resolved_no_market_data_is_fetched() {
    // Given: A model that cannot name a company and input that is not a ticker
    let client = Arc::new(RouteHttpClient::new().with_yahoo());
    let completion = Arc::new(ScriptedCompletion::answering(
        "I could not find a matching company.",
    ));
    let finder = finder(&config(&[]), &client, &completion);

    // When: Looking up a multi-word name
    let error = finder
        .lookup("Nonexistent Widgets")
        .await
        .expect_err("must fail");

    // Then: The failure is ticker_not_resolved and data endpoints were untouched
    assert_eq!(error.code(), "ticker_not_resolved");
    assert!(matches!(
        error,
        LookupError::TickerNotResolved(ResolutionError::Unresolved { .. })
    ));
    assert_eq!(client.count("/v8/finance/chart/"), 0);
    assert_eq!(client.count("alphavantage"), 0);
}

#[tokio::test]
async fn when_no_provider_has_data_the_error_is_no_data_for_ticker() {
    // Given: The ticker resolves but both providers know nothing about it
    let client = Arc::new(
        RouteHttpClient::new()
            .route(
                "/v8/finance/chart/",
                Ok(HttpResponse::new(404, YAHOO_CHART_NOT_FOUND)),
            )
            .route(
                "function=GLOBAL_QUOTE&",
                Ok(HttpResponse::ok_json(r#"{"Global Quote":{}}"#)),
            ),
    );
    let completion = Arc::new(ScriptedCompletion::answering("Zzyzx Holdings (ZZZZ)"));
    let finder = finder(&config(&[]), &client, &completion);

    // When: Looking up
    let error = finder.lookup("Zzyzx").await.expect_err("must fail");

    // Then: The failure names the ticker and keeps per-provider errors
    assert_eq!(error.code(), "no_data_for_ticker");
    match &error {
        LookupError::NoDataForTicker { symbol: ticker, errors } => {
            assert_eq!(ticker, &symbol("ZZZZ"));
            let sources = errors.iter().map(|error| error.source).collect::<Vec<_>>();
            assert_eq!(
                sources,
                vec![Some(ProviderId::Yahoo), Some(ProviderId::Alphavantage)]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn when_no_completion_key_is_configured_explicit_tickers_still_work() {
    // Given: No completion credentials
    let client = Arc::new(RouteHttpClient::new().with_yahoo());
    let config = StockFinderConfig::from_lookup(|key| {
        (key == "STOCKFINDER_MAX_RETRIES").then(|| String::from("0"))
    })
    .expect("valid configuration");
    let finder = StockFinder::from_config(&config, client.clone()).expect("finder builds");

    // When: Resolving a name and aggregating an explicit ticker
    let resolve_error = finder.lookup("Apple").await.expect_err("no resolver");
    let response = finder.aggregate(symbol("AAPL")).await.expect("aggregates");

    // Then: Name lookup reports the missing resolver, ticker lookup succeeds
    assert!(!finder.has_resolver());
    assert_eq!(
        resolve_error,
        LookupError::TickerNotResolved(ResolutionError::NotConfigured)
    );
    assert_eq!(response.ticker, symbol("AAPL"));
    assert!(response.resolution.is_none());
}

#[test]
fn when_a_completion_key_is_configured_the_default_client_is_wired() {
    // Given: A completion key and a custom endpoint
    let client = Arc::new(RouteHttpClient::new().with_yahoo());
    let config = config(&[("STOCKFINDER_COMPLETION_BASE_URL", "https://llm.test/v1")]);

    // When: Building from configuration alone
    let finder = StockFinder::from_config(&config, client).expect("finder builds");

    // Then: Name lookup is available
    assert!(finder.has_resolver());
}

// =============================================================================
// Aggregate: Validation failures
// =============================================================================

#[tokio::test]
async fn when_provider_data_fails_validation_earlier_provider_errors_are_kept() {
    // Given: Yahoo is rate limited and Alpha Vantage returns unsorted expirations
    let yahoo = Arc::new(FakeSource::failing(
        ProviderId::Yahoo,
        SourceError::rate_limited("yahoo rate limited the request"),
    ));
    let expirations = ["2026-02-20", "2026-01-16"]
        .into_iter()
        .map(|date| TradingDate::parse(date).expect("valid date"))
        .collect();
    let alphavantage = Arc::new(FakeSource::new(
        ProviderId::Alphavantage,
        Ok(ProviderData {
            option_expirations: Some(expirations),
            ..quote_data(&[(QuoteField::CurrentPrice, 185.64)])
        }),
    ));
    let finder = StockFinder::new(
        None,
        Aggregator::new(sources(vec![yahoo, alphavantage])),
        AggregationConfig::default(),
    );

    // When: Aggregating an explicit ticker
    let error = finder.aggregate(symbol("AAPL")).await.expect_err("must fail");

    // Then: The failure is a provider error that still lists the Yahoo failure
    assert_eq!(error.code(), "provider_error");
    let errors = error.provider_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, Some(ProviderId::Yahoo));
    assert_eq!(errors[0].code, "source.rate_limited");
}
