#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use stockfinder_core::{
    AlphaVantageAdapter, DataSource, Datum, FetchRequest, HttpError, HttpResponse, ProviderData,
    ProviderId, RetryConfig, SourceError, SourceErrorKind, SymbolProbe, YahooAdapter,
};

use support::{symbol, RouteHttpClient, YAHOO_CHART_NOT_FOUND};

fn yahoo(client: &Arc<RouteHttpClient>) -> YahooAdapter {
    YahooAdapter::new(client.clone()).with_retry(RetryConfig::no_retry())
}

fn alphavantage(client: &Arc<RouteHttpClient>) -> AlphaVantageAdapter {
    AlphaVantageAdapter::new(client.clone(), "demo-key").with_retry(RetryConfig::no_retry())
}

fn expect_data(source: &dyn DataSource, outcome: Result<ProviderData, SourceError>) -> ProviderData {
    outcome.unwrap_or_else(|error| {
        panic!("provider '{}' fetch failed: {error}", source.id().as_str())
    })
}

#[tokio::test]
async fn yahoo_fetch_returns_every_requested_section() {
    let client = Arc::new(RouteHttpClient::new().with_yahoo());
    let adapter = yahoo(&client);
    let request = FetchRequest::new(symbol("AAPL"));

    let result = adapter.fetch(&request).await;
    assert_eq!(result.provider, ProviderId::Yahoo);
    let data = expect_data(&adapter, result.outcome);

    assert_eq!(data.quote.current_price, Datum::Available(189.84));
    assert_eq!(data.quote.market_cap, Datum::Available(2_950_000_000_000.0));

    let history = data.history.as_ref().expect("history section");
    assert_eq!(history.bars.len(), 3);
    assert!(history.validate_order().is_ok());

    let fundamentals = data.fundamentals.as_ref().expect("fundamentals section");
    assert_eq!(fundamentals.revenue, Datum::Available(383_285_000_000.0));
    let profile = data.profile.as_ref().expect("profile section");
    assert_eq!(profile.name, Datum::Available(String::from("Apple Inc.")));
    assert_eq!(
        data.option_expirations.as_ref().map(Vec::len),
        Some(2),
        "option expirations"
    );
    assert!(data.partial_errors.is_empty());
}

#[tokio::test]
async fn alphavantage_fetch_fills_quote_fundamentals_and_profile() {
    let client = Arc::new(RouteHttpClient::new().with_alphavantage());
    let adapter = alphavantage(&client);
    let request = FetchRequest::new(symbol("AAPL"));

    let data = expect_data(&adapter, adapter.fetch(&request).await.outcome);

    assert_eq!(data.quote.current_price, Datum::Available(185.64));
    assert_eq!(data.quote.market_cap, Datum::Available(2_870_000_000_000.0));
    assert_eq!(
        data.fundamentals.as_ref().map(|snapshot| snapshot.pe_ratio),
        Some(Datum::Available(28.9))
    );
    assert_eq!(
        data.profile.as_ref().map(|profile| profile.sector.clone()),
        Some(Datum::Available(String::from("TECHNOLOGY")))
    );
    assert!(client.requests().iter().all(|request| request.url.contains("apikey=demo-key")));
}

#[tokio::test]
async fn returned_sections_agree_with_declared_capabilities() {
    let client = Arc::new(RouteHttpClient::new().with_yahoo().with_alphavantage());
    let sources: Vec<Arc<dyn DataSource>> =
        vec![Arc::new(yahoo(&client)), Arc::new(alphavantage(&client))];
    let request = FetchRequest::new(symbol("AAPL"));

    for source in sources {
        let capabilities = source.capabilities();
        let data = expect_data(source.as_ref(), source.fetch(&request).await.outcome);
        let id = source.id();

        assert!(capabilities.quote, "provider '{id}': quote capability");
        assert!(!data.quote.is_empty(), "provider '{id}': quote");
        assert_eq!(data.history.is_some(), capabilities.history, "provider '{id}': history");
        assert_eq!(
            data.option_expirations.is_some(),
            capabilities.options,
            "provider '{id}': options"
        );
        if !capabilities.fundamentals {
            assert!(data.fundamentals.is_none(), "provider '{id}': fundamentals");
        }
    }
}

#[tokio::test]
async fn unauthorized_status_is_not_retried() {
    let client = Arc::new(
        RouteHttpClient::new().route("/v8/finance/chart/", Ok(HttpResponse::new(401, ""))),
    );
    let adapter = YahooAdapter::new(client.clone())
        .with_retry(RetryConfig::fixed(Duration::ZERO, 1));

    let error = adapter
        .fetch(&FetchRequest::quote_only(symbol("AAPL")))
        .await
        .outcome
        .expect_err("401 must fail");

    assert_eq!(error.kind(), SourceErrorKind::Unauthorized);
    assert!(!error.retryable());
    assert_eq!(client.count("/v8/finance/chart/"), 1);
}

#[tokio::test]
async fn server_error_is_retried_once_then_reported() {
    let client = Arc::new(
        RouteHttpClient::new().route("/v8/finance/chart/", Ok(HttpResponse::new(503, ""))),
    );
    let adapter = YahooAdapter::new(client.clone())
        .with_retry(RetryConfig::fixed(Duration::ZERO, 1));

    let error = adapter
        .fetch(&FetchRequest::quote_only(symbol("AAPL")))
        .await
        .outcome
        .expect_err("503 must fail");

    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert!(error.retryable());
    assert_eq!(error.code(), "source.unavailable");
    assert_eq!(client.count("/v8/finance/chart/"), 2);
}

#[tokio::test]
async fn transport_failure_is_an_error_value() {
    let client = Arc::new(RouteHttpClient::new().route(
        "function=GLOBAL_QUOTE&",
        Err(HttpError::timeout("operation timed out")),
    ));
    let adapter = alphavantage(&client);

    let error = adapter
        .fetch(&FetchRequest::new(symbol("AAPL")))
        .await
        .outcome
        .expect_err("timeout must fail");

    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert!(error.retryable());
    assert!(error.message().contains("operation timed out"));
}

#[tokio::test]
async fn empty_payloads_are_reported_as_not_found() {
    let yahoo_client = Arc::new(
        RouteHttpClient::new()
            .route("/v8/finance/chart/", Ok(HttpResponse::ok_json(YAHOO_CHART_NOT_FOUND))),
    );
    let av_client = Arc::new(RouteHttpClient::new().route(
        "function=GLOBAL_QUOTE&",
        Ok(HttpResponse::ok_json(r#"{"Global Quote":{}}"#)),
    ));
    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(yahoo(&yahoo_client)),
        Arc::new(alphavantage(&av_client)),
    ];
    let request = FetchRequest::new(symbol("ZZZZ"));

    for source in sources {
        let error = source
            .fetch(&request)
            .await
            .outcome
            .expect_err("empty payload must fail");
        assert_eq!(
            error.kind(),
            SourceErrorKind::NotFound,
            "provider '{}'",
            source.id()
        );
    }
}

#[tokio::test]
async fn alphavantage_throttle_notice_maps_to_rate_limited() {
    let client = Arc::new(RouteHttpClient::new().route(
        "function=GLOBAL_QUOTE&",
        Ok(HttpResponse::ok_json(
            r#"{"Note":"Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
        )),
    ));

    let error = alphavantage(&client)
        .fetch(&FetchRequest::new(symbol("AAPL")))
        .await
        .outcome
        .expect_err("throttled");

    assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    assert_eq!(client.count("function=OVERVIEW&"), 0);
}

#[tokio::test]
async fn yahoo_acquires_a_fresh_crumb_on_every_fetch() {
    let client = Arc::new(RouteHttpClient::new().with_yahoo());
    let adapter = yahoo(&client);
    let request = FetchRequest::new(symbol("AAPL"));

    let first = adapter.fetch(&request).await;
    let second = adapter.fetch(&request).await;

    assert_eq!(first, second);
    assert_eq!(client.count("fc.yahoo.com"), 2);
    assert_eq!(client.count("getcrumb"), 2);
}

#[tokio::test]
async fn yahoo_crumb_failure_keeps_chart_data_and_records_partial_error() {
    let client = Arc::new(
        RouteHttpClient::new()
            .route("getcrumb", Ok(HttpResponse::new(401, "")))
            .with_yahoo(),
    );
    let adapter = yahoo(&client);

    let data = expect_data(
        &adapter,
        adapter.fetch(&FetchRequest::new(symbol("AAPL"))).await.outcome,
    );

    assert_eq!(data.quote.current_price, Datum::Available(189.84));
    assert_eq!(data.quote.market_cap, Datum::Unavailable);
    assert!(data.fundamentals.is_none());
    assert_eq!(data.partial_errors.len(), 1);
    assert_eq!(data.partial_errors[0].code(), "source.unauthorized");
    assert_eq!(client.count("quoteSummary"), 0);
}

#[tokio::test]
async fn yahoo_probe_distinguishes_unknown_symbols_from_failures() {
    let known = Arc::new(RouteHttpClient::new().with_yahoo());
    let unknown = Arc::new(RouteHttpClient::new().route(
        "/v8/finance/chart/",
        Ok(HttpResponse::new(404, YAHOO_CHART_NOT_FOUND)),
    ));
    let broken = Arc::new(
        RouteHttpClient::new().route("/v8/finance/chart/", Ok(HttpResponse::new(500, ""))),
    );
    let ticker = symbol("AAPL");

    assert_eq!(yahoo(&known).probe(&ticker).await, Ok(true));
    assert_eq!(yahoo(&unknown).probe(&ticker).await, Ok(false));
    let error = yahoo(&broken)
        .probe(&ticker)
        .await
        .expect_err("server error is not a verdict");
    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert!(known.requests().iter().all(|request| request.url.contains("range=1d")));
}
