//! Scripted fakes shared by the workspace behavior tests.
#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use stockfinder_core::data_source::FetchFuture;
use stockfinder_core::{
    CapabilitySet, CompletionClient, CompletionError, CompletionRequest, DataSource, FetchRequest,
    HttpClient, HttpError, HttpRequest, HttpResponse, NormalizedQuote, ProviderData, ProviderId,
    ProviderResult, QuoteField, SourceError, Symbol, SymbolProbe,
};

pub const YAHOO_CHART: &str = r#"{"chart":{"result":[{
    "meta":{"symbol":"AAPL","regularMarketPrice":189.84,"regularMarketDayHigh":190.3,
            "regularMarketDayLow":187.9,"fiftyTwoWeekHigh":199.62,"fiftyTwoWeekLow":164.08,
            "regularMarketVolume":50123456},
    "timestamp":[1704205800,1704292200,1704378600],
    "indicators":{"quote":[{
        "open":[187.15,184.22,182.15],"high":[188.44,185.88,183.09],
        "low":[183.89,183.43,180.88],"close":[185.64,184.25,181.91],
        "volume":[82488700,58414500,71983600]}]}}],"error":null}}"#;

pub const YAHOO_CHART_NOT_FOUND: &str =
    r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;

pub const YAHOO_SUMMARY: &str = r#"{"quoteSummary":{"result":[{
    "price":{"marketCap":{"raw":2950000000000.0,"fmt":"2.95T"},"longName":"Apple Inc."},
    "summaryDetail":{"trailingPE":{"raw":29.4},"previousClose":{"raw":185.64}},
    "defaultKeyStatistics":{"trailingEps":{"raw":6.43},"netIncomeToCommon":{"raw":96995000000}},
    "financialData":{"totalRevenue":{"raw":383285000000}},
    "assetProfile":{"sector":"Technology","industry":"Consumer Electronics",
                    "longBusinessSummary":"Apple designs smartphones."}}],"error":null}}"#;

pub const YAHOO_OPTIONS: &str =
    r#"{"optionChain":{"result":[{"expirationDates":[1705017600,1705622400]}],"error":null}}"#;

pub const AV_GLOBAL_QUOTE: &str = r#"{"Global Quote":{"01. symbol":"AAPL","02. open":"187.1500",
    "03. high":"188.4400","04. low":"183.8900","05. price":"185.6400",
    "06. volume":"82488700","07. latest trading day":"2024-01-02",
    "08. previous close":"192.5300","09. change":"-6.8900"}}"#;

pub const AV_OVERVIEW: &str = r#"{"Symbol":"AAPL","Name":"Apple Inc","Sector":"TECHNOLOGY",
    "Industry":"ELECTRONIC COMPUTERS","Description":"Apple Inc. designs smartphones.",
    "MarketCapitalization":"2870000000000","PERatio":"28.9","EPS":"6.42",
    "RevenueTTM":"383285000000","52WeekHigh":"199.62","52WeekLow":"164.08"}"#;

pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

/// Answers by the first URL fragment that matches and records every request.
/// Unmatched URLs get a 404.
pub struct RouteHttpClient {
    routes: Vec<(String, Result<HttpResponse, HttpError>)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RouteHttpClient {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn route(
        mut self,
        fragment: impl Into<String>,
        response: Result<HttpResponse, HttpError>,
    ) -> Self {
        self.routes.push((fragment.into(), response));
        self
    }

    /// Full Yahoo happy path: chart, cookie, crumb, quoteSummary, options.
    pub fn with_yahoo(self) -> Self {
        self.route("/v8/finance/chart/", Ok(HttpResponse::ok_json(YAHOO_CHART)))
            .route(
                "fc.yahoo.com",
                Ok(HttpResponse::new(404, "").with_cookie("A3=session")),
            )
            .route("getcrumb", Ok(HttpResponse::ok_json("crumb-123")))
            .route("quoteSummary", Ok(HttpResponse::ok_json(YAHOO_SUMMARY)))
            .route("/v7/finance/options/", Ok(HttpResponse::ok_json(YAHOO_OPTIONS)))
    }

    pub fn with_alphavantage(self) -> Self {
        self.route(
            "function=GLOBAL_QUOTE&",
            Ok(HttpResponse::ok_json(AV_GLOBAL_QUOTE)),
        )
        .route("function=OVERVIEW&", Ok(HttpResponse::ok_json(AV_OVERVIEW)))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    pub fn count(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url.contains(fragment))
            .count()
    }
}

impl HttpClient for RouteHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self
            .routes
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Ok(HttpResponse::new(404, "")));
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        Box::pin(async move { response })
    }
}

/// In-memory adapter returning a fixed outcome.
pub struct FakeSource {
    id: ProviderId,
    capabilities: CapabilitySet,
    outcome: Result<ProviderData, SourceError>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(id: ProviderId, outcome: Result<ProviderData, SourceError>) -> Self {
        Self {
            id,
            capabilities: CapabilitySet::full(),
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn quote(id: ProviderId, fields: &[(QuoteField, f64)]) -> Self {
        Self::new(id, Ok(quote_data(fields)))
    }

    pub fn failing(id: ProviderId, error: SourceError) -> Self {
        Self::new(id, Err(error))
    }

    pub fn empty(id: ProviderId) -> Self {
        Self::new(id, Ok(ProviderData::default()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataSource for FakeSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn fetch<'a>(&'a self, _request: &'a FetchRequest) -> FetchFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = ProviderResult::new(self.id, self.outcome.clone());
        Box::pin(async move { result })
    }
}

pub fn quote_data(fields: &[(QuoteField, f64)]) -> ProviderData {
    let mut quote = NormalizedQuote::default();
    for (field, value) in fields {
        quote.set_number(*field, *value);
    }
    ProviderData {
        quote,
        ..ProviderData::default()
    }
}

pub fn sources(list: Vec<Arc<FakeSource>>) -> Vec<Arc<dyn DataSource>> {
    list.into_iter()
        .map(|source| source as Arc<dyn DataSource>)
        .collect()
}

/// Completion fake replaying one canned answer and counting calls.
pub struct ScriptedCompletion {
    answer: Result<String, CompletionError>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn answering(text: &str) -> Self {
        Self::new(Ok(text.to_owned()))
    }

    pub fn failing(error: CompletionError) -> Self {
        Self::new(Err(error))
    }

    fn new(answer: Result<String, CompletionError>) -> Self {
        Self {
            answer,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }
}

impl CompletionClient for ScriptedCompletion {
    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        let answer = self.answer.clone();
        Box::pin(async move { answer })
    }
}

/// Probe fake: knows a fixed set of tickers.
pub struct KnownTickers {
    known: Vec<&'static str>,
    calls: AtomicUsize,
}

impl KnownTickers {
    pub fn new(known: &[&'static str]) -> Self {
        Self {
            known: known.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SymbolProbe for KnownTickers {
    fn probe<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<bool, SourceError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let known = self.known.iter().any(|known| *known == symbol.as_str());
        Box::pin(async move { Ok(known) })
    }
}
