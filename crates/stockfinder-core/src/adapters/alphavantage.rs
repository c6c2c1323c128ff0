use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use super::mapping::{
    map_fundamentals, map_profile, map_quote, FundamentalField, Mapping, ProfileField,
};
use crate::data_source::{
    CapabilitySet, DataSource, FetchFuture, FetchRequest, ProviderData, ProviderResult,
    SourceError,
};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::{ProviderId, QuoteField, Symbol};

const QUERY_URL: &str = "https://www.alphavantage.co/query";

const GLOBAL_QUOTE_FIELDS: &[Mapping<QuoteField>] = &[
    Mapping::new(QuoteField::CurrentPrice, &["/05. price"]),
    Mapping::new(QuoteField::DayHigh, &["/03. high"]),
    Mapping::new(QuoteField::DayLow, &["/04. low"]),
    Mapping::new(QuoteField::PreviousClose, &["/08. previous close"]),
    Mapping::new(QuoteField::Volume, &["/06. volume"]),
];

const OVERVIEW_QUOTE_FIELDS: &[Mapping<QuoteField>] = &[
    Mapping::new(QuoteField::FiftyTwoWeekHigh, &["/52WeekHigh"]),
    Mapping::new(QuoteField::FiftyTwoWeekLow, &["/52WeekLow"]),
    Mapping::new(QuoteField::MarketCap, &["/MarketCapitalization"]),
];

// OVERVIEW carries no net income figure.
const FUNDAMENTAL_FIELDS: &[Mapping<FundamentalField>] = &[
    Mapping::new(FundamentalField::Revenue, &["/RevenueTTM"]),
    Mapping::new(FundamentalField::Eps, &["/EPS", "/DilutedEPSTTM"]),
    Mapping::new(FundamentalField::MarketCap, &["/MarketCapitalization"]),
    Mapping::new(FundamentalField::PeRatio, &["/PERatio", "/TrailingPE"]),
];

const PROFILE_FIELDS: &[Mapping<ProfileField>] = &[
    Mapping::new(ProfileField::Name, &["/Name"]),
    Mapping::new(ProfileField::Sector, &["/Sector"]),
    Mapping::new(ProfileField::Industry, &["/Industry"]),
    Mapping::new(ProfileField::Description, &["/Description"]),
];

/// Alpha Vantage adapter: `GLOBAL_QUOTE` for the quote, `OVERVIEW` for
/// fundamentals, profile, market cap and the 52-week range.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            retry: RetryConfig::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn endpoint(&self, function: &str, symbol: &Symbol) -> String {
        format!(
            "{QUERY_URL}?function={function}&symbol={}&apikey={}",
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(&self.api_key)
        )
    }

    async fn query(&self, function: &str, symbol: &Symbol) -> Result<Map<String, Value>, SourceError> {
        let request = HttpRequest::get(self.endpoint(function, symbol)).with_timeout_ms(self.timeout_ms);
        let context = format!("alphavantage {function}");

        let response = execute_with_retry(self.http_client.as_ref(), request, &self.retry)
            .await
            .map_err(|e| SourceError::from_http(&format!("{context} transport error"), &e))?;
        if !response.is_success() {
            return Err(SourceError::from_status(&context, response.status));
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| SourceError::malformed(format!("failed to parse {context}: {e}")))?;
        let Value::Object(object) = payload else {
            return Err(SourceError::malformed(format!("{context} did not return an object")));
        };

        reported_error(&object).map_or(Ok(object), Err)
    }

    async fn fetch_all(&self, request: &FetchRequest) -> Result<ProviderData, SourceError> {
        let symbol = &request.symbol;
        let global = self.query("GLOBAL_QUOTE", symbol).await?;
        let quote_object = global
            .get("Global Quote")
            .filter(|value| value.as_object().is_some_and(|object| !object.is_empty()))
            .ok_or_else(|| {
                SourceError::not_found(format!("alphavantage has no quote for {symbol}"))
            })?;

        let mut data = ProviderData {
            quote: map_quote(quote_object, GLOBAL_QUOTE_FIELDS),
            ..ProviderData::default()
        };

        // Requests are sequential: the free tier throttles bursts.
        match self.query("OVERVIEW", symbol).await {
            Ok(overview) if overview.is_empty() => {
                data.partial_errors.push(SourceError::not_found(format!(
                    "alphavantage has no overview for {symbol}"
                )));
            }
            Ok(overview) => {
                let overview = Value::Object(overview);
                data.quote.fill_from(&map_quote(&overview, OVERVIEW_QUOTE_FIELDS));
                if request.fundamentals {
                    data.fundamentals = Some(map_fundamentals(&overview, FUNDAMENTAL_FIELDS));
                }
                if request.profile {
                    data.profile = Some(map_profile(&overview, PROFILE_FIELDS));
                }
            }
            Err(error) => {
                warn!(provider = "alphavantage", %error, "OVERVIEW failed");
                data.partial_errors.push(error);
            }
        }

        Ok(data)
    }
}

impl DataSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, false, true, true, false)
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a> {
        Box::pin(async move { ProviderResult::new(self.id(), self.fetch_all(request).await) })
    }
}

/// Alpha Vantage answers 200 for every failure and describes it in the body.
fn reported_error(object: &Map<String, Value>) -> Option<SourceError> {
    if let Some(message) = object.get("Error Message").and_then(Value::as_str) {
        return Some(SourceError::invalid_request(format!(
            "alphavantage error: {message}"
        )));
    }

    let notice = object
        .get("Note")
        .or_else(|| object.get("Information"))
        .and_then(Value::as_str)?;
    let lowered = notice.to_ascii_lowercase();
    if lowered.contains("apikey") || (lowered.contains("api key") && lowered.contains("invalid")) {
        Some(SourceError::unauthorized(format!("alphavantage rejected the key: {notice}")))
    } else {
        Some(SourceError::rate_limited(format!("alphavantage throttled: {notice}")))
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::Datum;

    const GLOBAL_QUOTE: &str = r#"{"Global Quote":{"01. symbol":"IBM","02. open":"166.0000",
        "03. high":"168.2500","04. low":"165.5000","05. price":"167.4200",
        "06. volume":"4123456","07. latest trading day":"2024-03-15",
        "08. previous close":"166.1100","09. change":"1.3100"}}"#;

    const OVERVIEW: &str = r#"{"Symbol":"IBM","Name":"International Business Machines",
        "Sector":"TECHNOLOGY","Industry":"COMPUTER & OFFICE EQUIPMENT","Description":"IBM.",
        "MarketCapitalization":"153000000000","PERatio":"20.5","EPS":"8.14",
        "RevenueTTM":"61860000000","52WeekHigh":"199.18","52WeekLow":"120.55"}"#;

    #[derive(Debug)]
    struct RecordingHttpClient {
        responses: Vec<(&'static str, Result<HttpResponse, HttpError>)>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn new(responses: Vec<(&'static str, Result<HttpResponse, HttpError>)>) -> Self {
            Self {
                responses,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let response = self
                .responses
                .iter()
                .find(|(function, _)| request.url.contains(&format!("function={function}&")))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| Ok(HttpResponse::ok_json("{}")));
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            Box::pin(async move { response })
        }
    }

    fn adapter(client: Arc<RecordingHttpClient>) -> AlphaVantageAdapter {
        AlphaVantageAdapter::new(client, "alpha-key").with_retry(RetryConfig::no_retry())
    }

    fn ibm() -> FetchRequest {
        FetchRequest::new(Symbol::parse("IBM").expect("valid symbol"))
    }

    #[tokio::test]
    async fn merges_global_quote_and_overview() {
        let client = Arc::new(RecordingHttpClient::new(vec![
            ("GLOBAL_QUOTE", Ok(HttpResponse::ok_json(GLOBAL_QUOTE))),
            ("OVERVIEW", Ok(HttpResponse::ok_json(OVERVIEW))),
        ]));

        let result = adapter(client.clone()).fetch(&ibm()).await;
        let data = result.outcome.expect("fetch should succeed");

        assert_eq!(data.quote.current_price, Datum::Available(167.42));
        assert_eq!(data.quote.volume, Datum::Available(4_123_456));
        assert_eq!(data.quote.market_cap, Datum::Available(153_000_000_000.0));
        assert_eq!(data.quote.fifty_two_week_low, Datum::Available(120.55));

        let fundamentals = data.fundamentals.expect("fundamentals requested");
        assert_eq!(fundamentals.eps, Datum::Available(8.14));
        assert_eq!(fundamentals.net_income, Datum::Unavailable);
        assert!(data.history.is_none());
        assert!(data.option_expirations.is_none());

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.contains("apikey=alpha-key"));
    }

    #[tokio::test]
    async fn empty_global_quote_is_not_found() {
        let client = Arc::new(RecordingHttpClient::new(vec![(
            "GLOBAL_QUOTE",
            Ok(HttpResponse::ok_json(r#"{"Global Quote":{}}"#)),
        )]));

        let error = adapter(client).fetch(&ibm()).await.outcome.expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::NotFound);
    }

    #[tokio::test]
    async fn throttle_note_is_rate_limited() {
        let client = Arc::new(RecordingHttpClient::new(vec![(
            "GLOBAL_QUOTE",
            Ok(HttpResponse::ok_json(
                r#"{"Note":"Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
            )),
        )]));

        let error = adapter(client).fetch(&ibm()).await.outcome.expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn overview_failure_keeps_quote_with_partial_error() {
        let client = Arc::new(RecordingHttpClient::new(vec![
            ("GLOBAL_QUOTE", Ok(HttpResponse::ok_json(GLOBAL_QUOTE))),
            ("OVERVIEW", Ok(HttpResponse::new(500, "oops"))),
        ]));

        let data = adapter(client).fetch(&ibm()).await.outcome.expect("quote survives");

        assert_eq!(data.quote.current_price, Datum::Available(167.42));
        assert_eq!(data.quote.market_cap, Datum::Unavailable);
        assert_eq!(data.partial_errors.len(), 1);
        assert_eq!(data.partial_errors[0].kind(), SourceErrorKind::Unavailable);
    }

    #[test]
    fn error_message_body_is_invalid_request() {
        let object = serde_json::from_str::<Map<String, Value>>(
            r#"{"Error Message":"Invalid API call."}"#,
        )
        .expect("valid json");

        let error = reported_error(&object).expect("error detected");
        assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
    }
}
