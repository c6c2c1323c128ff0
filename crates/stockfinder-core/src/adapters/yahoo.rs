use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::mapping::{
    map_fundamentals, map_profile, map_quote, FundamentalField, Mapping, ProfileField,
};
use crate::data_source::{
    CapabilitySet, DataSource, FetchFuture, FetchRequest, HistoryRequest, ProviderData,
    ProviderResult, SourceError, SourceErrorKind, SymbolProbe,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, DEFAULT_TIMEOUT_MS};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::{
    DailyBar, HistoricalSeries, NormalizedQuote, ProviderId, QuoteField, Symbol, TradingDate,
};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const OPTIONS_URL: &str = "https://query2.finance.yahoo.com/v7/finance/options";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const REFERER: &str = "https://finance.yahoo.com/";
const SUMMARY_MODULES: &str =
    "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile,incomeStatementHistory";

const CHART_QUOTE_FIELDS: &[Mapping<QuoteField>] = &[
    Mapping::new(QuoteField::CurrentPrice, &["/regularMarketPrice"]),
    Mapping::new(QuoteField::DayHigh, &["/regularMarketDayHigh"]),
    Mapping::new(QuoteField::DayLow, &["/regularMarketDayLow"]),
    Mapping::new(
        QuoteField::PreviousClose,
        &["/previousClose", "/regularMarketPreviousClose"],
    ),
    Mapping::new(QuoteField::FiftyTwoWeekHigh, &["/fiftyTwoWeekHigh"]),
    Mapping::new(QuoteField::FiftyTwoWeekLow, &["/fiftyTwoWeekLow"]),
    Mapping::new(QuoteField::Volume, &["/regularMarketVolume"]),
];

const SUMMARY_QUOTE_FIELDS: &[Mapping<QuoteField>] = &[
    Mapping::new(
        QuoteField::CurrentPrice,
        &["/price/regularMarketPrice", "/financialData/currentPrice"],
    ),
    Mapping::new(
        QuoteField::DayHigh,
        &["/price/regularMarketDayHigh", "/summaryDetail/dayHigh"],
    ),
    Mapping::new(
        QuoteField::DayLow,
        &["/price/regularMarketDayLow", "/summaryDetail/dayLow"],
    ),
    Mapping::new(
        QuoteField::PreviousClose,
        &["/summaryDetail/previousClose", "/price/regularMarketPreviousClose"],
    ),
    Mapping::new(QuoteField::FiftyTwoWeekHigh, &["/summaryDetail/fiftyTwoWeekHigh"]),
    Mapping::new(QuoteField::FiftyTwoWeekLow, &["/summaryDetail/fiftyTwoWeekLow"]),
    Mapping::new(
        QuoteField::MarketCap,
        &["/price/marketCap", "/summaryDetail/marketCap"],
    ),
    Mapping::new(
        QuoteField::Volume,
        &["/price/regularMarketVolume", "/summaryDetail/volume"],
    ),
];

const FUNDAMENTAL_FIELDS: &[Mapping<FundamentalField>] = &[
    Mapping::new(
        FundamentalField::Revenue,
        &[
            "/financialData/totalRevenue",
            "/incomeStatementHistory/incomeStatementHistory/0/totalRevenue",
        ],
    ),
    Mapping::new(
        FundamentalField::NetIncome,
        &[
            "/defaultKeyStatistics/netIncomeToCommon",
            "/incomeStatementHistory/incomeStatementHistory/0/netIncome",
        ],
    ),
    Mapping::new(FundamentalField::Eps, &["/defaultKeyStatistics/trailingEps"]),
    Mapping::new(
        FundamentalField::MarketCap,
        &["/price/marketCap", "/summaryDetail/marketCap"],
    ),
    Mapping::new(FundamentalField::PeRatio, &["/summaryDetail/trailingPE"]),
];

const PROFILE_FIELDS: &[Mapping<ProfileField>] = &[
    Mapping::new(ProfileField::Name, &["/price/longName", "/price/shortName"]),
    Mapping::new(ProfileField::Sector, &["/assetProfile/sector"]),
    Mapping::new(ProfileField::Industry, &["/assetProfile/industry"]),
    Mapping::new(ProfileField::Description, &["/assetProfile/longBusinessSummary"]),
];

/// Yahoo Finance adapter: chart, quoteSummary and options endpoints.
///
/// Holds no session between calls. Authenticated endpoints acquire a fresh
/// cookie and crumb inside each [`DataSource::fetch`].
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
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

    async fn get(
        &self,
        context: &str,
        url: String,
        auth: &HttpAuth,
    ) -> Result<HttpResponse, SourceError> {
        let request = HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_auth(auth)
            .with_timeout_ms(self.timeout_ms);

        execute_with_retry(self.http_client.as_ref(), request, &self.retry)
            .await
            .map_err(|e| SourceError::from_http(&format!("yahoo {context} transport error"), &e))
    }

    async fn get_json(
        &self,
        context: &str,
        url: String,
        auth: &HttpAuth,
    ) -> Result<String, SourceError> {
        let response = self.get(context, url, auth).await?;
        if !response.is_success() {
            return Err(SourceError::from_status(&format!("yahoo {context}"), response.status));
        }
        Ok(response.body)
    }

    async fn fetch_all(&self, request: &FetchRequest) -> Result<ProviderData, SourceError> {
        let symbol = &request.symbol;
        let chart = self.fetch_chart(symbol, chart_range(request.history)).await?;

        let mut data = ProviderData {
            quote: chart.quote,
            history: request
                .history
                .map(|history| HistoricalSeries::from_bars(symbol.clone(), history.mode, history.order, chart.bars)),
            ..ProviderData::default()
        };

        let session = match self.open_session().await {
            Ok(session) => Some(session),
            Err(error) => {
                warn!(provider = "yahoo", %error, "crumb handshake failed");
                data.partial_errors.push(error);
                None
            }
        };

        if let Some(session) = &session {
            match self.fetch_summary(symbol, session).await {
                Ok(summary) => {
                    data.quote.fill_from(&map_quote(&summary, SUMMARY_QUOTE_FIELDS));
                    if request.fundamentals {
                        data.fundamentals = Some(map_fundamentals(&summary, FUNDAMENTAL_FIELDS));
                    }
                    if request.profile {
                        data.profile = Some(map_profile(&summary, PROFILE_FIELDS));
                    }
                }
                Err(error) => {
                    warn!(provider = "yahoo", %error, "quoteSummary failed");
                    data.partial_errors.push(error);
                }
            }

            if request.options {
                match self.fetch_option_expirations(symbol, session).await {
                    Ok(dates) => data.option_expirations = Some(dates),
                    Err(error) => {
                        warn!(provider = "yahoo", %error, "options lookup failed");
                        data.partial_errors.push(error);
                    }
                }
            }
        }

        Ok(data)
    }

    async fn fetch_chart(&self, symbol: &Symbol, range: &str) -> Result<ChartData, SourceError> {
        let url = format!(
            "{CHART_URL}/{}?range={range}&interval=1d&events=div%2Csplit",
            urlencoding::encode(symbol.as_str())
        );
        let response = self.get("chart", url, &HttpAuth::None).await?;

        // Yahoo reports unknown tickers as 404 with a chart.error body.
        if response.status == 404 {
            return Err(SourceError::not_found(format!(
                "yahoo has no chart data for {symbol}"
            )));
        }
        if !response.is_success() {
            return Err(SourceError::from_status("yahoo chart", response.status));
        }

        parse_chart(symbol, &response.body)
    }

    async fn open_session(&self) -> Result<YahooSession, SourceError> {
        // fc.yahoo.com answers with a non-2xx status but still sets the session cookie.
        let cookie = self
            .get("cookie", String::from(COOKIE_URL), &HttpAuth::None)
            .await?
            .cookie_header();
        let auth = cookie.map_or(HttpAuth::None, HttpAuth::Cookie);

        let mut last_error = SourceError::unavailable("yahoo crumb endpoints returned no crumb");
        for url in CRUMB_URLS {
            let response = match self.get("crumb", String::from(url), &auth).await {
                Ok(response) => response,
                Err(error) => {
                    last_error = error;
                    continue;
                }
            };

            if response.status == 429 {
                return Err(SourceError::rate_limited(
                    "yahoo rate limited the crumb handshake",
                ));
            }

            let crumb = response.body.trim();
            if response.is_success() && is_plausible_crumb(crumb) {
                debug!(provider = "yahoo", "acquired crumb");
                return Ok(YahooSession {
                    auth: auth.clone(),
                    crumb: crumb.to_owned(),
                });
            }
            last_error = SourceError::from_status("yahoo crumb", response.status);
        }

        Err(last_error)
    }

    async fn fetch_summary(
        &self,
        symbol: &Symbol,
        session: &YahooSession,
    ) -> Result<Value, SourceError> {
        let url = format!(
            "{QUOTE_SUMMARY_URL}/{}?modules={}&crumb={}",
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(SUMMARY_MODULES),
            urlencoding::encode(&session.crumb)
        );
        let body = self.get_json("quoteSummary", url, &session.auth).await?;
        parse_summary(&body)
    }

    async fn fetch_option_expirations(
        &self,
        symbol: &Symbol,
        session: &YahooSession,
    ) -> Result<Vec<TradingDate>, SourceError> {
        let url = format!(
            "{OPTIONS_URL}/{}?crumb={}",
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(&session.crumb)
        );
        let body = self.get_json("options", url, &session.auth).await?;
        parse_option_expirations(&body)
    }
}

impl DataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a> {
        Box::pin(async move { ProviderResult::new(self.id(), self.fetch_all(request).await) })
    }
}

impl SymbolProbe for YahooAdapter {
    /// Requests a one-day chart; `Ok(false)` when Yahoo does not know the symbol.
    fn probe<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<bool, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            match self.fetch_chart(symbol, "1d").await {
                Ok(chart) => Ok(!chart.bars.is_empty() || !chart.quote.is_empty()),
                Err(error) if error.kind() == SourceErrorKind::NotFound => Ok(false),
                Err(error) => Err(error),
            }
        })
    }
}

#[derive(Debug, Clone)]
struct YahooSession {
    auth: HttpAuth,
    crumb: String,
}

#[derive(Debug)]
struct ChartData {
    quote: NormalizedQuote,
    bars: Vec<DailyBar>,
}

fn chart_range(history: Option<HistoryRequest>) -> &'static str {
    match history.map(|history| history.mode.lookback_days()) {
        Some(days) if days > 5 => "1mo",
        _ => "5d",
    }
}

fn is_plausible_crumb(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && !value.contains('<')
        && !value.chars().any(char::is_whitespace)
}

fn parse_chart(symbol: &Symbol, body: &str) -> Result<ChartData, SourceError> {
    let response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = response.chart.error {
        return Err(error.into_source_error(symbol));
    }

    let result = response
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::not_found(format!("yahoo has no chart data for {symbol}")))?;

    let bars = chart_bars(&result);
    if bars.is_empty() {
        return Err(SourceError::not_found(format!(
            "yahoo returned an empty price series for {symbol}"
        )));
    }

    let mut quote = map_quote(&result.meta, CHART_QUOTE_FIELDS);
    if let Some(latest) = bars.last() {
        let mut from_bar = NormalizedQuote::default();
        from_bar.set_number(QuoteField::CurrentPrice, latest.close);
        from_bar.set_number(QuoteField::DayHigh, latest.high);
        from_bar.set_number(QuoteField::DayLow, latest.low);
        if let Some(volume) = latest.volume {
            from_bar.set_number(QuoteField::Volume, volume as f64);
        }
        if let Some(previous) = bars.len().checked_sub(2).and_then(|index| bars.get(index)) {
            from_bar.set_number(QuoteField::PreviousClose, previous.close);
        }
        quote.fill_from(&from_bar);
    }

    Ok(ChartData { quote, bars })
}

fn chart_bars(result: &YahooChartResult) -> Vec<DailyBar> {
    let Some(quote) = result.indicators.quote.first() else {
        return Vec::new();
    };

    let dividends = result
        .events
        .as_ref()
        .map(|events| {
            events
                .dividends
                .values()
                .filter_map(|event| Some((TradingDate::from_unix_timestamp(event.date)?, event.amount)))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();
    let splits = result
        .events
        .as_ref()
        .map(|events| {
            events
                .splits
                .values()
                .filter(|event| event.denominator > 0.0)
                .filter_map(|event| {
                    Some((
                        TradingDate::from_unix_timestamp(event.date)?,
                        event.numerator / event.denominator,
                    ))
                })
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (index, &ts) in result.timestamp.iter().enumerate() {
        let Some(date) = TradingDate::from_unix_timestamp(ts) else {
            continue;
        };
        let (Some(Some(open)), Some(Some(high)), Some(Some(low)), Some(Some(close))) = (
            quote.open.get(index),
            quote.high.get(index),
            quote.low.get(index),
            quote.close.get(index),
        ) else {
            continue;
        };
        let volume = quote
            .volume
            .get(index)
            .copied()
            .flatten()
            .and_then(|volume| u64::try_from(volume).ok());

        let Ok(mut bar) = DailyBar::new(date, *open, *high, *low, *close, volume) else {
            debug!(provider = "yahoo", %date, "skipping invalid bar");
            continue;
        };
        if let Some(amount) = dividends.get(&date) {
            bar = bar.with_dividends(*amount);
        }
        if let Some(ratio) = splits.get(&date) {
            bar = bar.with_stock_split(*ratio);
        }
        bars.push(bar);
    }
    bars
}

fn parse_summary(body: &str) -> Result<Value, SourceError> {
    let response: YahooQuoteSummaryResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("failed to parse yahoo quoteSummary: {e}")))?;

    if let Some(error) = response.quote_summary.error {
        return Err(SourceError::invalid_request(format!(
            "yahoo quoteSummary error: {}",
            error.description()
        )));
    }

    response
        .quote_summary
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::not_found("yahoo quoteSummary returned no result"))
}

fn parse_option_expirations(body: &str) -> Result<Vec<TradingDate>, SourceError> {
    let response: YahooOptionsResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("failed to parse yahoo options: {e}")))?;

    if let Some(error) = response.option_chain.error {
        return Err(SourceError::invalid_request(format!(
            "yahoo options error: {}",
            error.description()
        )));
    }

    let mut dates = response
        .option_chain
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|result| result.expiration_dates)
        .unwrap_or_default()
        .into_iter()
        .filter_map(TradingDate::from_unix_timestamp)
        .collect::<Vec<_>>();
    dates.sort();
    dates.dedup();
    Ok(dates)
}

#[derive(Debug, Deserialize)]
struct YahooApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl YahooApiError {
    fn description(&self) -> &str {
        self.description
            .as_deref()
            .or(self.code.as_deref())
            .unwrap_or("unknown error")
    }

    fn into_source_error(self, symbol: &Symbol) -> SourceError {
        let message = format!("yahoo chart error for {symbol}: {}", self.description());
        match self.code.as_deref() {
            Some("Not Found") => SourceError::not_found(message),
            Some("Too Many Requests") => SourceError::rate_limited(message),
            _ => SourceError::invalid_request(message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooChartIndicators,
    #[serde(default)]
    events: Option<YahooChartEvents>,
}

#[derive(Debug, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooChartEvents {
    #[serde(default)]
    dividends: BTreeMap<String, YahooDividendEvent>,
    #[serde(default)]
    splits: BTreeMap<String, YahooSplitEvent>,
}

#[derive(Debug, Deserialize)]
struct YahooDividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct YahooSplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: YahooQuoteSummaryData,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryData {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: YahooOptionChain,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChain {
    #[serde(default)]
    result: Option<Vec<YahooOptionResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionResult {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
}
