use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use common::{
    round_to, Error, Interval, MarketDataClient, Period, PriceBar, PriceSeries, Result, TickerInfo,
};

use crate::outliers::remove_outliers;

const BASE_URL: &str = "https://query1.finance.yahoo.com";
/// Visited before each crumb request to obtain the session cookie the crumb
/// is bound to.
const COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const SUMMARY_MODULES: &str = "price,summaryDetail,calendarEvents,financialData";

/// REST client for Yahoo Finance. Used for daily history and quote summaries.
pub struct YahooClient {
    http: Client,
    base_url: String,
    cookie_url: String,
    /// Session crumb required by the quote summary endpoint. Cleared when
    /// the provider rejects it.
    crumb: RwLock<Option<String>>,
}

impl YahooClient {
    pub fn new(request_timeout: Duration) -> Self {
        Self::with_base_url(BASE_URL, COOKIE_URL, request_timeout)
    }

    /// Client against other hosts, e.g. a local mock server.
    pub fn with_base_url(
        base_url: impl Into<String>,
        cookie_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http: Client::builder()
                .use_rustls_tls()
                .cookie_store(true)
                .user_agent(USER_AGENT)
                .timeout(request_timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
            cookie_url: cookie_url.into(),
            crumb: RwLock::new(None),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| Error::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("base URL cannot be a base: {}", self.base_url)))?
            .extend(segments);
        Ok(url)
    }

    async fn fetch(&self, ticker: &str, url: Url) -> Result<(StatusCode, String)> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::unavailable(ticker, e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::unavailable(ticker, e))?;
        Ok((status, body))
    }

    async fn get_text(&self, ticker: &str, url: Url) -> Result<String> {
        let (status, body) = self.fetch(ticker, url).await?;
        check_status(ticker, status, body)
    }

    /// Quote summary body, or `None` when the provider rejected the crumb.
    async fn get_summary(&self, ticker: &str, crumb: &str) -> Result<Option<String>> {
        let mut url = self.endpoint(&["v10", "finance", "quoteSummary", ticker])?;
        url.query_pairs_mut()
            .append_pair("modules", SUMMARY_MODULES)
            .append_pair("crumb", crumb);

        debug!(ticker, "Fetching quote summary");
        let (status, body) = self.fetch(ticker, url).await?;
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        check_status(ticker, status, body).map(Some)
    }

    /// Cached crumb, fetched on first use.
    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut slot = self.crumb.write().await;
        // Another task may have filled it while we waited for the lock.
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    /// Forget `stale` unless another task already replaced it.
    async fn invalidate_crumb(&self, stale: &str) {
        let mut slot = self.crumb.write().await;
        if slot.as_deref() == Some(stale) {
            *slot = None;
        }
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // The cookie endpoint itself answers 404; only the Set-Cookie matters.
        self.http
            .get(&self.cookie_url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let url = self.endpoint(&["v1", "test", "getcrumb"])?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let crumb = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() || crumb.trim().is_empty() {
            return Err(Error::Http(format!("crumb request failed: HTTP {status}")));
        }
        debug!("Obtained Yahoo session crumb");
        Ok(crumb.trim().to_string())
    }
}

/// Yahoo answers unknown symbols with 404 and a JSON error body, which the
/// parsers turn into a readable reason.
fn check_status(ticker: &str, status: StatusCode, body: String) -> Result<String> {
    if !status.is_success() && status != StatusCode::NOT_FOUND {
        return Err(Error::unavailable(ticker, format!("HTTP {status}")));
    }
    Ok(body)
}

#[async_trait]
impl MarketDataClient for YahooClient {
    async fn get_history(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries> {
        let mut url = self.endpoint(&["v8", "finance", "chart", ticker])?;
        url.query_pairs_mut()
            .append_pair("range", period.as_str())
            .append_pair("interval", interval.as_str())
            .append_pair("includePrePost", "false")
            .append_pair("events", "div,splits");

        debug!(ticker, %period, %interval, "Fetching price history");
        let body = self.get_text(ticker, url).await?;
        parse_chart(ticker, &body)
    }

    async fn get_info(&self, ticker: &str) -> Result<TickerInfo> {
        let crumb = self.crumb().await.map_err(|e| Error::unavailable(ticker, e))?;
        if let Some(body) = self.get_summary(ticker, &crumb).await? {
            return parse_quote_summary(ticker, &body);
        }

        // Crumbs expire; fetch a new one and try once more.
        warn!(ticker, "Yahoo rejected the session crumb, refreshing it");
        self.invalidate_crumb(&crumb).await;
        let crumb = self.crumb().await.map_err(|e| Error::unavailable(ticker, e))?;
        match self.get_summary(ticker, &crumb).await? {
            Some(body) => parse_quote_summary(ticker, &body),
            None => Err(Error::unavailable(ticker, "session crumb rejected")),
        }
    }
}

/// Turn a chart response into a normalized, outlier-free daily series.
///
/// Timestamps are moved into the exchange's local day and stripped of their
/// timezone; bars with a missing price are skipped; prices are rounded to
/// the provider's price hint; duplicate dates keep the later bar.
pub fn parse_chart(ticker: &str, body: &str) -> Result<PriceSeries> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| Error::unavailable(ticker, e))?;

    if let Some(err) = envelope.chart.error {
        return Err(Error::unavailable(
            ticker,
            format!("{}: {}", err.code, err.description),
        ));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| Error::unavailable(ticker, "empty chart result"))?;

    let decimals = result.meta.price_hint.unwrap_or(2);
    let offset = result.meta.gmtoffset;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<PriceBar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let open = quote.open.get(i).copied().flatten()?;
            let high = quote.high.get(i).copied().flatten()?;
            let low = quote.low.get(i).copied().flatten()?;
            let close = quote.close.get(i).copied().flatten()?;
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);
            let date = local_date(ts, offset)?;
            Some(PriceBar {
                date,
                open: round_to(open, decimals),
                high: round_to(high, decimals),
                low: round_to(low, decimals),
                close: round_to(close, decimals),
                volume: volume.max(0.0) as u64,
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    // Keep the last bar of each date (the live session's bar comes last).
    bars.reverse();
    bars.dedup_by_key(|b| b.date);
    bars.reverse();

    let bars = remove_outliers(bars);
    if bars.is_empty() {
        return Err(Error::unavailable(ticker, "no usable bars in response"));
    }

    Ok(PriceSeries::new(ticker, bars))
}

/// Turn a quote summary response into `TickerInfo`.
pub fn parse_quote_summary(ticker: &str, body: &str) -> Result<TickerInfo> {
    let envelope: SummaryEnvelope =
        serde_json::from_str(body).map_err(|e| Error::unavailable(ticker, e))?;

    if let Some(err) = envelope.quote_summary.error {
        return Err(Error::unavailable(
            ticker,
            format!("{}: {}", err.code, err.description),
        ));
    }

    let summary = envelope
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| Error::unavailable(ticker, "empty quote summary"))?;

    let price = summary.price.unwrap_or_default();
    let detail = summary.summary_detail.unwrap_or_default();
    let financial = summary.financial_data.unwrap_or_default();
    let earnings_dates = summary
        .calendar_events
        .and_then(|c| c.earnings)
        .map(|e| e.earnings_date)
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.raw.and_then(|ts| epoch_date(ts as i64)))
        .collect();

    Ok(TickerInfo {
        long_name: price.long_name.or(price.short_name),
        currency: price.currency.or(detail.currency),
        current_price: raw(&financial.current_price).or(raw(&price.regular_market_price)),
        previous_close: raw(&detail.previous_close).or(raw(&price.regular_market_previous_close)),
        open: raw(&detail.open).or(raw(&price.regular_market_open)),
        bid: raw(&detail.bid),
        bid_size: raw(&detail.bid_size).map(|v| v as u64),
        ask: raw(&detail.ask),
        ask_size: raw(&detail.ask_size).map(|v| v as u64),
        market_cap: raw(&detail.market_cap).or(raw(&price.market_cap)),
        beta: raw(&detail.beta),
        dividend_rate: raw(&detail.dividend_rate),
        dividend_yield: raw(&detail.dividend_yield),
        ex_dividend_date: raw(&detail.ex_dividend_date).and_then(|ts| epoch_date(ts as i64)),
        earnings_dates,
        target_mean_price: raw(&financial.target_mean_price),
    })
}

fn local_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}

fn epoch_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw).filter(|v| v.is_finite())
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ProviderError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
    price_hint: Option<u32>,
}

#[derive(Deserialize, Default)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize, Default)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryBody,
}

#[derive(Deserialize)]
struct SummaryBody {
    result: Option<Vec<SummaryResult>>,
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetail>,
    calendar_events: Option<CalendarEvents>,
    financial_data: Option<FinancialData>,
}

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}`, or `{}` when absent.
#[derive(Deserialize, Default, Clone, Copy)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    currency: Option<String>,
    regular_market_price: Option<RawValue>,
    regular_market_previous_close: Option<RawValue>,
    regular_market_open: Option<RawValue>,
    market_cap: Option<RawValue>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    currency: Option<String>,
    previous_close: Option<RawValue>,
    open: Option<RawValue>,
    bid: Option<RawValue>,
    bid_size: Option<RawValue>,
    ask: Option<RawValue>,
    ask_size: Option<RawValue>,
    market_cap: Option<RawValue>,
    beta: Option<RawValue>,
    dividend_rate: Option<RawValue>,
    dividend_yield: Option<RawValue>,
    ex_dividend_date: Option<RawValue>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CalendarEvents {
    earnings: Option<EarningsCalendar>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EarningsCalendar {
    #[serde(default)]
    earnings_date: Vec<RawValue>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    current_price: Option<RawValue>,
    target_mean_price: Option<RawValue>,
}
