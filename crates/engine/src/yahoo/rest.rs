use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use common::{Error, HistoryRequest, MarketData, PricePoint, PriceSeries, Result};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Client for Yahoo Finance's v8 chart API. Used for price history and quotes.
pub struct YahooClient {
    base_url: String,
    http: Client,
}

impl YahooClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!("{}/v8/finance/chart/{ticker}", self.base_url)
    }

    /// GET the chart endpoint, retrying rate limits and server errors.
    ///
    /// Yahoo answers unknown symbols with a 404 that still carries a JSON
    /// body, so any body that parses is returned regardless of status.
    async fn get_chart(&self, ticker: &str, query: &[(&str, String)]) -> Result<ChartResponse> {
        let url = self.chart_url(ticker);
        let mut attempt = 0;

        loop {
            let resp = self
                .http
                .get(&url)
                .query(query)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            let status = resp.status();
            let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

            let transient = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if transient && attempt < MAX_RETRIES {
                attempt += 1;
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(%ticker, %status, attempt, "Yahoo request failed; retrying");
                tokio::time::sleep(delay).await;
                continue;
            }

            return match serde_json::from_str::<ChartResponse>(&body) {
                Ok(chart) => Ok(chart),
                Err(_) if !status.is_success() => Err(Error::Http(format!("HTTP {status}: {body}"))),
                Err(e) => Err(Error::Provider(format!("unexpected chart response: {e}"))),
            };
        }
    }
}

#[async_trait]
impl MarketData for YahooClient {
    async fn history(&self, request: &HistoryRequest) -> Result<Option<PriceSeries>> {
        let query = history_query(request, Utc::now());
        debug!(ticker = %request.ticker, ?query, "Fetching Yahoo history");
        let chart = self.get_chart(&request.ticker, &query).await?;
        parse_history(chart)
    }

    async fn last_price(&self, ticker: &str) -> Result<Option<f64>> {
        let query = [("range", "1d".to_string()), ("interval", "1d".to_string())];
        let chart = self.get_chart(ticker, &query).await?;
        parse_last_price(chart)
    }
}

/// Query parameters for a history request.
///
/// An explicit date range becomes `period1`/`period2` (the end date is
/// inclusive); otherwise the trailing `period` is sent as `range`.
fn history_query(request: &HistoryRequest, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let mut query = vec![("interval", request.interval.clone())];

    if request.start.is_none() && request.end.is_none() {
        query.push(("range", request.period.clone()));
        return query;
    }

    let period1 = request.start.map_or(0, midnight_ts);
    let period2 = request
        .end
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .map_or(now.timestamp(), midnight_ts);
    query.push(("period1", period1.to_string()));
    query.push(("period2", period2.to_string()));
    query
}

fn midnight_ts(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Unwrap the first chart result, mapping "Not Found" to `None`.
fn first_result(chart: ChartResponse) -> Result<Option<ChartData>> {
    if let Some(err) = chart.chart.error {
        if err.code == "Not Found" {
            return Ok(None);
        }
        let detail = err.description.unwrap_or_default();
        return Err(Error::Provider(format!("{}: {detail}", err.code)));
    }
    Ok(chart.chart.result.and_then(|r| r.into_iter().next()))
}

fn parse_history(chart: ChartResponse) -> Result<Option<PriceSeries>> {
    let Some(data) = first_result(chart)? else {
        return Ok(None);
    };
    // No timestamps means no bars in the requested range.
    let Some(timestamps) = data.timestamp else {
        return Ok(None);
    };
    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut series: PriceSeries = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(close) = closes.get(i).copied().flatten().filter(|c| c.is_finite()) else {
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
            return Err(Error::Provider(format!("invalid timestamp: {ts}")));
        };
        let point = PricePoint::new(timestamp, close);
        // Intraday responses can repeat the live bar; keep timestamps strictly increasing.
        match series.last_mut() {
            Some(last) if last.timestamp == point.timestamp => *last = point,
            Some(last) if last.timestamp > point.timestamp => continue,
            _ => series.push(point),
        }
    }

    Ok((!series.is_empty()).then_some(series))
}

fn parse_last_price(chart: ChartResponse) -> Result<Option<f64>> {
    let Some(data) = first_result(chart)? else {
        return Ok(None);
    };
    if let Some(price) = data.meta.regular_market_price.filter(|p| p.is_finite()) {
        return Ok(Some(price));
    }
    let last_close = data
        .indicators
        .quote
        .into_iter()
        .next()
        .and_then(|q| q.close.into_iter().rev().flatten().find(|c| c.is_finite()));
    Ok(last_close)
}
