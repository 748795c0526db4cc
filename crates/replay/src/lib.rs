use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveTime};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Error, HistoryRequest, MarketData, PricePoint, PriceSeries, Result};

/// Market data served from memory instead of a live provider.
///
/// Histories are filtered by the request's `start`/`end` dates; `period` and
/// `interval` are ignored. Used for offline backtests from CSV files and as
/// the provider in tests.
#[derive(Clone, Default)]
pub struct ReplayMarketData {
    /// Price history per ticker, oldest first.
    histories: Arc<RwLock<HashMap<String, PriceSeries>>>,
    /// Explicit last prices; falls back to the last close of the history.
    prices: Arc<RwLock<HashMap<String, f64>>>,
    /// Tickers whose fetches fail with a provider error.
    unavailable: Arc<RwLock<HashSet<String>>>,
}

impl ReplayMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history for a ticker.
    pub async fn insert_history(&self, ticker: &str, series: PriceSeries) {
        self.histories.write().await.insert(ticker.to_string(), series);
    }

    /// Set the last traded price for a ticker.
    pub async fn set_price(&self, ticker: &str, price: f64) {
        self.prices.write().await.insert(ticker.to_string(), price);
    }

    /// Make every fetch for `ticker` fail, as an unreachable provider would.
    pub async fn set_unavailable(&self, ticker: &str) {
        self.unavailable.write().await.insert(ticker.to_string());
    }

    /// Load a `date,close` CSV file as the history of `ticker`.
    pub async fn load_csv_file(&self, ticker: &str, path: impl AsRef<Path>) -> Result<usize> {
        let file = std::fs::File::open(path.as_ref())?;
        let series = parse_csv(file)?;
        let rows = series.len();
        info!(%ticker, rows, path = %path.as_ref().display(), "Loaded price history from CSV");
        self.insert_history(ticker, series).await;
        Ok(rows)
    }

    async fn check_available(&self, ticker: &str) -> Result<()> {
        if self.unavailable.read().await.contains(ticker) {
            return Err(Error::Provider(format!("replay data for '{ticker}' is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketData for ReplayMarketData {
    async fn history(&self, request: &HistoryRequest) -> Result<Option<PriceSeries>> {
        self.check_available(&request.ticker).await?;

        let histories = self.histories.read().await;
        let Some(series) = histories.get(&request.ticker) else {
            debug!(ticker = %request.ticker, "No replay history");
            return Ok(None);
        };

        let filtered: PriceSeries = series
            .iter()
            .filter(|p| {
                let date = p.timestamp.date_naive();
                request.start.map_or(true, |s| date >= s) && request.end.map_or(true, |e| date <= e)
            })
            .copied()
            .collect();

        Ok(Some(filtered))
    }

    async fn last_price(&self, ticker: &str) -> Result<Option<f64>> {
        self.check_available(ticker).await?;

        if let Some(price) = self.prices.read().await.get(ticker).copied() {
            return Ok(Some(price));
        }
        Ok(self
            .histories
            .read()
            .await
            .get(ticker)
            .and_then(|s| s.last())
            .map(|p| p.close))
    }
}

// ─── CSV ──────────────────────────────────────────────────────────────────────

/// One CSV row. Accepts the lowercase `date,close` layout as well as Yahoo
/// Finance exports (`Date,Open,High,Low,Close,Adj Close,Volume`).
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Close", deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
}

/// Parse a price CSV into a series sorted by date.
///
/// Rows with a missing or unparsable close are dropped. When a date appears
/// more than once the last row wins.
pub fn parse_csv(reader: impl Read) -> Result<PriceSeries> {
    let mut by_date: Vec<(NaiveDate, f64)> = Vec::new();
    for row in csv::Reader::from_reader(reader).deserialize::<CsvRow>() {
        let row = row?;
        if let Some(close) = row.close.filter(|c| c.is_finite()) {
            by_date.push((row.date, close));
        }
    }

    by_date.sort_by_key(|(date, _)| *date);
    let mut series: PriceSeries = Vec::with_capacity(by_date.len());
    for (date, close) in by_date {
        let point = PricePoint::new(midnight_utc(date), close);
        match series.last_mut() {
            Some(last) if last.timestamp == point.timestamp => *last = point,
            _ => series.push(point),
        }
    }
    Ok(series)
}

/// Build a daily series starting at `start`, one point per close.
pub fn daily_series(start: NaiveDate, closes: &[f64]) -> PriceSeries {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let date = start + Days::new(i as u64);
            PricePoint::new(midnight_utc(date), close)
        })
        .collect()
}

fn midnight_utc(date: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
