use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One closing price observation from the market data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

/// Closing prices ordered by strictly increasing timestamp.
pub type PriceSeries = Vec<PricePoint>;

/// Parameters for a historical price fetch.
///
/// When `start` or `end` is set the provider queries that date range and
/// ignores `period`; otherwise `period` (e.g. `"5y"`) selects a trailing range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub ticker: String,
    pub period: String,
    pub interval: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl HistoryRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            period: "1y".to_string(),
            interval: "1d".to_string(),
            start: None,
            end: None,
        }
    }

    pub fn period(mut self, period: impl Into<String>) -> Self {
        self.period = period.into();
        self
    }

    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// What triggered an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    High,
    Low,
    MaCross,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::High => write!(f, "high"),
            AlertKind::Low => write!(f, "low"),
            AlertKind::MaCross => write!(f, "ma_cross"),
        }
    }
}

/// Signal emitted by a strategy, passed to the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSignal {
    pub ticker: String,
    pub price: f64,
    pub kind: AlertKind,
    /// Price level that was crossed; `None` for indicator-based alerts.
    pub threshold: Option<f64>,
    /// Overrides the default price/threshold message when set.
    pub message: Option<String>,
}

impl AlertSignal {
    /// Notification text without the group prefix.
    pub fn body(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        let direction = match self.kind {
            AlertKind::Low => "below",
            _ => "above",
        };
        match self.threshold {
            Some(threshold) => format!(
                "{} is ${:.2} ({direction} ${threshold:.2})",
                self.ticker, self.price
            ),
            None => format!("{} is ${:.2}", self.ticker, self.price),
        }
    }
}

/// Evaluation cadence of an alert: a count of minutes, hours or days such as
/// `15m`, `6h` or `1d`. Zero counts are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe(String);

impl Timeframe {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Daily alerts run even while the market is closed.
    pub fn is_daily(&self) -> bool {
        self.0 == "1d"
    }

    pub fn is_valid(s: &str) -> bool {
        let Some(unit) = s.chars().last() else {
            return false;
        };
        let digits = &s[..s.len() - unit.len_utf8()];
        matches!(unit, 'm' | 'h' | 'd')
            && !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::config(format!("invalid timeframe '{s}'")))
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.0
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
