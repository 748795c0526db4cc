//! Moving-average crossover backtesting.
//!
//! [`detect_crosses`] computes the averages and crossover points of a price
//! series, [`simulate_trades`] turns cross-ups into trades under an exit rule,
//! and [`summarize`] folds the trades into metrics. [`backtest_ma_cross`]
//! chains them behind a market data fetch.

pub mod metrics;
pub mod signals;
pub mod simulator;

pub use metrics::{summarize, Metrics};
pub use signals::{detect_crosses, CrossSignals, HistoryRow};
pub use simulator::{simulate_trades, ExitMode, ExitRule, OverlapPolicy, ParseExitModeError, Trade};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{HistoryRequest, MarketData, PricePoint};

/// Inputs of a crossover backtest besides the ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Trailing range used when neither `start` nor `end` is set.
    pub period: String,
    pub interval: String,
    pub fast_window: usize,
    pub slow_window: usize,
    pub exit_mode: ExitMode,
    /// Holding period in series points; only used with [`ExitMode::Fixed`].
    pub hold_days: usize,
    pub overlap: OverlapPolicy,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            period: "5y".to_string(),
            interval: "1d".to_string(),
            fast_window: 50,
            slow_window: 200,
            exit_mode: ExitMode::Fixed,
            hold_days: 30,
            overlap: OverlapPolicy::Allow,
        }
    }
}

impl BacktestParams {
    pub fn exit_rule(&self) -> ExitRule {
        match self.exit_mode {
            ExitMode::Fixed => ExitRule::FixedHold(self.hold_days),
            ExitMode::Cross => ExitRule::NextCrossDown,
        }
    }

    pub fn history_request(&self, ticker: &str) -> HistoryRequest {
        HistoryRequest::new(ticker)
            .period(self.period.as_str())
            .interval(self.interval.as_str())
            .range(self.start, self.end)
    }
}

/// Augmented history, trades in entry order, and summary metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub history: Vec<HistoryRow>,
    pub trades: Vec<Trade>,
    pub metrics: Metrics,
}

impl BacktestResult {
    /// The "no data" result: no history, no trades, no metrics.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Backtest a price series that is already in memory.
///
/// Points with a non-finite close are dropped first. An empty series yields
/// [`BacktestResult::empty`].
pub fn run_backtest(series: &[PricePoint], params: &BacktestParams) -> BacktestResult {
    let series: Vec<PricePoint> = series
        .iter()
        .filter(|p| p.close.is_finite())
        .copied()
        .collect();
    if series.is_empty() {
        return BacktestResult::empty();
    }

    let signals = detect_crosses(&series, params.fast_window, params.slow_window);
    let trades = simulate_trades(&signals, params.exit_rule(), params.overlap);
    let metrics = summarize(&trades);

    BacktestResult {
        history: signals.rows,
        trades,
        metrics,
    }
}

/// Fetch history for `ticker` and backtest the crossover strategy on it.
///
/// A failed fetch, a missing ticker and an empty series all produce
/// [`BacktestResult::empty`]; none of them is an error.
pub async fn backtest_ma_cross(
    market: &dyn MarketData,
    ticker: &str,
    params: &BacktestParams,
) -> BacktestResult {
    let request = params.history_request(ticker);
    let series = match market.history(&request).await {
        Ok(Some(series)) if !series.is_empty() => series,
        Ok(_) => {
            debug!(%ticker, "No history for backtest");
            return BacktestResult::empty();
        }
        Err(e) => {
            warn!(%ticker, error = %e, "History fetch failed; treating as no data");
            return BacktestResult::empty();
        }
    };

    let result = run_backtest(&series, params);
    info!(
        %ticker,
        points = result.history.len(),
        trades = result.trades.len(),
        fast = params.fast_window,
        slow = params.slow_window,
        exit = %params.exit_mode,
        "Backtest complete"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay::{daily_series, ReplayMarketData};

    fn start() -> NaiveDate {
        "2021-01-01".parse().unwrap()
    }

    async fn market_with(closes: &[f64]) -> ReplayMarketData {
        let market = ReplayMarketData::new();
        market.insert_history("TEST", daily_series(start(), closes)).await;
        market
    }

    fn params(fast: usize, slow: usize, exit_mode: ExitMode, hold_days: usize) -> BacktestParams {
        BacktestParams {
            fast_window: fast,
            slow_window: slow,
            exit_mode,
            hold_days,
            ..BacktestParams::default()
        }
    }

    #[tokio::test]
    async fn fixed_exit_scenario() {
        let market = market_with(&[1.0, 1.0, 1.0, 2.0, 3.0, 4.0]).await;
        let result = backtest_ma_cross(&market, "TEST", &params(2, 3, ExitMode::Fixed, 2)).await;

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_timestamp, result.history[3].timestamp);
        assert_eq!(trade.entry_price, 2.0);
        assert_eq!(trade.exit_timestamp, result.history[5].timestamp);
        assert_eq!(trade.exit_price, 4.0);
        assert_eq!(trade.return_pct, 100.0);
        assert_eq!(trade.hold_length, 2);
    }

    #[tokio::test]
    async fn cross_exit_scenario() {
        let market = market_with(&[1.0, 1.0, 1.0, 2.0, 3.0, 2.0, 1.0]).await;
        let result = backtest_ma_cross(&market, "TEST", &params(2, 3, ExitMode::Cross, 30)).await;

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_timestamp, result.history[3].timestamp);
        // fast 1.5 < slow 2.0 at the last point: a real cross-down at index 6
        assert_eq!(trade.exit_timestamp, result.history[6].timestamp);
        assert_eq!(trade.hold_length, 3);
        assert_eq!(trade.return_pct, -50.0);
    }

    #[tokio::test]
    async fn no_history_gives_empty_result() {
        let market = ReplayMarketData::new();
        let result = backtest_ma_cross(&market, "TEST", &BacktestParams::default()).await;
        assert!(result.is_empty());
        assert!(result.trades.is_empty());
        assert!(result.metrics.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_gives_empty_result() {
        let market = ReplayMarketData::new();
        market.set_unavailable("TEST").await;
        let result = backtest_ma_cross(&market, "TEST", &BacktestParams::default()).await;
        assert_eq!(result, BacktestResult::empty());
    }

    #[tokio::test]
    async fn date_range_is_forwarded_to_provider() {
        let market = market_with(&[1.0, 1.0, 1.0, 2.0, 3.0, 4.0]).await;
        let mut p = params(2, 3, ExitMode::Fixed, 2);
        p.end = Some("2021-01-03".parse().unwrap());
        let result = backtest_ma_cross(&market, "TEST", &p).await;
        assert_eq!(result.history.len(), 3);
        assert!(result.trades.is_empty());
        assert!(result.metrics.is_empty());
    }

    #[test]
    fn missing_closes_are_dropped() {
        let series = daily_series(start(), &[1.0, f64::NAN, 1.0, 1.0, 2.0, 3.0, 4.0]);
        let result = run_backtest(&series, &params(2, 3, ExitMode::Fixed, 2));
        assert_eq!(result.history.len(), 6);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].return_pct, 100.0);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: BacktestParams =
            serde_json::from_str(r#"{"fast_window": 10, "exit_mode": "cross"}"#).unwrap();
        assert_eq!(p.fast_window, 10);
        assert_eq!(p.slow_window, 200);
        assert_eq!(p.exit_rule(), ExitRule::NextCrossDown);
        assert_eq!(p.overlap, OverlapPolicy::Allow);
    }
}
