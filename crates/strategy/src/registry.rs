use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use common::{AlertKind, AlertSignal, Error, HistoryRequest, MarketData, Result};

use crate::indicators::latest_mean;
use crate::{Strategy, StrategyParams};

/// Named strategies available to alert configs, looked up by exact key.
pub struct StrategyRegistry {
    strategies: HashMap<&'static str, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// An empty registry. Most callers want [`StrategyRegistry::with_builtins`].
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry holding every built-in strategy.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ThresholdStrategy));
        registry.register(Arc::new(MaCrossStrategy));
        registry
    }

    /// Add a strategy, replacing any previous one with the same name.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        debug!(name = strategy.name(), "Registered strategy");
        self.strategies.insert(strategy.name(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown strategy '{name}'")))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.strategies.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ─── Parameter helpers ────────────────────────────────────────────────────────

fn param_f64(params: &StrategyParams, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

fn param_str<'a>(params: &'a StrategyParams, key: &str, default: &'a str) -> &'a str {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

/// Strictly positive integer parameter.
fn param_window(params: &StrategyParams, key: &str) -> Option<usize> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|&v| v > 0)
        .map(|v| v as usize)
}

// ─── Concrete strategy types ──────────────────────────────────────────────────

/// Fires when the last price is at or beyond a `high` or `low` level.
pub struct ThresholdStrategy;

#[async_trait]
impl Strategy for ThresholdStrategy {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn validate(&self, params: &StrategyParams, group: &str, tickers: &[String]) -> Result<()> {
        if !params.contains_key("high") && !params.contains_key("low") {
            let ticker_label = tickers.join(", ");
            return Err(Error::config(format!(
                "Alert for {ticker_label} in group '{group}' must have 'high' or 'low' in params"
            )));
        }
        for key in ["high", "low"] {
            if params.contains_key(key) && param_f64(params, key).is_none() {
                return Err(Error::config(format!(
                    "Alert in group '{group}' has invalid '{key}' value"
                )));
            }
        }
        Ok(())
    }

    async fn evaluate(
        &self,
        market: &dyn MarketData,
        tickers: &[String],
        params: &StrategyParams,
    ) -> Vec<AlertSignal> {
        let high = param_f64(params, "high");
        let low = param_f64(params, "low");
        let mut signals = Vec::new();

        for ticker in tickers {
            let price = match market.last_price(ticker).await {
                Ok(Some(price)) => price,
                Ok(None) => {
                    debug!(%ticker, "No price available");
                    continue;
                }
                Err(e) => {
                    warn!(%ticker, error = %e, "Price fetch failed");
                    continue;
                }
            };

            if let Some(high) = high.filter(|&h| price >= h) {
                signals.push(AlertSignal {
                    ticker: ticker.clone(),
                    price,
                    kind: AlertKind::High,
                    threshold: Some(high),
                    message: None,
                });
            }
            if let Some(low) = low.filter(|&l| price <= l) {
                signals.push(AlertSignal {
                    ticker: ticker.clone(),
                    price,
                    kind: AlertKind::Low,
                    threshold: Some(low),
                    message: None,
                });
            }
        }

        signals
    }
}

/// Fires while the fast moving average is above the slow one.
pub struct MaCrossStrategy;

impl MaCrossStrategy {
    const DEFAULT_PERIOD: &'static str = "1y";
    const DEFAULT_INTERVAL: &'static str = "1d";
}

#[async_trait]
impl Strategy for MaCrossStrategy {
    fn name(&self) -> &'static str {
        "ma_cross"
    }

    fn validate(&self, params: &StrategyParams, group: &str, _tickers: &[String]) -> Result<()> {
        for key in ["fast_window", "slow_window"] {
            if !params.contains_key(key) {
                return Err(Error::config(format!(
                    "Alert in group '{group}' missing '{key}' in params"
                )));
            }
            if param_window(params, key).is_none() {
                return Err(Error::config(format!(
                    "Alert in group '{group}' has invalid '{key}' value"
                )));
            }
        }
        Ok(())
    }

    async fn evaluate(
        &self,
        market: &dyn MarketData,
        tickers: &[String],
        params: &StrategyParams,
    ) -> Vec<AlertSignal> {
        let (Some(fast_window), Some(slow_window)) = (
            param_window(params, "fast_window"),
            param_window(params, "slow_window"),
        ) else {
            warn!("ma_cross evaluated without valid windows");
            return Vec::new();
        };
        let period = param_str(params, "period", Self::DEFAULT_PERIOD);
        let interval = param_str(params, "interval", Self::DEFAULT_INTERVAL);

        let mut signals = Vec::new();
        for ticker in tickers {
            let request = HistoryRequest::new(ticker.as_str())
                .period(period)
                .interval(interval);
            let history = match market.history(&request).await {
                Ok(Some(history)) => history,
                Ok(None) => {
                    debug!(%ticker, "No history available");
                    continue;
                }
                Err(e) => {
                    warn!(%ticker, error = %e, "History fetch failed");
                    continue;
                }
            };

            let closes: Vec<f64> = history
                .iter()
                .map(|p| p.close)
                .filter(|c| c.is_finite())
                .collect();
            if closes.len() < slow_window {
                debug!(%ticker, have = closes.len(), need = slow_window, "Not enough history");
                continue;
            }

            let (Some(fast_ma), Some(slow_ma)) = (
                latest_mean(&closes, fast_window),
                latest_mean(&closes, slow_window),
            ) else {
                continue;
            };

            if fast_ma > slow_ma {
                let price = closes[closes.len() - 1];
                signals.push(AlertSignal {
                    ticker: ticker.clone(),
                    price,
                    kind: AlertKind::MaCross,
                    threshold: None,
                    message: Some(format!(
                        "{ticker} {fast_window}d MA (${fast_ma:.2}) above {slow_window}d MA (${slow_ma:.2})"
                    )),
                });
            }
        }

        signals
    }
}
