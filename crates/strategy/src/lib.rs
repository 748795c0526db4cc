pub mod config;
pub mod indicators;
pub mod registry;

pub use config::{AlertConfig, AlertFileConfig};
pub use registry::{MaCrossStrategy, StrategyRegistry, ThresholdStrategy};

use std::collections::HashMap;

use async_trait::async_trait;

use common::{AlertSignal, MarketData, Result};

/// Free-form strategy parameters taken verbatim from the alert config.
pub type StrategyParams = HashMap<String, serde_json::Value>;

/// All strategy implementations must satisfy this trait.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Registry key, as written in the alert config (`"threshold"`).
    fn name(&self) -> &'static str;

    /// Check strategy-specific parameters for an alert.
    ///
    /// `group` and `tickers` are only used to build the error message.
    fn validate(&self, params: &StrategyParams, group: &str, tickers: &[String]) -> Result<()>;

    /// Evaluate the strategy for every ticker and return the signals that fired.
    ///
    /// Tickers with no market data are skipped, not reported as errors.
    async fn evaluate(
        &self,
        market: &dyn MarketData,
        tickers: &[String],
        params: &StrategyParams,
    ) -> Vec<AlertSignal>;
}
