use std::sync::Arc;

use tracing::{error, info, warn};

use common::{MarketData, Notifier, Timeframe};
use strategy::{AlertConfig, AlertFileConfig, StrategyRegistry};

/// Switches for a single alert check pass.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Run intraday alerts even while the market is closed.
    pub skip_market_check: bool,
    /// Only run alerts with exactly this timeframe.
    pub timeframe_filter: Option<Timeframe>,
}

/// Outcome counts of a check pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Evaluates every configured alert and pushes the signals that fire to the
/// notifier.
///
/// This is the only component that calls `Notifier::send`.
pub struct AlertRunner {
    registry: Arc<StrategyRegistry>,
    market: Arc<dyn MarketData>,
    notifier: Arc<dyn Notifier>,
}

impl AlertRunner {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        market: Arc<dyn MarketData>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            market,
            notifier,
        }
    }

    /// Run one pass over `config`. `market_open` is the market state at the
    /// start of the pass; alerts other than daily ones need it unless
    /// `skip_market_check` is set.
    pub async fn check_alerts(
        &self,
        config: &AlertFileConfig,
        options: &CheckOptions,
        market_open: bool,
    ) -> CheckSummary {
        let enforce_hours = !options.skip_market_check && !market_open;
        if enforce_hours {
            info!("Market is closed; skipping non-1d alerts");
        }

        let mut summary = CheckSummary::default();
        for (group, alerts) in &config.groups {
            for alert in alerts {
                if enforce_hours && !alert.timeframe.is_daily() {
                    info!(
                        %group,
                        strategy = %alert.strategy,
                        timeframe = %alert.timeframe,
                        "Skipping alert due to market hours"
                    );
                    summary.skipped += 1;
                    continue;
                }

                if let Some(filter) = &options.timeframe_filter {
                    if &alert.timeframe != filter {
                        info!(
                            %group,
                            strategy = %alert.strategy,
                            timeframe = %alert.timeframe,
                            "Skipping alert due to timeframe mismatch"
                        );
                        summary.skipped += 1;
                        continue;
                    }
                }

                self.run_alert(group, alert, &mut summary).await;
            }
        }

        info!(
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            "Alert check complete"
        );
        summary
    }

    async fn run_alert(&self, group: &str, alert: &AlertConfig, summary: &mut CheckSummary) {
        let strategy = match self.registry.get(&alert.strategy) {
            Ok(s) => s,
            Err(e) => {
                warn!(%group, error = %e, "Alert skipped");
                summary.skipped += 1;
                return;
            }
        };

        let tickers = alert.tickers();
        let signals = strategy
            .evaluate(self.market.as_ref(), &tickers, &alert.params)
            .await;

        if signals.is_empty() {
            info!(
                %group,
                strategy = %alert.strategy,
                tickers = %tickers.join(","),
                reason = "conditions not met",
                "No notification sent"
            );
            return;
        }

        for signal in signals {
            match self.notifier.send(group, &signal).await {
                Ok(()) => {
                    summary.sent += 1;
                    info!(%group, ticker = %signal.ticker, strategy = %alert.strategy, "Notification sent");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        %group,
                        ticker = %signal.ticker,
                        strategy = %alert.strategy,
                        error = %e,
                        "Notification failed"
                    );
                }
            }
        }
    }
}
