//! Plain-text output for the `backtest` and `topics` subcommands.

use std::collections::BTreeMap;
use std::fmt::Write;

use backtest::{metrics, BacktestParams, BacktestResult, ExitMode};
use notify::channel_name;
use strategy::AlertFileConfig;

pub fn format_backtest(ticker: &str, params: &BacktestParams, result: &BacktestResult) -> String {
    let mut out = String::new();

    let exit = match params.exit_mode {
        ExitMode::Fixed => format!("fixed ({} days)", params.hold_days),
        ExitMode::Cross => "cross".to_string(),
    };
    let _ = writeln!(
        out,
        "{ticker}: {}-day MA vs {}-day MA, exit {exit}",
        params.fast_window, params.slow_window
    );

    if result.is_empty() {
        let _ = writeln!(out, "No historical data found for that input.");
        return out;
    }

    let first = result.history.first().map(|r| r.timestamp.date_naive());
    let last = result.history.last().map(|r| r.timestamp.date_naive());
    if let (Some(first), Some(last)) = (first, last) {
        let _ = writeln!(out, "{} points from {first} to {last}", result.history.len());
    }
    let _ = writeln!(out);

    let m = |key: &str| result.metrics.get(key).copied().unwrap_or(0.0);
    let _ = writeln!(
        out,
        "Trades: {}  Win rate: {:.1}%  Avg return: {:.2}%  Total return: {:.2}%",
        m(metrics::TOTAL_TRADES) as usize,
        m(metrics::WIN_RATE),
        m(metrics::AVG_RETURN),
        m(metrics::TOTAL_RETURN),
    );

    if result.trades.is_empty() {
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<12} {:>12} {:<12} {:>12} {:>9} {:>9}",
        "Entry Date", "Entry Price", "Exit Date", "Exit Price", "Return %", "Hold Days"
    );
    for t in &result.trades {
        let _ = writeln!(
            out,
            "{:<12} {:>12.2} {:<12} {:>12.2} {:>9.2} {:>9}",
            t.entry_timestamp.date_naive().to_string(),
            t.entry_price,
            t.exit_timestamp.date_naive().to_string(),
            t.exit_price,
            t.return_pct,
            t.hold_length,
        );
    }
    out
}

/// One block per group: the topic to subscribe to, then its alerts.
pub fn format_topics(config: &AlertFileConfig, prefix: &str) -> String {
    let mut out = String::new();
    for (group, alerts) in &config.groups {
        let _ = writeln!(out, "{}", channel_name(prefix, group));
        for alert in alerts {
            let params: BTreeMap<_, _> = alert.params.iter().collect();
            let params = serde_json::to_string(&params).unwrap_or_default();
            let _ = writeln!(
                out,
                "- tickers={} strategy={} timeframe={} params={params}",
                alert.tickers().join(","),
                alert.strategy,
                alert.timeframe,
            );
        }
        let _ = writeln!(out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest::run_backtest;
    use strategy::StrategyRegistry;

    #[test]
    fn topics_list_every_group_with_its_alerts() {
        let json = r#"{"groups": {
            "tech": [{"tickers": ["AAPL", "MSFT"], "strategy": "threshold",
                      "timeframe": "15m", "params": {"low": 180, "high": 250}}],
            "index": [{"ticker": "SPY", "strategy": "ma_cross", "timeframe": "1d",
                       "params": {"fast_window": 50, "slow_window": 200}}]
        }}"#;
        let config = AlertFileConfig::from_json(json, &StrategyRegistry::with_builtins()).unwrap();
        let text = format_topics(&config, "stotify");

        assert_eq!(
            text,
            "stotify-index\n\
             - tickers=SPY strategy=ma_cross timeframe=1d params={\"fast_window\":50,\"slow_window\":200}\n\
             \n\
             stotify-tech\n\
             - tickers=AAPL,MSFT strategy=threshold timeframe=15m params={\"high\":250,\"low\":180}\n\
             \n"
        );
    }

    #[test]
    fn backtest_report_has_summary_and_trades() {
        let series = replay::daily_series("2021-01-01".parse().unwrap(), &[1.0, 1.0, 1.0, 2.0, 3.0, 4.0]);
        let params = BacktestParams {
            fast_window: 2,
            slow_window: 3,
            hold_days: 2,
            ..BacktestParams::default()
        };
        let text = format_backtest("AAPL", &params, &run_backtest(&series, &params));

        assert!(text.starts_with("AAPL: 2-day MA vs 3-day MA, exit fixed (2 days)\n"));
        assert!(text.contains("6 points from 2021-01-01 to 2021-01-06"));
        assert!(text.contains("Trades: 1  Win rate: 100.0%  Avg return: 100.00%  Total return: 100.00%"));
        assert!(text.contains("2021-01-04"));
        assert!(text.contains("2021-01-06"));
    }

    #[test]
    fn empty_backtest_says_so() {
        let text = format_backtest("NOPE", &BacktestParams::default(), &BacktestResult::empty());
        assert!(text.ends_with("No historical data found for that input.\n"));
    }
}
