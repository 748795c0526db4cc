use proptest::prelude::*;

use backtest::{
    detect_crosses, run_backtest, simulate_trades, summarize, BacktestParams, ExitMode, ExitRule,
    OverlapPolicy,
};
use common::PriceSeries;

fn series(closes: &[f64]) -> PriceSeries {
    replay::daily_series("2020-01-01".parse().unwrap(), closes)
}

fn closes_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..500.0, 0..120)
}

fn windows_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..10, 1usize..15).prop_map(|(fast, extra)| (fast, fast + extra))
}

proptest! {
    /// Every cross-up has a true signal preceded by a false one.
    #[test]
    fn cross_up_points_are_false_to_true_transitions(
        closes in closes_strategy(),
        (fast, slow) in windows_strategy(),
    ) {
        let signals = detect_crosses(&series(&closes), fast, slow);
        for i in signals.cross_up_indices() {
            prop_assert!(i > 0);
            prop_assert!(signals.rows[i].signal());
            prop_assert!(!signals.rows[i - 1].signal());
        }
        for i in signals.cross_down_indices() {
            prop_assert!(i > 0);
            prop_assert!(!signals.rows[i].signal());
            prop_assert!(signals.rows[i - 1].signal());
        }
    }

    /// Fixed exits never run past the end of the series.
    #[test]
    fn fixed_exit_is_clamped(
        closes in closes_strategy(),
        (fast, slow) in windows_strategy(),
        hold in 1usize..200,
    ) {
        let signals = detect_crosses(&series(&closes), fast, slow);
        let last = signals.rows.last().map(|r| r.timestamp);
        let trades = simulate_trades(&signals, ExitRule::FixedHold(hold), OverlapPolicy::Allow);

        prop_assert_eq!(trades.len(), signals.cross_up_indices().count());
        for t in &trades {
            prop_assert!(t.hold_length <= hold);
            prop_assert!(Some(t.exit_timestamp) <= last);
            prop_assert!(t.exit_timestamp >= t.entry_timestamp);
        }
    }

    /// Cross exits land on a cross-down or, failing that, the last point.
    #[test]
    fn cross_exit_hits_cross_down_or_last_point(
        closes in closes_strategy(),
        (fast, slow) in windows_strategy(),
    ) {
        let signals = detect_crosses(&series(&closes), fast, slow);
        let trades = simulate_trades(&signals, ExitRule::NextCrossDown, OverlapPolicy::Allow);
        let last = signals.len().saturating_sub(1);

        for (t, entry) in trades.iter().zip(signals.cross_up_indices()) {
            let exit = entry + t.hold_length;
            prop_assert!(exit > entry || exit == last);
            prop_assert!(signals.cross_down[exit] || exit == last);
            prop_assert!(!(entry + 1..exit).any(|i| signals.cross_down[i]));
        }
    }

    /// Same inputs, same outputs.
    #[test]
    fn backtest_is_deterministic(
        closes in closes_strategy(),
        (fast, slow) in windows_strategy(),
        cross in any::<bool>(),
    ) {
        let params = BacktestParams {
            fast_window: fast,
            slow_window: slow,
            exit_mode: if cross { ExitMode::Cross } else { ExitMode::Fixed },
            hold_days: 5,
            ..BacktestParams::default()
        };
        let s = series(&closes);
        prop_assert_eq!(run_backtest(&s, &params), run_backtest(&s, &params));
    }

    /// Single-open never yields more trades than the default policy.
    #[test]
    fn single_open_is_a_subset(
        closes in closes_strategy(),
        (fast, slow) in windows_strategy(),
        hold in 1usize..40,
    ) {
        let signals = detect_crosses(&series(&closes), fast, slow);
        let all = simulate_trades(&signals, ExitRule::FixedHold(hold), OverlapPolicy::Allow);
        let single = simulate_trades(&signals, ExitRule::FixedHold(hold), OverlapPolicy::SingleOpen);
        prop_assert!(single.len() <= all.len());
        for pair in single.windows(2) {
            prop_assert!(pair[1].entry_timestamp >= pair[0].exit_timestamp);
        }
    }

    /// Metrics are empty exactly when there are no trades, and total return
    /// matches the product of growth factors.
    #[test]
    fn metrics_match_trades(
        closes in closes_strategy(),
        (fast, slow) in windows_strategy(),
    ) {
        let signals = detect_crosses(&series(&closes), fast, slow);
        let trades = simulate_trades(&signals, ExitRule::FixedHold(3), OverlapPolicy::Allow);
        let metrics = summarize(&trades);

        if trades.is_empty() {
            prop_assert!(metrics.is_empty());
        } else {
            prop_assert_eq!(metrics.len(), 4);
            prop_assert_eq!(metrics["total_trades"], trades.len() as f64);
            let growth: f64 = trades.iter().map(|t| 1.0 + t.return_pct / 100.0).product();
            let expected = (growth - 1.0) * 100.0;
            prop_assert!((metrics["total_return"] - expected).abs() <= 1e-9 * expected.abs().max(1.0));
            prop_assert!((0.0..=100.0).contains(&metrics["win_rate"]));
        }
    }
}

#[test]
fn empty_series_gives_empty_result() {
    let result = run_backtest(&[], &BacktestParams::default());
    assert!(result.history.is_empty());
    assert!(result.trades.is_empty());
    assert!(result.metrics.is_empty());
}

#[test]
fn compounding_differs_from_summing() {
    // cross-ups at 3, 7 and 12; the last trade runs to the end of the data
    let closes = [
        10.0, 10.0, 10.0, 12.0, 11.0, 9.0, 9.0, 12.0, 13.0, 10.0, 8.0, 8.0, 11.0, 12.0, 12.0,
    ];
    let params = BacktestParams {
        fast_window: 2,
        slow_window: 3,
        exit_mode: ExitMode::Cross,
        ..BacktestParams::default()
    };
    let result = run_backtest(&series(&closes), &params);
    assert_eq!(result.trades.len(), 3);

    let growth: f64 = result
        .trades
        .iter()
        .map(|t| 1.0 + t.return_pct / 100.0)
        .product();
    let simple_sum: f64 = result.trades.iter().map(|t| t.return_pct).sum();
    let total = result.metrics["total_return"];
    assert!((total - (growth - 1.0) * 100.0).abs() < 1e-9);
    assert!((total - simple_sum).abs() > 1e-6);
}
