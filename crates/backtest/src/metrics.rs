use std::collections::BTreeMap;

use crate::simulator::Trade;

pub const TOTAL_TRADES: &str = "total_trades";
pub const WIN_RATE: &str = "win_rate";
pub const AVG_RETURN: &str = "avg_return";
pub const TOTAL_RETURN: &str = "total_return";

/// Summary statistics keyed by name. Either all four keys or none.
pub type Metrics = BTreeMap<String, f64>;

/// Fold trades into summary metrics. No trades means an empty map.
///
/// `total_return` compounds trade returns in order, so it is not the sum of
/// `return_pct` values.
pub fn summarize(trades: &[Trade]) -> Metrics {
    if trades.is_empty() {
        return Metrics::new();
    }

    let count = trades.len() as f64;
    let wins = trades.iter().filter(|t| t.return_pct > 0.0).count() as f64;
    let sum: f64 = trades.iter().map(|t| t.return_pct).sum();
    let compounded = trades
        .iter()
        .fold(1.0, |value, t| value * (1.0 + t.return_pct / 100.0));

    Metrics::from([
        (TOTAL_TRADES.to_string(), count),
        (WIN_RATE.to_string(), wins / count * 100.0),
        (AVG_RETURN.to_string(), sum / count),
        (TOTAL_RETURN.to_string(), (compounded - 1.0) * 100.0),
    ])
}
