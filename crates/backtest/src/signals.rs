//! Moving-average crossover detection.
//!
//! A point's signal is `fast_ma > slow_ma` (strict). Undefined averages count
//! as a false signal. Cross-up marks a false→true transition, cross-down the
//! reverse; index 0 has no predecessor and never fires either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::PricePoint;
use strategy::indicators::rolling_mean;

/// A series point with the rolling averages computed over it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    /// `None` until `fast_window` points are available.
    pub fast_ma: Option<f64>,
    /// `None` until `slow_window` points are available.
    pub slow_ma: Option<f64>,
}

impl HistoryRow {
    pub fn signal(&self) -> bool {
        matches!((self.fast_ma, self.slow_ma), (Some(fast), Some(slow)) if fast > slow)
    }
}

/// Detector output: augmented rows plus per-row crossover flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossSignals {
    pub rows: Vec<HistoryRow>,
    pub cross_up: Vec<bool>,
    pub cross_down: Vec<bool>,
}

impl CrossSignals {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indices where the fast average crosses above the slow one, ascending.
    pub fn cross_up_indices(&self) -> impl Iterator<Item = usize> + '_ {
        flagged(&self.cross_up)
    }

    pub fn cross_down_indices(&self) -> impl Iterator<Item = usize> + '_ {
        flagged(&self.cross_down)
    }
}

fn flagged(flags: &[bool]) -> impl Iterator<Item = usize> + '_ {
    flags.iter().enumerate().filter(|(_, &f)| f).map(|(i, _)| i)
}

/// Compute both rolling averages and the crossover points of `series`.
///
/// The input is not modified. Window lengths are not validated here; with
/// `fast_window >= slow_window` the transition rule is applied as-is.
pub fn detect_crosses(series: &[PricePoint], fast_window: usize, slow_window: usize) -> CrossSignals {
    let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
    let fast = rolling_mean(&closes, fast_window);
    let slow = rolling_mean(&closes, slow_window);

    let rows: Vec<HistoryRow> = series
        .iter()
        .zip(fast.into_iter().zip(slow))
        .map(|(p, (fast_ma, slow_ma))| HistoryRow {
            timestamp: p.timestamp,
            close: p.close,
            fast_ma,
            slow_ma,
        })
        .collect();

    let mut cross_up = vec![false; rows.len()];
    let mut cross_down = vec![false; rows.len()];
    for i in 1..rows.len() {
        let prev = rows[i - 1].signal();
        let curr = rows[i].signal();
        cross_up[i] = curr && !prev;
        cross_down[i] = !curr && prev;
    }

    CrossSignals {
        rows,
        cross_up,
        cross_down,
    }
}
