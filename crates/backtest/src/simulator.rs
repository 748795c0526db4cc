use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signals::CrossSignals;

/// How a simulated position is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitMode {
    /// Close after a fixed number of series points.
    #[default]
    Fixed,
    /// Close at the next cross-down.
    Cross,
}

#[derive(Debug, Error)]
#[error("unknown exit mode '{0}' (expected 'fixed' or 'cross')")]
pub struct ParseExitModeError(String);

impl FromStr for ExitMode {
    type Err = ParseExitModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(ExitMode::Fixed),
            "cross" => Ok(ExitMode::Cross),
            _ => Err(ParseExitModeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for ExitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitMode::Fixed => write!(f, "fixed"),
            ExitMode::Cross => write!(f, "cross"),
        }
    }
}

/// Resolved exit policy for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRule {
    /// Exit `n` points after entry, clamped to the last point.
    FixedHold(usize),
    /// Exit at the first cross-down after entry, or the last point if none.
    NextCrossDown,
}

/// Whether a new cross-up may open a trade while an earlier one is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Every cross-up opens a trade, even if earlier trades are still open.
    #[default]
    Allow,
    /// Cross-ups before the previous trade's exit point are ignored.
    SingleOpen,
}

/// One simulated round trip, from a cross-up to its exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_timestamp: DateTime<Utc>,
    pub exit_price: f64,
    pub return_pct: f64,
    /// Number of series points between entry and exit.
    pub hold_length: usize,
}

/// Turn every cross-up into a trade, in chronological order of entry.
pub fn simulate_trades(signals: &CrossSignals, exit: ExitRule, overlap: OverlapPolicy) -> Vec<Trade> {
    let Some(last) = signals.len().checked_sub(1) else {
        return Vec::new();
    };
    let next_cross_down = next_flag_after(&signals.cross_down);

    let mut trades = Vec::new();
    let mut open_until: Option<usize> = None;

    for entry_pos in signals.cross_up_indices() {
        if overlap == OverlapPolicy::SingleOpen && open_until.is_some_and(|exit| entry_pos < exit) {
            continue;
        }

        let exit_pos = match exit {
            ExitRule::FixedHold(hold) => entry_pos.saturating_add(hold).min(last),
            ExitRule::NextCrossDown => next_cross_down[entry_pos].unwrap_or(last),
        };

        let entry = &signals.rows[entry_pos];
        let exit_row = &signals.rows[exit_pos];
        trades.push(Trade {
            entry_timestamp: entry.timestamp,
            entry_price: entry.close,
            exit_timestamp: exit_row.timestamp,
            exit_price: exit_row.close,
            return_pct: (exit_row.close - entry.close) / entry.close * 100.0,
            hold_length: exit_pos - entry_pos,
        });
        open_until = Some(exit_pos);
    }

    trades
}

/// For each index, the first flagged index strictly after it.
fn next_flag_after(flags: &[bool]) -> Vec<Option<usize>> {
    let mut next = vec![None; flags.len()];
    let mut upcoming = None;
    for i in (0..flags.len()).rev() {
        next[i] = upcoming;
        if flags[i] {
            upcoming = Some(i);
        }
    }
    next
}
