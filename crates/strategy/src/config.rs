use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::{Error, Result, Timeframe};

use crate::{StrategyParams, StrategyRegistry};

/// Longest group name accepted; groups double as ntfy topic suffixes.
pub const MAX_GROUP_NAME_LEN: usize = 100;

/// Top-level alert config file (JSON, or TOML when the path ends in `.toml`).
///
/// Example `alerts.json`:
/// ```json
/// {
///   "groups": {
///     "portfolio": [
///       { "tickers": ["AAPL", "MSFT"], "strategy": "threshold",
///         "timeframe": "1d", "params": { "high": 250, "low": 180 } },
///       { "ticker": "SPY", "strategy": "ma_cross", "timeframe": "1d",
///         "params": { "fast_window": 50, "slow_window": 200 } }
///     ]
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertFileConfig {
    /// Alert groups keyed by name, iterated in name order.
    pub groups: BTreeMap<String, Vec<AlertConfig>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<String>>,
    /// Registry key of the strategy, e.g. "threshold" or "ma_cross".
    pub strategy: String,
    pub timeframe: Timeframe,
    /// Strategy-specific parameters.
    pub params: StrategyParams,
}

impl AlertConfig {
    /// Tickers this alert watches, whichever of `ticker` / `tickers` was used.
    pub fn tickers(&self) -> Vec<String> {
        match (&self.tickers, &self.ticker) {
            (Some(list), _) => list.clone(),
            (None, Some(one)) => vec![one.clone()],
            (None, None) => Vec::new(),
        }
    }
}

impl AlertFileConfig {
    /// Read, parse and validate an alert config file.
    pub fn load(path: impl AsRef<Path>, registry: &StrategyRegistry) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let raw: Value = if is_toml {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Self::from_value(raw, registry)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(content: &str, registry: &StrategyRegistry) -> Result<Self> {
        Self::from_value(serde_json::from_str(content)?, registry)
    }

    /// Validate an already-parsed document, then convert it to typed config.
    ///
    /// Validation runs on the untyped tree so errors name the offending group
    /// and field instead of surfacing a serde message.
    pub fn from_value(raw: Value, registry: &StrategyRegistry) -> Result<Self> {
        let groups = raw
            .get("groups")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::config("Config must have 'groups' object"))?;

        for (group_name, alerts) in groups {
            validate_group_name(group_name)?;

            let alerts = alerts
                .as_array()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| Error::config(format!("Group '{group_name}' has no alerts")))?;

            for alert in alerts {
                validate_alert(alert, group_name, registry)?;
            }
        }

        Ok(serde_json::from_value(raw)?)
    }
}

/// Check a group name is usable as an ntfy topic suffix.
pub fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_GROUP_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_group_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config("Group name cannot be empty"));
    }
    if name.len() > MAX_GROUP_NAME_LEN {
        return Err(Error::config(format!(
            "Group name '{name}' exceeds {MAX_GROUP_NAME_LEN} characters"
        )));
    }
    if !is_valid_group_name(name) {
        return Err(Error::config(format!(
            "Group name '{name}' contains invalid characters (only a-z, A-Z, 0-9, -, _ allowed)"
        )));
    }
    Ok(())
}

/// Return the tickers named by an alert, rejecting ambiguous or empty input.
pub fn extract_tickers(alert: &Value, group: &str) -> Result<Vec<String>> {
    match (alert.get("tickers"), alert.get("ticker")) {
        (Some(_), Some(_)) => Err(Error::config(format!(
            "Alert in group '{group}' cannot define both 'ticker' and 'tickers'"
        ))),
        (Some(tickers), None) => {
            let invalid = || Error::config(format!("Alert in group '{group}' has invalid 'tickers'"));
            let list = tickers.as_array().filter(|l| !l.is_empty()).ok_or_else(invalid)?;
            list.iter()
                .map(|t| {
                    t.as_str()
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .ok_or_else(invalid)
                })
                .collect()
        }
        (None, Some(ticker)) => ticker
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.to_string()])
            .ok_or_else(|| Error::config(format!("Alert in group '{group}' has invalid 'ticker'"))),
        (None, None) => Err(Error::config(format!(
            "Alert in group '{group}' missing 'ticker' or 'tickers'"
        ))),
    }
}

fn validate_alert(alert: &Value, group: &str, registry: &StrategyRegistry) -> Result<()> {
    let strategy_name = alert
        .get("strategy")
        .ok_or_else(|| Error::config(format!("Alert in group '{group}' missing 'strategy'")))?;

    let timeframe = alert
        .get("timeframe")
        .ok_or_else(|| Error::config(format!("Alert in group '{group}' missing 'timeframe'")))?;
    if !timeframe.as_str().is_some_and(Timeframe::is_valid) {
        return Err(Error::config(format!(
            "Alert in group '{group}' has invalid timeframe"
        )));
    }

    let tickers = extract_tickers(alert, group)?;

    let params: StrategyParams = match alert.get("params") {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        _ => {
            return Err(Error::config(format!(
                "Alert in group '{group}' missing 'params'"
            )))
        }
    };

    let name = strategy_name.as_str().unwrap_or_default();
    let strategy = registry.get(name).map_err(|_| {
        Error::config(format!(
            "Alert in group '{group}' has invalid strategy '{}'",
            strategy_name.as_str().map_or_else(|| strategy_name.to_string(), str::to_string)
        ))
    })?;

    strategy.validate(&params, group, &tickers)
}
