//! Configuration loading.
//! Mission: one explicit config record, no process-wide mutable state.
//!
//! Grounded in the teacher's `models::Config::from_env` (env-driven load
//! with sane defaults), generalized to spec §6's JSON-file-plus-env-overlay
//! shape and the original Python `config.py`'s default/merge semantics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::TradeError;

fn default_check_interval() -> u64 {
    3
}
fn default_min_profit_threshold() -> f64 {
    0.001
}
fn default_max_spread_threshold() -> f64 {
    0.0010
}
fn default_max_consecutive_losses() -> u32 {
    3
}
fn default_daily_loss_limit_pct() -> f64 {
    0.05
}
fn default_currencies() -> Vec<String> {
    vec![
        "USD".into(),
        "EUR".into(),
        "GBP".into(),
        "JPY".into(),
        "AUD".into(),
        "CAD".into(),
        "CHF".into(),
        "NZD".into(),
    ]
}
fn default_volatility_window() -> usize {
    20
}
fn default_risk_per_trade() -> RiskPerTrade {
    RiskPerTrade {
        small_account: 0.01,
        medium_account: 0.02,
        large_account: 0.03,
    }
}
fn default_session_multipliers() -> SessionMultipliers {
    SessionMultipliers {
        london_ny_overlap: 1.2,
        tokyo_london_overlap: 1.1,
        london: 1.0,
        new_york: 1.0,
        tokyo: 0.8,
        low_liquidity: 0.5,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPerTrade {
    #[serde(default = "default_small_account")]
    pub small_account: f64,
    #[serde(default = "default_medium_account")]
    pub medium_account: f64,
    #[serde(default = "default_large_account")]
    pub large_account: f64,
}
fn default_small_account() -> f64 {
    0.01
}
fn default_medium_account() -> f64 {
    0.02
}
fn default_large_account() -> f64 {
    0.03
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMultipliers {
    pub london_ny_overlap: f64,
    pub tokyo_london_overlap: f64,
    pub london: f64,
    pub new_york: f64,
    pub tokyo: f64,
    pub low_liquidity: f64,
}

/// Application configuration (spec §6). Unknown JSON keys are ignored;
/// missing `check_interval`/`min_profit_threshold` fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub account_id: Option<String>,
    #[serde(default)]
    pub practice_mode: bool,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_min_profit_threshold")]
    pub min_profit_threshold: f64,
    #[serde(default = "default_max_spread_threshold")]
    pub max_spread_threshold: f64,
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    #[serde(default = "default_daily_loss_limit_pct")]
    pub daily_loss_limit_pct: f64,
    #[serde(default = "default_currencies")]
    pub currencies_to_monitor: Vec<String>,
    pub max_runtime: Option<u64>,
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: RiskPerTrade,
    #[serde(default = "default_session_multipliers")]
    pub session_multipliers: SessionMultipliers,
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
    /// Unrecognized keys are accepted and ignored rather than rejected.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            account_id: None,
            practice_mode: true,
            check_interval: default_check_interval(),
            min_profit_threshold: default_min_profit_threshold(),
            max_spread_threshold: default_max_spread_threshold(),
            max_consecutive_losses: default_max_consecutive_losses(),
            daily_loss_limit_pct: default_daily_loss_limit_pct(),
            currencies_to_monitor: default_currencies(),
            max_runtime: None,
            risk_per_trade: default_risk_per_trade(),
            session_multipliers: default_session_multipliers(),
            volatility_window: default_volatility_window(),
            extra: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for
    /// missing keys. If the file does not exist, write a sample config
    /// alongside it (mirrors `original_source/config.py::save_sample_config`)
    /// and proceed with defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!(
                "configuration file {} not found, using defaults",
                path.display()
            );
            Self::write_sample(path);
            return Self::default();
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("error reading {}: {e}, using defaults", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str::<Config>(&raw) {
            Ok(mut cfg) => {
                cfg.validate();
                info!("loaded configuration from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "error parsing {}: {e}, using default configuration",
                    path.display()
                );
                Self::default()
            }
        }
    }

    fn validate(&mut self) {
        if self.check_interval < 1 {
            warn!("invalid check_interval, using default");
            self.check_interval = default_check_interval();
        }
        if self.min_profit_threshold < 0.0 {
            warn!("invalid min_profit_threshold, using default");
            self.min_profit_threshold = default_min_profit_threshold();
        }
    }

    fn write_sample(path: &Path) {
        let sample = serde_json::json!({
            "api_key": "YOUR_OANDA_API_KEY_HERE",
            "account_id": "YOUR_OANDA_ACCOUNT_ID_HERE",
            "practice_mode": true,
            "check_interval": 3,
            "min_profit_threshold": 0.001,
            "max_runtime": serde_json::Value::Null,
            "currencies_to_monitor": default_currencies(),
        });
        match serde_json::to_string_pretty(&sample) {
            Ok(body) => {
                if let Err(e) = std::fs::write(path, body) {
                    warn!("error creating sample configuration file: {e}");
                } else {
                    info!("created sample configuration file at {}", path.display());
                }
            }
            Err(e) => warn!("error serializing sample configuration: {e}"),
        }
    }

    /// Resolve credentials from config, then environment overrides (spec §6).
    pub fn credentials(&self) -> Result<(String, String), TradeError> {
        let api_key = std::env::var("OANDA_API_KEY")
            .ok()
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                TradeError::Config("API key must be provided in config or OANDA_API_KEY".into())
            })?;
        let account_id = std::env::var("OANDA_ACCOUNT_ID")
            .ok()
            .or_else(|| self.account_id.clone())
            .ok_or_else(|| {
                TradeError::Config(
                    "account ID must be provided in config or OANDA_ACCOUNT_ID".into(),
                )
            })?;
        Ok((api_key, account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_keys_fall_back_to_defaults() {
        let mut cfg: Config = serde_json::from_str("{}").unwrap();
        cfg.validate();
        assert_eq!(cfg.check_interval, 3);
        assert!((cfg.min_profit_threshold - 0.001).abs() < 1e-12);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg: Config =
            serde_json::from_str(r#"{"check_interval": 5, "totally_unknown_key": 42}"#).unwrap();
        assert_eq!(cfg.check_interval, 5);
    }
}
