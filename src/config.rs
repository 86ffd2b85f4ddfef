//! Layered session configuration: defaults, optional TOML file, then
//! `PAPERTRADER__*` environment variables.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::risk::RiskLimits;

/// Longest accepted duration for any `*_secs` setting (ten years)
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Most retries the oracle client will attempt per request
pub const MAX_ORACLE_RETRIES: u32 = 10;

/// How entry size is derived from the base allocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizing {
    /// Always the base fraction of total value
    Fixed,
    /// Base fraction scaled by 0.5 + confidence × 0.5
    ConfidenceAdaptive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model_type: String,
    pub prediction_horizon: String,
    pub timeframe: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub requests_per_minute: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            model_type: "ensemble".to_string(),
            prediction_horizon: "1h".to_string(),
            timeframe: "1m".to_string(),
            request_timeout_secs: 30,
            max_retries: 2,
            requests_per_minute: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub initial_cash: f64,
    pub symbols: Vec<String>,
    pub confidence_threshold: f64,
    pub max_positions: usize,
    pub max_position_size_fraction: f64,
    pub max_total_exposure_fraction: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_holding_secs: u64,
    pub tick_interval_secs: u64,
    pub session_duration_secs: u64,
    pub base_position_fraction: f64,
    pub position_sizing: PositionSizing,
    pub window_size: usize,
    pub strategy_tag: String,
    pub oracle_timeout_secs: u64,
    pub seed: Option<u64>,
    pub oracle: OracleConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_cash: 10000.0,
            symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "SOLUSDT".to_string(),
            ],
            confidence_threshold: 0.7,
            max_positions: 3,
            max_position_size_fraction: 0.2,
            max_total_exposure_fraction: 0.8,
            stop_loss_pct: 0.05,   // 5% stop loss
            take_profit_pct: 0.10, // 10% take profit
            max_holding_secs: 24 * 60 * 60,
            tick_interval_secs: 30,
            session_duration_secs: 10 * 60,
            base_position_fraction: 0.15,
            position_sizing: PositionSizing::ConfidenceAdaptive,
            window_size: 50,
            strategy_tag: "ai_oracle".to_string(),
            oracle_timeout_secs: 10,
            seed: None,
            oracle: OracleConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load defaults, then `path` if it exists, then `PAPERTRADER__*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("PAPERTRADER")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("symbols")
                .try_parsing(true)
                .ignore_empty(true),
        );

        let mut config: SessionConfig = builder.build()?.try_deserialize()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Upper-case symbols and drop repeats, keeping first occurrence
    pub fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.symbols = self
            .symbols
            .iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                key,
                reason: reason.into(),
            }
        }

        fn unit_interval(key: &'static str, value: f64) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(invalid(key, format!("{} is outside [0, 1]", value)))
            }
        }

        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(invalid("initial_cash", "must be positive"));
        }
        if self.symbols.is_empty() {
            return Err(invalid("symbols", "at least one symbol is required"));
        }
        if self.max_positions == 0 {
            return Err(invalid("max_positions", "must be at least 1"));
        }
        if self.tick_interval_secs == 0 {
            return Err(invalid("tick_interval_secs", "must be at least 1"));
        }
        if self.window_size == 0 {
            return Err(invalid("window_size", "must be at least 1"));
        }
        if self.oracle_timeout_secs == 0 {
            return Err(invalid("oracle_timeout_secs", "must be at least 1"));
        }

        for (key, secs) in [
            ("max_holding_secs", self.max_holding_secs),
            ("tick_interval_secs", self.tick_interval_secs),
            ("session_duration_secs", self.session_duration_secs),
            ("oracle_timeout_secs", self.oracle_timeout_secs),
            ("oracle.request_timeout_secs", self.oracle.request_timeout_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(invalid(
                    key,
                    format!("{} exceeds the {}s maximum", secs, MAX_DURATION_SECS),
                ));
            }
        }
        if self.oracle.max_retries > MAX_ORACLE_RETRIES {
            return Err(invalid(
                "oracle.max_retries",
                format!("must be at most {}", MAX_ORACLE_RETRIES),
            ));
        }

        unit_interval("confidence_threshold", self.confidence_threshold)?;
        unit_interval("max_position_size_fraction", self.max_position_size_fraction)?;
        unit_interval("max_total_exposure_fraction", self.max_total_exposure_fraction)?;
        unit_interval("stop_loss_pct", self.stop_loss_pct)?;
        unit_interval("take_profit_pct", self.take_profit_pct)?;
        unit_interval("base_position_fraction", self.base_position_fraction)?;

        Ok(())
    }

    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits {
            max_position_size_pct: self.max_position_size_fraction,
            max_total_exposure_pct: self.max_total_exposure_fraction,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn max_holding(&self) -> chrono::Duration {
        chrono_secs(self.max_holding_secs)
    }

    /// Simulated time between ticks
    pub fn tick_step(&self) -> chrono::Duration {
        chrono_secs(self.tick_interval_secs)
    }
}

// Clamped so unvalidated values can neither wrap nor overflow chrono's range
fn chrono_secs(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}
