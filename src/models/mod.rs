use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candlestick for one symbol at one point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Direction of an open exposure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional call returned by the prediction oracle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    /// Parse the oracle's wire value. Anything unrecognised is neutral.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UP" => Direction::Up,
            "DOWN" => Direction::Down,
            _ => Direction::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Neutral => "NEUTRAL",
        }
    }

    /// True when this call argues against holding `side`
    pub fn opposes(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (Direction::Down, Side::Long) | (Direction::Up, Side::Short)
        )
    }
}

/// One oracle answer for a symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub symbol: String,
    pub direction: Direction,
    /// Always within [0, 1]
    pub confidence: f64,
    pub model_type: String,
}

impl Prediction {
    pub fn new(symbol: &str, direction: Direction, confidence: f64, model_type: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            model_type: model_type.to_string(),
        }
    }
}

/// Trading action carried by a signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// Side of the position this action would open, if any
    pub fn side(&self) -> Option<Side> {
        match self {
            Action::Buy => Some(Side::Long),
            Action::Sell => Some(Side::Short),
            Action::Hold => None,
        }
    }
}

/// Per-tick, per-symbol entry decision. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    pub confidence: f64,
    pub reason: String,
    /// Price the signal was evaluated at
    pub price: Option<f64>,
}

impl Signal {
    pub fn hold(symbol: &str, confidence: f64, reason: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: Action::Hold,
            confidence,
            reason: reason.to_string(),
            price: None,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    MaxHoldingTime,
    StopLoss,
    TakeProfit,
    #[serde(rename = "ai_exit_signal")]
    OracleExit { confidence: f64 },
    SessionEnd,
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::MaxHoldingTime => "max_holding_time",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::OracleExit { .. } => "ai_exit_signal",
            ExitReason::SessionEnd => "session_end",
            ExitReason::Manual => "manual",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::OracleExit { confidence } => {
                write!(f, "ai_exit_signal (confidence: {:.1}%)", confidence * 100.0)
            }
            other => f.write_str(other.as_str()),
        }
    }
}
