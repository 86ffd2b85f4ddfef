use std::time::Duration;

use crate::risk::RiskViolation;

/// Failures of the four ledger mutations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("risk check rejected order: {0}")]
    RiskRejected(RiskViolation),

    #[error("already have open position for {symbol}")]
    DuplicatePosition { symbol: String },

    #[error("no open position for {symbol}")]
    NoPosition { symbol: String },
}

/// Prediction oracle failures. All of them degrade to "no signal" mid-session.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("oracle response decode error: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration value {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("prediction oracle failed its startup health check")]
    OracleUnavailable,

    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
