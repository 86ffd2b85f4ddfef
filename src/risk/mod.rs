// Risk management module
pub mod limits;

pub use limits::{AccountState, RiskLimits, RiskViolation, RISK_EPSILON};
