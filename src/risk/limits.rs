use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute slack for float rounding when comparing order value to a cap
pub const RISK_EPSILON: f64 = 1e-9;

/// Fixed risk parameters applied to every open
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskLimits {
    /// Max fraction of total value committed to one position
    pub max_position_size_pct: f64,
    /// Max fraction of total value committed across all positions
    pub max_total_exposure_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size_pct: 0.20,  // 20% per position
            max_total_exposure_pct: 0.80, // 80% in aggregate
        }
    }
}

/// Account figures a risk check is evaluated against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub cash: f64,
    pub total_value: f64,
    /// Notional currently committed to open positions
    pub exposure: f64,
}

/// Which invariant an order would break
#[derive(Debug, Clone, PartialEq)]
pub enum RiskViolation {
    InvalidOrder { price: f64, quantity: f64 },
    PositionSizeLimit { value: f64, limit: f64 },
    ExposureLimit { exposure: f64, limit: f64 },
    InsufficientCash { value: f64, cash: f64 },
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskViolation::InvalidOrder { price, quantity } => {
                write!(f, "invalid order (price {}, quantity {})", price, quantity)
            }
            RiskViolation::PositionSizeLimit { value, limit } => {
                write!(f, "position value ${:.2} exceeds cap ${:.2}", value, limit)
            }
            RiskViolation::ExposureLimit { exposure, limit } => {
                write!(f, "exposure ${:.2} would exceed cap ${:.2}", exposure, limit)
            }
            RiskViolation::InsufficientCash { value, cash } => {
                write!(f, "position value ${:.2} exceeds cash ${:.2}", value, cash)
            }
        }
    }
}

impl RiskLimits {
    /// Check a prospective position of `price * quantity` against all three caps.
    ///
    /// Pure: depends only on its arguments.
    pub fn check(
        &self,
        account: &AccountState,
        price: f64,
        quantity: f64,
    ) -> Result<(), RiskViolation> {
        if !(price.is_finite() && quantity.is_finite()) || price <= 0.0 || quantity <= 0.0 {
            return Err(RiskViolation::InvalidOrder { price, quantity });
        }

        let value = price * quantity;

        // Check per-position cap
        let position_limit = account.total_value * self.max_position_size_pct;
        if value > position_limit + RISK_EPSILON {
            return Err(RiskViolation::PositionSizeLimit {
                value,
                limit: position_limit,
            });
        }

        // Check aggregate exposure cap
        let exposure_limit = account.total_value * self.max_total_exposure_pct;
        let exposure = account.exposure + value;
        if exposure > exposure_limit + RISK_EPSILON {
            return Err(RiskViolation::ExposureLimit {
                exposure,
                limit: exposure_limit,
            });
        }

        // Check cash
        if value > account.cash + RISK_EPSILON {
            return Err(RiskViolation::InsufficientCash {
                value,
                cash: account.cash,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_account() -> AccountState {
        AccountState {
            cash: 10000.0,
            total_value: 10000.0,
            exposure: 0.0,
        }
    }

    #[test]
    fn test_accepts_within_limits() {
        let limits = RiskLimits::default();
        // 1500 <= 2000 cap, <= cash
        assert!(limits.check(&fresh_account(), 100.0, 15.0).is_ok());
    }

    #[test]
    fn test_accepts_exactly_at_cap() {
        let limits = RiskLimits::default();
        assert!(limits.check(&fresh_account(), 100.0, 20.0).is_ok());
    }

    #[test]
    fn test_position_size_limit() {
        let limits = RiskLimits::default();
        let result = limits.check(&fresh_account(), 100.0, 25.0);
        assert_eq!(
            result,
            Err(RiskViolation::PositionSizeLimit {
                value: 2500.0,
                limit: 2000.0
            })
        );
    }

    #[test]
    fn test_exposure_limit() {
        let limits = RiskLimits::default();
        let account = AccountState {
            cash: 3000.0,
            total_value: 10000.0,
            exposure: 7000.0,
        };

        let result = limits.check(&account, 100.0, 15.0);
        assert!(matches!(result, Err(RiskViolation::ExposureLimit { .. })));
    }

    #[test]
    fn test_insufficient_cash() {
        let limits = RiskLimits {
            max_position_size_pct: 1.0,
            max_total_exposure_pct: 1.0,
        };
        let account = AccountState {
            cash: 500.0,
            total_value: 10000.0,
            exposure: 0.0,
        };

        let result = limits.check(&account, 100.0, 6.0);
        assert!(matches!(result, Err(RiskViolation::InsufficientCash { .. })));
    }

    #[test]
    fn test_rejects_degenerate_orders() {
        let limits = RiskLimits::default();
        assert!(matches!(
            limits.check(&fresh_account(), 0.0, 1.0),
            Err(RiskViolation::InvalidOrder { .. })
        ));
        assert!(matches!(
            limits.check(&fresh_account(), 100.0, -1.0),
            Err(RiskViolation::InvalidOrder { .. })
        ));
        assert!(matches!(
            limits.check(&fresh_account(), f64::NAN, 1.0),
            Err(RiskViolation::InvalidOrder { .. })
        ));
    }
}
