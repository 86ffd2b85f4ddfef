use chrono::{DateTime, Duration, Utc};

use crate::models::{ExitReason, Side};
use crate::portfolio::Position;

/// Price and time based exit conditions, evaluated before the oracle is asked
#[derive(Debug, Clone, PartialEq)]
pub struct ExitRules {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_holding: Duration,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
            max_holding: Duration::hours(24),
        }
    }
}

impl ExitRules {
    /// First rule that fires for `position` at `now`, if any.
    ///
    /// Max holding time is checked first and wins over everything else.
    pub fn check(&self, position: &Position, now: DateTime<Utc>) -> Option<ExitReason> {
        if now - position.entry_time > self.max_holding {
            return Some(ExitReason::MaxHoldingTime);
        }

        let entry = position.entry_price;
        let current = position.current_price;

        match position.side {
            Side::Long => {
                if current <= entry * (1.0 - self.stop_loss_pct) {
                    Some(ExitReason::StopLoss)
                } else if current >= entry * (1.0 + self.take_profit_pct) {
                    Some(ExitReason::TakeProfit)
                } else {
                    None
                }
            }
            // Mirror of the long bounds
            Side::Short => {
                if current >= entry * (1.0 + self.stop_loss_pct) {
                    Some(ExitReason::StopLoss)
                } else if current <= entry * (1.0 - self.take_profit_pct) {
                    Some(ExitReason::TakeProfit)
                } else {
                    None
                }
            }
        }
    }
}
