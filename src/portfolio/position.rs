use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ExitReason, Side};

/// How an entry was justified, carried onto the eventual trade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryContext {
    pub strategy: String,
    pub confidence: f64,
    pub oracle_used: bool,
}

impl Default for EntryContext {
    fn default() -> Self {
        Self {
            strategy: "manual".to_string(),
            confidence: 0.0,
            oracle_used: false,
        }
    }
}

/// Open exposure in one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64, // marked to market every tick
    pub entry_time: DateTime<Utc>,
    pub entry: EntryContext,
}

impl Position {
    /// Cash committed when the position was opened
    pub fn cost_basis(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Notional at the current mark, used for exposure
    pub fn notional(&self) -> f64 {
        self.current_price * self.quantity
    }

    /// Side-dependent P&L at `price`.
    ///
    /// A short can lose at most its collateral, so `cost_basis() + pnl_at(p)`
    /// is never negative for any non-negative price.
    pub fn pnl_at(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) * self.quantity,
            Side::Short => ((self.entry_price - price) * self.quantity).max(-self.cost_basis()),
        }
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.pnl_at(self.current_price)
    }

    pub fn unrealized_pnl_pct(&self) -> f64 {
        let basis = self.cost_basis();
        if basis > 0.0 {
            self.unrealized_pnl() / basis * 100.0
        } else {
            0.0
        }
    }

    /// Cash the position would return if closed at the current mark.
    ///
    /// Equals `current_price * quantity` for longs; shorts return their
    /// committed collateral plus P&L, floored at zero.
    pub fn market_value(&self) -> f64 {
        self.cost_basis() + self.unrealized_pnl()
    }
}

/// Completed round trip. Append-only, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub position_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
    pub strategy: String,
    pub confidence: f64,
    pub oracle_used: bool,
}

impl Trade {
    pub fn holding_period_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
