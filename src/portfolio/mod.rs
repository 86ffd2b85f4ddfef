// Portfolio ledger: cash, open positions and trade history
pub mod position;

pub use position::{EntryContext, Position, Trade};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{ExitReason, Side};
use crate::risk::{AccountState, RiskLimits, RiskViolation};

/// Single owner of all mutable financial state.
///
/// Positions are keyed by symbol in a `BTreeMap`, so there is at most one per
/// symbol and iteration order is stable across runs.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_cash: f64,
    cash: f64,
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    limits: RiskLimits,
}

impl Portfolio {
    pub fn new(initial_cash: f64, limits: RiskLimits) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            limits,
        }
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Open positions in symbol order
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Completed trades, oldest first
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Sum of open notional at current marks
    pub fn exposure(&self) -> f64 {
        self.positions.values().map(Position::notional).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.positions.values().map(Position::market_value).sum::<f64>()
    }

    pub fn total_pnl(&self) -> f64 {
        self.total_value() - self.initial_cash
    }

    pub fn total_pnl_pct(&self) -> f64 {
        if self.initial_cash > 0.0 {
            self.total_pnl() / self.initial_cash * 100.0
        } else {
            0.0
        }
    }

    pub fn exposure_percent(&self) -> f64 {
        let total_value = self.total_value();
        if total_value > 0.0 {
            self.exposure() / total_value * 100.0
        } else {
            0.0
        }
    }

    fn account_state(&self) -> AccountState {
        AccountState {
            cash: self.cash,
            total_value: self.total_value(),
            exposure: self.exposure(),
        }
    }

    /// Risk check for a prospective open, naming the violated cap
    pub fn check_risk(&self, price: f64, quantity: f64) -> Result<(), RiskViolation> {
        self.limits.check(&self.account_state(), price, quantity)
    }

    /// Pure predicate over position size, aggregate exposure and cash caps
    pub fn can_open(&self, symbol: &str, price: f64, quantity: f64) -> bool {
        match self.check_risk(price, quantity) {
            Ok(()) => true,
            Err(violation) => {
                tracing::debug!(symbol = %symbol, %violation, "Open would violate risk limits");
                false
            }
        }
    }

    /// Open a position with no oracle context
    pub fn open(
        &mut self,
        symbol: &str,
        side: Side,
        price: f64,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.open_with(symbol, side, price, quantity, now, EntryContext::default())
            .map(|_| ())
    }

    /// Open a position, recording how the entry was justified.
    ///
    /// All checks run before any mutation.
    pub fn open_with(
        &mut self,
        symbol: &str,
        side: Side,
        price: f64,
        quantity: f64,
        now: DateTime<Utc>,
        entry: EntryContext,
    ) -> Result<Uuid, LedgerError> {
        if self.has_position(symbol) {
            return Err(LedgerError::DuplicatePosition {
                symbol: symbol.to_string(),
            });
        }

        self.check_risk(price, quantity)
            .map_err(LedgerError::RiskRejected)?;

        let cost = price * quantity;
        // check_risk tolerates RISK_EPSILON over cash; never let that go negative
        self.cash = (self.cash - cost).max(0.0);

        let id = Uuid::new_v4();
        self.positions.insert(
            symbol.to_string(),
            Position {
                id,
                symbol: symbol.to_string(),
                side,
                quantity,
                entry_price: price,
                current_price: price,
                entry_time: now,
                entry,
            },
        );

        Ok(id)
    }

    /// Mark an open position to `price`. No-op when nothing is open.
    pub fn mark_price(&mut self, symbol: &str, price: f64) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.current_price = price;
        }
    }

    /// Close the open position for `symbol` at `exit_price` and record the trade
    pub fn close(
        &mut self,
        symbol: &str,
        exit_price: f64,
        now: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Trade, LedgerError> {
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| LedgerError::NoPosition {
                symbol: symbol.to_string(),
            })?;

        let pnl = position.pnl_at(exit_price);
        let cost_basis = position.cost_basis();
        let pnl_pct = if cost_basis > 0.0 {
            pnl / cost_basis * 100.0
        } else {
            0.0
        };

        // pnl_at floors short losses at the collateral, so this is never negative
        self.cash += cost_basis + pnl;

        let trade = Trade {
            id: Uuid::new_v4(),
            position_id: position.id,
            symbol: position.symbol,
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            entry_time: position.entry_time,
            exit_time: now,
            pnl,
            pnl_pct,
            exit_reason: reason,
            strategy: position.entry.strategy,
            confidence: position.entry.confidence,
            oracle_used: position.entry.oracle_used,
        };

        self.trades.push(trade.clone());
        Ok(trade)
    }
}
