use serde::{Deserialize, Serialize};

use crate::portfolio::Trade;

/// Session performance, recomputed from the full trade history every tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Trade statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    // P&L distribution
    pub realized_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64, // mean of losing P&L, so <= 0
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64, // |avg_win / avg_loss|

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    // Oracle
    pub oracle_predictions: usize,
    pub oracle_successful_trades: usize,
    pub oracle_accuracy: f64,
}

impl PerformanceMetrics {
    pub fn from_trades(trades: &[Trade], initial_value: f64, oracle_predictions: usize) -> Self {
        let total_trades = trades.len();

        if total_trades == 0 {
            return Self {
                oracle_predictions,
                ..Default::default()
            };
        }

        let realized_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        let (wins, losses): (Vec<&Trade>, Vec<&Trade>) = trades.iter().partition(|t| t.is_win());
        let winning_trades = wins.len();
        let losing_trades = losses.len();
        let win_rate = (winning_trades as f64 / total_trades as f64) * 100.0;

        let avg_win = mean(wins.iter().map(|t| t.pnl));
        let avg_loss = mean(losses.iter().map(|t| t.pnl));

        let largest_win = wins.iter().map(|t| t.pnl).fold(0.0, f64::max);
        let largest_loss = losses.iter().map(|t| t.pnl).fold(0.0, f64::min);

        let profit_factor = if avg_loss != 0.0 {
            (avg_win / avg_loss).abs()
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) = calculate_drawdown(trades, initial_value);
        let sharpe_ratio = calculate_sharpe_ratio(trades);

        let oracle_successful_trades = wins.iter().filter(|t| t.oracle_used).count();
        let oracle_accuracy = if oracle_predictions > 0 {
            (oracle_successful_trades as f64 / oracle_predictions as f64) * 100.0
        } else {
            0.0
        };

        Self {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            realized_pnl,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            oracle_predictions,
            oracle_successful_trades,
            oracle_accuracy,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

/// Largest peak-to-trough drop of the realized equity curve
fn calculate_drawdown(trades: &[Trade], initial_value: f64) -> (f64, f64) {
    let mut peak = initial_value;
    let mut max_dd = 0.0;
    let mut max_dd_pct = 0.0;
    let mut equity = initial_value;

    for trade in trades {
        equity += trade.pnl;
        peak = f64::max(peak, equity);

        let drawdown = peak - equity;
        if drawdown > max_dd {
            max_dd = drawdown;
            max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
        }
    }

    (max_dd, max_dd_pct)
}

/// Per-trade Sharpe ratio over P&L%, zero risk-free rate
fn calculate_sharpe_ratio(trades: &[Trade]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
    let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| (r - mean_return).powi(2))
        .sum::<f64>()
        / returns.len() as f64;

    let std_dev = variance.sqrt();
    if std_dev > 0.0 {
        mean_return / std_dev
    } else {
        0.0
    }
}
