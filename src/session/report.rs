use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PerformanceMetrics;
use crate::engine::OracleStats;
use crate::models::Side;
use crate::portfolio::{Portfolio, Trade};

/// Why the tick loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    Deadline,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionView {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
}

/// Per-tick view of the ledger for external consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
    pub cash: f64,
    pub total_pnl: f64,
    pub total_pnl_pct: f64,
    pub exposure_pct: f64,
    pub positions: Vec<PositionView>,
    pub metrics: PerformanceMetrics,
}

impl StatusSnapshot {
    pub fn capture(
        tick: u64,
        timestamp: DateTime<Utc>,
        ledger: &Portfolio,
        metrics: &PerformanceMetrics,
    ) -> Self {
        let positions = ledger
            .positions()
            .map(|p| PositionView {
                symbol: p.symbol.clone(),
                side: p.side,
                quantity: p.quantity,
                entry_price: p.entry_price,
                current_price: p.current_price,
                unrealized_pnl: p.unrealized_pnl(),
                unrealized_pnl_pct: p.unrealized_pnl_pct(),
            })
            .collect();

        Self {
            tick,
            timestamp,
            total_value: ledger.total_value(),
            cash: ledger.cash(),
            total_pnl: ledger.total_pnl(),
            total_pnl_pct: ledger.total_pnl_pct(),
            exposure_pct: ledger.exposure_percent(),
            positions,
            metrics: metrics.clone(),
        }
    }
}

/// Emitted once the session reaches `stopped`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub initial_cash: f64,
    pub final_value: f64,
    pub cash: f64,
    pub total_pnl: f64,
    pub total_pnl_pct: f64,
    pub ticks: u64,
    pub stop_cause: StopCause,
    pub oracle: OracleStats,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
}

pub fn log_status(snapshot: &StatusSnapshot) {
    tracing::info!("📊 Portfolio Status (tick {}):", snapshot.tick);
    tracing::info!("   💰 Total Value: ${:.2}", snapshot.total_value);
    tracing::info!("   💵 Cash: ${:.2}", snapshot.cash);
    tracing::info!(
        "   📈 Total P&L: ${:+.2} ({:+.2}%)",
        snapshot.total_pnl,
        snapshot.total_pnl_pct
    );
    tracing::info!("   📊 Exposure: {:.1}%", snapshot.exposure_pct);
    tracing::info!("   🎯 Open Positions: {}", snapshot.positions.len());

    for p in &snapshot.positions {
        let marker = if p.unrealized_pnl > 0.0 { "🟢" } else { "🔴" };
        tracing::info!(
            "      {} {} {}: {:.6} @ ${:.2} (P&L: ${:+.2})",
            marker,
            p.side,
            p.symbol,
            p.quantity,
            p.entry_price,
            p.unrealized_pnl
        );
    }

    let m = &snapshot.metrics;
    if m.total_trades > 0 {
        tracing::info!(
            "   📊 Performance: {} trades, {:.1}% win rate, {:.1}% oracle accuracy",
            m.total_trades,
            m.win_rate,
            m.oracle_accuracy
        );
    }
}

pub fn log_summary(summary: &SessionSummary) {
    let m = &summary.metrics;

    tracing::info!("🏁 Session complete ({:?} after {} ticks)", summary.stop_cause, summary.ticks);
    tracing::info!("💰 Final Portfolio Value: ${:.2}", summary.final_value);
    tracing::info!(
        "📈 Total Return: ${:+.2} ({:+.2}%)",
        summary.total_pnl,
        summary.total_pnl_pct
    );
    tracing::info!("🎯 Total Trades: {}", m.total_trades);

    if m.total_trades > 0 {
        tracing::info!("🏆 Win Rate: {:.1}%", m.win_rate);
        tracing::info!("💡 Average Win: ${:.2}", m.avg_win);
        tracing::info!("💔 Average Loss: ${:.2}", m.avg_loss);
        tracing::info!("⚖️ Profit Factor: {:.2}", m.profit_factor);
        tracing::info!("📉 Max Drawdown: ${:.2} ({:.2}%)", m.max_drawdown, m.max_drawdown_pct);
        tracing::info!("📐 Sharpe Ratio: {:.2}", m.sharpe_ratio);
    }

    tracing::info!("🤖 Oracle predictions: {}", summary.oracle.predictions_consumed);
    tracing::info!("   Oracle failures: {}", summary.oracle.failures);
    tracing::info!("   Oracle accuracy: {:.1}%", m.oracle_accuracy);
    tracing::info!("   Winning oracle trades: {}", m.oracle_successful_trades);

    if summary.trades.is_empty() {
        return;
    }

    tracing::info!("📝 Trade History:");
    let skip = summary.trades.len().saturating_sub(10);
    for (i, trade) in summary.trades.iter().skip(skip).enumerate() {
        let marker = if trade.is_win() { "🟢" } else { "🔴" };
        tracing::info!(
            "   {:2}. {} {} {}: ${:+.2} ({:+.1}%) | confidence {:.1}% | held {}m | {}",
            i + 1,
            marker,
            trade.side.as_str().to_uppercase(),
            trade.symbol,
            trade.pnl,
            trade.pnl_pct,
            trade.confidence * 100.0,
            trade.holding_period_minutes(),
            trade.exit_reason
        );
    }
}
