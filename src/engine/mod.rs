// Decision engine: one evaluation tick over the ledger
pub mod exits;
pub mod sizing;

pub use exits::ExitRules;
pub use sizing::{PositionSizing, SizingRule};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::{LedgerError, OracleError};
use crate::feed::MarketFeed;
use crate::models::{Action, Direction, ExitReason, Prediction, Signal};
use crate::oracle::PredictionOracle;
use crate::portfolio::{EntryContext, Portfolio, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Entry pass order
    pub symbols: Vec<String>,
    pub confidence_threshold: f64,
    pub max_positions: usize,
    pub exits: ExitRules,
    pub sizing: SizingRule,
    pub window_size: usize,
    pub model_type: String,
    pub strategy_tag: String,
    pub oracle_timeout: Duration,
}

impl From<&SessionConfig> for EngineConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            symbols: config.symbols.clone(),
            confidence_threshold: config.confidence_threshold,
            max_positions: config.max_positions,
            exits: ExitRules {
                stop_loss_pct: config.stop_loss_pct,
                take_profit_pct: config.take_profit_pct,
                max_holding: config.max_holding(),
            },
            sizing: SizingRule {
                mode: config.position_sizing,
                base_fraction: config.base_position_fraction,
            },
            window_size: config.window_size,
            model_type: config.oracle.model_type.clone(),
            strategy_tag: config.strategy_tag.clone(),
            oracle_timeout: config.oracle_timeout(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Running oracle counters for the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OracleStats {
    /// Successful predictions used by the entry pass
    pub predictions_consumed: usize,
    /// Errors and timeouts, either pass
    pub failures: usize,
}

/// What one tick did
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub opened: Vec<String>,
    pub closed: Vec<Trade>,
    /// Entries skipped by the risk check
    pub rejected: Vec<String>,
    pub signals: Vec<Signal>,
    pub oracle_failures: usize,
}

pub struct DecisionEngine<O> {
    oracle: O,
    config: EngineConfig,
    stats: OracleStats,
}

impl<O: PredictionOracle> DecisionEngine<O> {
    pub fn new(oracle: O, config: EngineConfig) -> Self {
        Self {
            oracle,
            config,
            stats: OracleStats::default(),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> OracleStats {
        self.stats
    }

    /// Run one tick: mark to market, exit pass, entry pass.
    ///
    /// Never fails. Oracle errors degrade to "no signal" for that symbol.
    pub async fn tick<F: MarketFeed + ?Sized>(
        &mut self,
        ledger: &mut Portfolio,
        feed: &F,
        now: DateTime<Utc>,
    ) -> TickReport {
        let failures_before = self.stats.failures;
        let mut report = TickReport::default();

        Self::mark_to_market(ledger, feed);

        let exits = self.exit_orders(ledger, feed, now).await;
        for (symbol, reason) in exits {
            if let Some(trade) = Self::execute_exit(ledger, &symbol, now, reason) {
                report.closed.push(trade);
            }
        }

        self.entry_pass(ledger, feed, now, &mut report).await;

        report.oracle_failures = self.stats.failures - failures_before;
        report
    }

    fn mark_to_market<F: MarketFeed + ?Sized>(ledger: &mut Portfolio, feed: &F) {
        let symbols: Vec<String> = ledger.positions().map(|p| p.symbol.clone()).collect();
        for symbol in symbols {
            match feed.latest_price(&symbol) {
                Some(price) => ledger.mark_price(&symbol, price),
                None => tracing::debug!(symbol = %symbol, "No price to mark position"),
            }
        }
    }

    /// Collect every exit before any close runs
    async fn exit_orders<F: MarketFeed + ?Sized>(
        &mut self,
        ledger: &Portfolio,
        feed: &F,
        now: DateTime<Utc>,
    ) -> Vec<(String, ExitReason)> {
        let mut orders = Vec::new();

        for position in ledger.positions() {
            if let Some(reason) = self.config.exits.check(position, now) {
                orders.push((position.symbol.clone(), reason));
                continue;
            }

            let Some(prediction) = self.query_oracle(feed, &position.symbol).await else {
                continue;
            };

            if prediction.confidence > self.config.confidence_threshold
                && prediction.direction.opposes(position.side)
            {
                orders.push((
                    position.symbol.clone(),
                    ExitReason::OracleExit {
                        confidence: prediction.confidence,
                    },
                ));
            }
        }

        orders
    }

    fn execute_exit(
        ledger: &mut Portfolio,
        symbol: &str,
        now: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<Trade> {
        let exit_price = ledger.position(symbol)?.current_price;

        match ledger.close(symbol, exit_price, now, reason) {
            Ok(trade) => {
                tracing::info!(
                    "🔴 Closed {} {} @ ${:.4} | P&L: ${:.2} ({:+.2}%) | {}",
                    trade.side,
                    trade.symbol,
                    trade.exit_price,
                    trade.pnl,
                    trade.pnl_pct,
                    reason
                );
                Some(trade)
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Exit skipped");
                None
            }
        }
    }

    async fn entry_pass<F: MarketFeed + ?Sized>(
        &mut self,
        ledger: &mut Portfolio,
        feed: &F,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let symbols = self.config.symbols.clone();

        for symbol in symbols {
            if ledger.open_count() >= self.config.max_positions {
                tracing::debug!(
                    open = ledger.open_count(),
                    max = self.config.max_positions,
                    "Max positions reached, skipping remaining entries"
                );
                break;
            }
            if ledger.has_position(&symbol) {
                continue;
            }

            let signal = self.entry_signal(feed, &symbol).await;
            report.signals.push(signal.clone());

            let (Some(side), Some(price)) = (signal.action.side(), signal.price) else {
                tracing::debug!(symbol = %symbol, reason = %signal.reason, "Hold");
                continue;
            };

            let size = self.config.sizing.position_value(
                ledger.total_value(),
                ledger.cash(),
                ledger.limits().max_position_size_pct,
                signal.confidence,
            );
            if size <= 0.0 || price <= 0.0 {
                tracing::debug!(symbol = %symbol, size, "Nothing to allocate");
                continue;
            }
            let quantity = size / price;

            if let Err(violation) = ledger.check_risk(price, quantity) {
                tracing::warn!(symbol = %symbol, %violation, "Entry rejected by risk limits");
                report.rejected.push(symbol);
                continue;
            }

            let entry = EntryContext {
                strategy: self.config.strategy_tag.clone(),
                confidence: signal.confidence,
                oracle_used: true,
            };

            let result = ledger.open_with(&symbol, side, price, quantity, now, entry);
            debug_assert!(
                !matches!(result, Err(LedgerError::DuplicatePosition { .. })),
                "entry pass tried to open {} twice",
                symbol
            );

            match result {
                Ok(_) => {
                    tracing::info!(
                        "🟢 Opened {} {} @ ${:.4} | Qty: {:.6} | Value: ${:.2} | {} ({:.1}%)",
                        side,
                        symbol,
                        price,
                        quantity,
                        size,
                        signal.reason,
                        signal.confidence * 100.0
                    );
                    report.opened.push(symbol);
                }
                Err(LedgerError::RiskRejected(violation)) => {
                    tracing::warn!(symbol = %symbol, %violation, "Entry rejected by risk limits");
                    report.rejected.push(symbol);
                }
                Err(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "Ledger refused entry");
                }
            }
        }
    }

    /// Entry decision for a flat symbol
    pub async fn entry_signal<F: MarketFeed + ?Sized>(&mut self, feed: &F, symbol: &str) -> Signal {
        let Some(price) = feed.latest_price(symbol) else {
            return Signal::hold(symbol, 0.0, "no_market_data");
        };

        let Some(prediction) = self.query_oracle(feed, symbol).await else {
            return Signal::hold(symbol, 0.0, "no_ai_prediction");
        };
        self.stats.predictions_consumed += 1;

        let confidence = prediction.confidence;
        if confidence < self.config.confidence_threshold {
            return Signal::hold(symbol, confidence, "low_ai_confidence");
        }

        let (action, reason) = match prediction.direction {
            Direction::Up => (Action::Buy, "ai_signal_up"),
            Direction::Down => (Action::Sell, "ai_signal_down"),
            Direction::Neutral => (Action::Hold, "ai_signal_neutral"),
        };

        Signal {
            symbol: symbol.to_string(),
            action,
            confidence,
            reason: reason.to_string(),
            price: Some(price),
        }
    }

    /// Bounded oracle call over the last `window_size` candles
    async fn query_oracle<F: MarketFeed + ?Sized>(
        &mut self,
        feed: &F,
        symbol: &str,
    ) -> Option<Prediction> {
        let window = feed.window(symbol, self.config.window_size);
        if window.is_empty() {
            return None;
        }

        let call = self
            .oracle
            .predict(&window, symbol, &self.config.model_type);

        let result = match tokio::time::timeout(self.config.oracle_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.config.oracle_timeout)),
        };

        match result {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                self.stats.failures += 1;
                tracing::warn!(symbol = %symbol, error = %e, "Oracle prediction failed, no signal");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{candles_from_closes, ReplayFeed};
    use crate::models::Side;
    use crate::oracle::{ScriptedOracle, ScriptedResponse};
    use crate::risk::RiskLimits;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn feed_at(now: DateTime<Utc>, prices: &[(&str, f64)]) -> ReplayFeed {
        let step = chrono::Duration::seconds(30);
        let history = prices
            .iter()
            .flat_map(|(symbol, price)| {
                candles_from_closes(symbol, &[*price, *price], now - step, step)
            })
            .collect();
        ReplayFeed::new(200).with_history(history)
    }

    fn config(symbols: &[&str]) -> EngineConfig {
        EngineConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn ledger() -> Portfolio {
        Portfolio::new(10000.0, RiskLimits::default())
    }

    #[tokio::test]
    async fn test_opens_long_on_confident_up() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 100.0)]);
        let oracle = ScriptedOracle::new().with_script("BTCUSDT", vec![ScriptedResponse::up(0.8)]);
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT"]));
        let mut pf = ledger();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert_eq!(report.opened, vec!["BTCUSDT"]);
        let position = pf.position("BTCUSDT").unwrap();
        assert_eq!(position.side, Side::Long);
        // 10000 * 0.15 * (0.5 + 0.8 * 0.5) = 1350
        assert_relative_eq!(position.quantity, 13.5, epsilon = 1e-9);
        assert_relative_eq!(pf.cash(), 8650.0, epsilon = 1e-9);
        assert_eq!(position.entry.strategy, "ai_oracle");
        assert!(position.entry.oracle_used);
        assert_eq!(engine.stats().predictions_consumed, 1);
    }

    #[tokio::test]
    async fn test_opens_short_on_confident_down() {
        let now = Utc::now();
        let feed = feed_at(now, &[("ETHUSDT", 3000.0)]);
        let oracle =
            ScriptedOracle::new().with_script("ETHUSDT", vec![ScriptedResponse::down(0.9)]);
        let mut engine = DecisionEngine::new(oracle, config(&["ETHUSDT"]));
        let mut pf = ledger();

        engine.tick(&mut pf, &feed, now).await;

        assert_eq!(pf.position("ETHUSDT").unwrap().side, Side::Short);
    }

    #[tokio::test]
    async fn test_low_confidence_holds() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 100.0)]);
        let oracle = ScriptedOracle::new().with_script("BTCUSDT", vec![ScriptedResponse::up(0.69)]);
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT"]));
        let mut pf = ledger();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert!(report.opened.is_empty());
        assert_eq!(report.signals[0].reason, "low_ai_confidence");
        assert_eq!(pf.cash(), 10000.0);
    }

    #[tokio::test]
    async fn test_neutral_and_missing_data_hold() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 100.0)]);
        let oracle =
            ScriptedOracle::new().with_script("BTCUSDT", vec![ScriptedResponse::neutral(0.95)]);
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT", "SOLUSDT"]));
        let mut pf = ledger();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert_eq!(report.signals[0].reason, "ai_signal_neutral");
        assert_eq!(report.signals[1].reason, "no_market_data");
        assert_eq!(pf.open_count(), 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_does_not_abort_tick() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 100.0), ("ETHUSDT", 3000.0)]);
        let oracle = ScriptedOracle::new()
            .with_script("BTCUSDT", vec![ScriptedResponse::Fail])
            .with_script("ETHUSDT", vec![ScriptedResponse::up(0.9)]);
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT", "ETHUSDT"]));
        let mut pf = ledger();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert_eq!(report.signals[0].reason, "no_ai_prediction");
        assert_eq!(report.opened, vec!["ETHUSDT"]);
        assert_eq!(report.oracle_failures, 1);
        assert_eq!(engine.stats().failures, 1);
        assert_eq!(engine.stats().predictions_consumed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_timeout_is_no_signal() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 100.0)]);
        let oracle = ScriptedOracle::new()
            .with_fallback(ScriptedResponse::up(0.99))
            .with_delay(Duration::from_secs(60));
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT"]));
        let mut pf = ledger();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert_eq!(report.signals[0].reason, "no_ai_prediction");
        assert_eq!(report.oracle_failures, 1);
        assert_eq!(pf.open_count(), 0);
    }

    #[tokio::test]
    async fn test_max_positions_rechecked_per_symbol() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 100.0), ("ETHUSDT", 3000.0)]);
        let oracle = ScriptedOracle::new().with_fallback(ScriptedResponse::up(0.9));
        let mut engine = DecisionEngine::new(
            oracle,
            EngineConfig {
                max_positions: 1,
                ..config(&["ETHUSDT", "BTCUSDT"])
            },
        );
        let mut pf = ledger();

        let report = engine.tick(&mut pf, &feed, now).await;

        // Config order decides who gets the slot
        assert_eq!(report.opened, vec!["ETHUSDT"]);
        assert_eq!(pf.open_count(), 1);
    }

    #[tokio::test]
    async fn test_max_holding_wins_over_stop_loss() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 90.0)]);
        let oracle = Arc::new(ScriptedOracle::new());
        let mut engine = DecisionEngine::new(oracle.clone(), config(&["BTCUSDT"]));
        let mut pf = ledger();
        pf.open(
            "BTCUSDT",
            Side::Long,
            100.0,
            10.0,
            now - chrono::Duration::hours(25),
        )
        .unwrap();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert_eq!(report.closed.len(), 1);
        assert_eq!(report.closed[0].exit_reason, ExitReason::MaxHoldingTime);
        assert_eq!(report.closed[0].exit_price, 90.0);
        // Exit pass never asked the oracle; only the entry pass did
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_short_stop_loss() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 106.0)]);
        let mut engine = DecisionEngine::new(ScriptedOracle::new(), config(&["BTCUSDT"]));
        let mut pf = ledger();
        pf.open("BTCUSDT", Side::Short, 100.0, 10.0, now).unwrap();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert_eq!(report.closed[0].exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(report.closed[0].pnl, -60.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_oracle_exit_requires_confidence_above_threshold() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 101.0)]);
        let oracle = ScriptedOracle::new().with_script(
            "BTCUSDT",
            vec![ScriptedResponse::down(0.7), ScriptedResponse::down(0.85)],
        );
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT"]));
        let mut pf = ledger();
        pf.open("BTCUSDT", Side::Long, 100.0, 10.0, now).unwrap();

        // Exactly at threshold: keep holding
        let first = engine.tick(&mut pf, &feed, now).await;
        assert!(first.closed.is_empty());
        assert!(pf.has_position("BTCUSDT"));

        let second = engine.tick(&mut pf, &feed, now).await;
        assert_eq!(
            second.closed[0].exit_reason,
            ExitReason::OracleExit { confidence: 0.85 }
        );
        assert!(!pf.has_position("BTCUSDT"));
    }

    #[tokio::test]
    async fn test_exit_pass_oracle_failure_keeps_position() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 101.0)]);
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_script("BTCUSDT", vec![ScriptedResponse::Fail])
                .with_fallback(ScriptedResponse::down(0.99)),
        );
        let mut engine = DecisionEngine::new(oracle.clone(), config(&["BTCUSDT"]));
        let mut pf = ledger();
        pf.open("BTCUSDT", Side::Long, 100.0, 10.0, now).unwrap();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert!(report.closed.is_empty());
        assert!(pf.has_position("BTCUSDT"));
        assert_eq!(report.oracle_failures, 1);
        assert_eq!(engine.stats().failures, 1);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_pass_oracle_timeout_keeps_position() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 101.0), ("ETHUSDT", 3000.0)]);
        let oracle = ScriptedOracle::new()
            .with_fallback(ScriptedResponse::down(0.99))
            .with_delay(Duration::from_secs(60));
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT", "ETHUSDT"]));
        let mut pf = ledger();
        pf.open("BTCUSDT", Side::Long, 100.0, 10.0, now).unwrap();

        let report = engine.tick(&mut pf, &feed, now).await;

        // Both the exit query and the ETHUSDT entry query time out
        assert!(report.closed.is_empty());
        assert!(pf.has_position("BTCUSDT"));
        assert_eq!(report.signals[0].reason, "no_ai_prediction");
        assert_eq!(report.oracle_failures, 2);
        assert_eq!(pf.open_count(), 1);
    }

    #[tokio::test]
    async fn test_short_closes_on_confident_up() {
        let now = Utc::now();
        let feed = feed_at(now, &[("ETHUSDT", 99.0)]);
        let oracle = ScriptedOracle::new().with_script("ETHUSDT", vec![ScriptedResponse::up(0.85)]);
        let mut engine = DecisionEngine::new(oracle, config(&["ETHUSDT"]));
        let mut pf = ledger();
        pf.open("ETHUSDT", Side::Short, 100.0, 10.0, now).unwrap();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert_eq!(report.closed.len(), 1);
        assert_eq!(
            report.closed[0].exit_reason,
            ExitReason::OracleExit { confidence: 0.85 }
        );
        assert_relative_eq!(report.closed[0].pnl, 10.0, epsilon = 1e-9);
        assert!(!pf.has_position("ETHUSDT"));
    }

    #[tokio::test]
    async fn test_agreeing_prediction_keeps_position() {
        let now = Utc::now();
        let feed = feed_at(now, &[("BTCUSDT", 101.0)]);
        let oracle = ScriptedOracle::new().with_fallback(ScriptedResponse::up(0.95));
        let mut engine = DecisionEngine::new(oracle, config(&["BTCUSDT"]));
        let mut pf = ledger();
        pf.open("BTCUSDT", Side::Long, 100.0, 10.0, now).unwrap();

        let report = engine.tick(&mut pf, &feed, now).await;

        assert!(report.closed.is_empty());
        assert_eq!(pf.position("BTCUSDT").unwrap().current_price, 101.0);
        // Held symbol is not re-evaluated for entry
        assert!(report.signals.is_empty());
        assert_eq!(engine.stats().predictions_consumed, 0);
    }
}
