use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::report::{log_status, log_summary, SessionSummary, StatusSnapshot, StopCause};
use super::PerformanceMetrics;
use crate::config::SessionConfig;
use crate::engine::{DecisionEngine, EngineConfig, TickReport};
use crate::error::SessionError;
use crate::feed::MarketFeed;
use crate::models::ExitReason;
use crate::oracle::PredictionOracle;
use crate::portfolio::Portfolio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Draining => "draining",
            SessionState::Stopped => "stopped",
        }
    }
}

/// Owns the ledger and drives the engine for a bounded session
pub struct SessionController<O, F> {
    config: SessionConfig,
    engine: DecisionEngine<O>,
    feed: F,
    ledger: Portfolio,
    state: SessionState,
    ticks: u64,
    /// Simulated market time, taken from candle timestamps
    clock: DateTime<Utc>,
    metrics: PerformanceMetrics,
    snapshots: Option<mpsc::Sender<StatusSnapshot>>,
}

impl<O: PredictionOracle, F: MarketFeed> SessionController<O, F> {
    pub fn new(config: SessionConfig, oracle: O, feed: F) -> Self {
        let clock = config
            .symbols
            .iter()
            .filter_map(|s| feed.window(s, 1).pop().map(|c| c.timestamp))
            .max()
            .unwrap_or_else(Utc::now);

        Self {
            engine: DecisionEngine::new(oracle, EngineConfig::from(&config)),
            ledger: Portfolio::new(config.initial_cash, config.risk_limits()),
            config,
            feed,
            state: SessionState::Idle,
            ticks: 0,
            clock,
            metrics: PerformanceMetrics::default(),
            snapshots: None,
        }
    }

    /// Push a snapshot to `tx` after every tick
    pub fn with_snapshots(mut self, tx: mpsc::Sender<StatusSnapshot>) -> Self {
        self.snapshots = Some(tx);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn ledger(&self) -> &Portfolio {
        &self.ledger
    }

    /// Ledger access before the session starts (seeding positions)
    pub fn ledger_mut(&mut self) -> &mut Portfolio {
        &mut self.ledger
    }

    pub fn engine(&self) -> &DecisionEngine<O> {
        &self.engine
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    /// idle → running, only with a healthy oracle
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Idle)?;

        if !self.engine.oracle().health_check().await {
            tracing::error!("❌ Prediction oracle is not healthy, session not started");
            return Err(SessionError::OracleUnavailable);
        }

        tracing::info!(
            symbols = ?self.config.symbols,
            initial_cash = self.config.initial_cash,
            "🚀 Session started"
        );
        self.state = SessionState::Running;
        Ok(())
    }

    /// Advance the feed, run one engine tick, refresh metrics and emit a snapshot
    pub async fn tick(&mut self) -> Result<TickReport, SessionError> {
        self.expect_state(SessionState::Running)?;

        let mut newest: Option<DateTime<Utc>> = None;
        for symbol in &self.config.symbols {
            if let Some(candle) = self.feed.next_candle(symbol) {
                newest = Some(newest.map_or(candle.timestamp, |t| t.max(candle.timestamp)));
            }
        }
        self.clock = match newest {
            Some(ts) if ts > self.clock => ts,
            _ => self.clock + self.config.tick_step(),
        };

        let report = self.engine.tick(&mut self.ledger, &self.feed, self.clock).await;
        self.ticks += 1;

        self.refresh_metrics();
        let snapshot = StatusSnapshot::capture(self.ticks, self.clock, &self.ledger, &self.metrics);
        log_status(&snapshot);
        self.emit(snapshot);

        Ok(report)
    }

    fn refresh_metrics(&mut self) {
        self.metrics = PerformanceMetrics::from_trades(
            self.ledger.trades(),
            self.ledger.initial_cash(),
            self.engine.stats().predictions_consumed,
        );
    }

    fn emit(&mut self, snapshot: StatusSnapshot) {
        let Some(tx) = &self.snapshots else {
            return;
        };

        match tx.try_send(snapshot) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("Snapshot channel full, dropping snapshot");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Snapshot receiver gone");
                self.snapshots = None;
            }
        }
    }

    /// Start if needed, tick until the deadline or `stop` flips to true, then drain
    pub async fn run(
        &mut self,
        mut stop: watch::Receiver<bool>,
    ) -> Result<SessionSummary, SessionError> {
        if self.state == SessionState::Idle {
            self.start().await?;
        }
        self.expect_state(SessionState::Running)?;

        let deadline = Instant::now() + self.config.session_duration();
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop_open = true;

        let cause = loop {
            if *stop.borrow() {
                break StopCause::Cancelled;
            }

            tokio::select! {
                biased;

                _ = tokio::time::sleep_until(deadline) => break StopCause::Deadline,

                changed = stop.changed(), if stop_open => {
                    if changed.is_err() {
                        // Sender dropped; only the deadline can end the session now
                        stop_open = false;
                    }
                }

                _ = interval.tick() => {
                    self.tick().await?;
                }
            }
        };

        tracing::info!(cause = ?cause, ticks = self.ticks, "Tick loop stopped");
        self.shutdown(cause)
    }

    /// running → draining → stopped: close everything at its last mark
    pub fn shutdown(&mut self, cause: StopCause) -> Result<SessionSummary, SessionError> {
        self.expect_state(SessionState::Running)?;
        self.state = SessionState::Draining;

        let symbols: Vec<(String, f64)> = self
            .ledger
            .positions()
            .map(|p| (p.symbol.clone(), p.current_price))
            .collect();

        for (symbol, price) in symbols {
            match self
                .ledger
                .close(&symbol, price, self.clock, ExitReason::SessionEnd)
            {
                Ok(trade) => tracing::info!(
                    "🔴 Closed {} {} @ ${:.4} | P&L: ${:.2} ({:+.2}%) | session_end",
                    trade.side,
                    trade.symbol,
                    trade.exit_price,
                    trade.pnl,
                    trade.pnl_pct
                ),
                Err(e) => tracing::warn!(symbol = %symbol, error = %e, "Drain close skipped"),
            }
        }

        self.refresh_metrics();
        self.state = SessionState::Stopped;

        let summary = SessionSummary {
            initial_cash: self.ledger.initial_cash(),
            final_value: self.ledger.total_value(),
            cash: self.ledger.cash(),
            total_pnl: self.ledger.total_pnl(),
            total_pnl_pct: self.ledger.total_pnl_pct(),
            ticks: self.ticks,
            stop_cause: cause,
            oracle: self.engine.stats(),
            metrics: self.metrics.clone(),
            trades: self.ledger.trades().to_vec(),
        };
        log_summary(&summary);

        Ok(summary)
    }
}
