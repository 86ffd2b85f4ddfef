use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::PredictionOracle;
use crate::error::OracleError;
use crate::models::{Candle, Direction, Prediction};

/// One canned oracle answer
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    Predict { direction: Direction, confidence: f64 },
    Fail,
}

impl ScriptedResponse {
    pub fn up(confidence: f64) -> Self {
        ScriptedResponse::Predict {
            direction: Direction::Up,
            confidence,
        }
    }

    pub fn down(confidence: f64) -> Self {
        ScriptedResponse::Predict {
            direction: Direction::Down,
            confidence,
        }
    }

    pub fn neutral(confidence: f64) -> Self {
        ScriptedResponse::Predict {
            direction: Direction::Neutral,
            confidence,
        }
    }
}

/// Deterministic oracle answering from per-symbol queues.
///
/// Once a symbol's queue is empty the fallback answer is used.
pub struct ScriptedOracle {
    healthy: AtomicBool,
    queues: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    fallback: ScriptedResponse,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedOracle {
    /// Healthy oracle that answers NEUTRAL at zero confidence
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            queues: Mutex::new(HashMap::new()),
            fallback: ScriptedResponse::neutral(0.0),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy() -> Self {
        let oracle = Self::new();
        oracle.set_healthy(false);
        oracle
    }

    pub fn with_fallback(mut self, response: ScriptedResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Sleep before every answer (to exercise timeouts)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_script(self, symbol: &str, responses: Vec<ScriptedResponse>) -> Self {
        self.push(symbol, responses);
        self
    }

    pub fn push(&self, symbol: &str, responses: Vec<ScriptedResponse>) {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .entry(symbol.to_string())
            .or_default()
            .extend(responses);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of predict calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self, symbol: &str) -> ScriptedResponse {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .get_mut(symbol)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl PredictionOracle for ScriptedOracle {
    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn predict(
        &self,
        _window: &[Candle],
        symbol: &str,
        model_type: &str,
    ) -> Result<Prediction, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response(symbol);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            ScriptedResponse::Predict {
                direction,
                confidence,
            } => Ok(Prediction::new(symbol, direction, confidence, model_type)),
            ScriptedResponse::Fail => Err(OracleError::Unavailable(format!(
                "scripted failure for {}",
                symbol
            ))),
        }
    }
}
