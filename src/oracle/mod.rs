// Prediction oracle clients
pub mod c3po;
pub mod scripted;

pub use c3po::{C3poClient, ServiceStatus};
pub use scripted::{ScriptedOracle, ScriptedResponse};

use std::future::Future;

use crate::error::OracleError;
use crate::models::{Candle, Prediction};

/// Remote service returning a direction and confidence for a candle window
pub trait PredictionOracle: Send + Sync {
    /// True when the service is reachable and reports itself healthy
    fn health_check(&self) -> impl Future<Output = bool> + Send;

    /// Predict the next move for `symbol` from `window` (oldest first)
    fn predict(
        &self,
        window: &[Candle],
        symbol: &str,
        model_type: &str,
    ) -> impl Future<Output = Result<Prediction, OracleError>> + Send;
}

impl<T: PredictionOracle> PredictionOracle for std::sync::Arc<T> {
    fn health_check(&self) -> impl Future<Output = bool> + Send {
        (**self).health_check()
    }

    fn predict(
        &self,
        window: &[Candle],
        symbol: &str,
        model_type: &str,
    ) -> impl Future<Output = Result<Prediction, OracleError>> + Send {
        (**self).predict(window, symbol, model_type)
    }
}
