use governor::{Quota, RateLimiter};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::PredictionOracle;
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::models::{Candle, Direction, Prediction};

const BACKOFF_BASE_MS: u64 = 250;

/// 250ms doubled per attempt, saturating instead of overflowing
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor))
}

type OracleRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// HTTP client for the C3PO model service
///
/// Cloneable; clones share the rate limiter.
#[derive(Clone)]
pub struct C3poClient {
    client: Client,
    base_url: String,
    prediction_horizon: String,
    timeframe: String,
    max_retries: u32,
    rate_limiter: Arc<OracleRateLimiter>,
}

/// Response from `GET /`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub models_loaded: Vec<String>,
    #[serde(default)]
    pub uptime_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    available_models: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    model_type: Option<String>,
    #[serde(default)]
    prediction: Option<PredictionBody>,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionBody {
    direction: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
struct MarketDataPoint {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<&Candle> for MarketDataPoint {
    fn from(c: &Candle) -> Self {
        Self {
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        }
    }
}

impl C3poClient {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            prediction_horizon: config.prediction_horizon.clone(),
            timeframe: config.timeframe.clone(),
            max_retries: config.max_retries,
            rate_limiter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rate-limited request with exponential backoff on 429, 5xx and network errors
    async fn make_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, OracleError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            self.rate_limiter.until_ready().await;

            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            let backoff = backoff_delay(attempt);
            let retries_left = attempt < self.max_retries;

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if (status.as_u16() == 429 || status.is_server_error()) && retries_left {
                        tracing::warn!(
                            "Oracle returned {} for {}, retrying in {:?} (attempt {}/{})",
                            status,
                            path,
                            backoff,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }

                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(OracleError::Rejected {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(e) if retries_left => {
                    tracing::warn!(
                        "Oracle network error on {}: {}, retrying in {:?} (attempt {}/{})",
                        path,
                        e,
                        backoff,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(OracleError::Http(e)),
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, OracleError> {
        let response = self.make_request(Method::GET, path, None).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))
    }

    /// Names of the models the service can serve
    pub async fn get_models(&self) -> Result<Vec<String>, OracleError> {
        let models: ModelsResponse = self.get_json("/models").await?;
        Ok(models.available_models)
    }

    pub async fn get_status(&self) -> Result<ServiceStatus, OracleError> {
        self.get_json("/").await
    }
}

impl PredictionOracle for C3poClient {
    async fn health_check(&self) -> bool {
        match self.get_json::<HealthResponse>("/health").await {
            Ok(health) => health.status == "healthy",
            Err(e) => {
                tracing::warn!("Oracle health check failed: {}", e);
                false
            }
        }
    }

    async fn predict(
        &self,
        window: &[Candle],
        symbol: &str,
        model_type: &str,
    ) -> Result<Prediction, OracleError> {
        let market_data: Vec<MarketDataPoint> = window.iter().map(MarketDataPoint::from).collect();
        let body = json!({
            "market_data": market_data,
            "symbol": symbol,
            "timeframe": self.timeframe,
            "model_type": model_type,
            "prediction_horizon": self.prediction_horizon,
        });

        let response = self.make_request(Method::POST, "/predict", Some(&body)).await?;
        let status = response.status().as_u16();
        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))?;

        if !parsed.success {
            return Err(OracleError::Rejected {
                status,
                message: parsed
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        let prediction = parsed.prediction.unwrap_or_default();
        let direction = prediction
            .direction
            .as_deref()
            .map(Direction::parse)
            .unwrap_or(Direction::Neutral);
        let confidence = prediction.confidence.unwrap_or(0.5);
        let model = parsed.model_type.unwrap_or_else(|| model_type.to_string());

        tracing::debug!(
            symbol = %symbol,
            direction = %direction.as_str(),
            confidence,
            "Oracle prediction"
        );

        Ok(Prediction::new(symbol, direction, confidence, &model))
    }
}
