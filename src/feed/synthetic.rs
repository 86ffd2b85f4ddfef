use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{CandleBuffer, MarketFeed};
use crate::models::Candle;

/// Candles generated per symbol before the first tick
pub const WARMUP_CANDLES: usize = 100;
/// Rolling window kept per symbol
pub const BUFFER_CANDLES: usize = 200;

const MAX_STEP_MOVE: f64 = 0.02; // ±2% per candle

/// Seeded random-walk market feed standing in for a live exchange
pub struct SyntheticFeed {
    rng: StdRng,
    buffer: CandleBuffer,
    step: Duration,
}

impl SyntheticFeed {
    /// Create a feed whose warm-up history ends now
    pub fn new(symbols: &[String], seed: u64, step: Duration) -> Self {
        Self::starting_at(symbols, seed, step, Utc::now())
    }

    /// Create a feed whose warm-up history ends at `start`
    pub fn starting_at(
        symbols: &[String],
        seed: u64,
        step: Duration,
        start: DateTime<Utc>,
    ) -> Self {
        let mut feed = Self {
            rng: StdRng::seed_from_u64(seed),
            buffer: CandleBuffer::new(BUFFER_CANDLES),
            step,
        };

        for symbol in symbols {
            let mut price = base_price(symbol);
            for i in 0..WARMUP_CANDLES {
                let offset = (WARMUP_CANDLES - 1 - i) as i32;
                let timestamp = start - step * offset;
                let candle = feed.step_candle(symbol, price, timestamp);
                price = candle.close;
                feed.buffer.add_candle(candle);
            }
            tracing::debug!(symbol = %symbol, candles = WARMUP_CANDLES, "Warmed up synthetic feed");
        }

        feed
    }

    /// Random move from `last_close` to a new candle
    fn step_candle(&mut self, symbol: &str, last_close: f64, timestamp: DateTime<Utc>) -> Candle {
        let close = last_close * (1.0 + self.rng.gen_range(-MAX_STEP_MOVE..MAX_STEP_MOVE));

        Candle {
            symbol: symbol.to_string(),
            timestamp,
            open: last_close,
            high: last_close.max(close) * 1.001,
            low: last_close.min(close) * 0.999,
            close,
            volume: self.rng.gen_range(100.0..1000.0),
        }
    }
}

/// Starting price for a symbol
pub fn base_price(symbol: &str) -> f64 {
    match symbol {
        "BTCUSDT" => 50000.0,
        "ETHUSDT" => 3000.0,
        "SOLUSDT" => 100.0,
        "DOGEUSDT" => 0.1,
        _ => 50000.0,
    }
}

impl MarketFeed for SyntheticFeed {
    fn next_candle(&mut self, symbol: &str) -> Option<Candle> {
        let (last_close, last_time) = self
            .buffer
            .latest(symbol)
            .map(|c| (c.close, c.timestamp))?;

        let candle = self.step_candle(symbol, last_close, last_time + self.step);
        self.buffer.add_candle(candle.clone());
        Some(candle)
    }

    fn window(&self, symbol: &str, n: usize) -> Vec<Candle> {
        self.buffer.get_recent_candles(symbol, n)
    }
}
