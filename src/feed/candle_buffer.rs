use crate::models::Candle;
use std::collections::{HashMap, VecDeque};

/// In-memory rolling window of candles per symbol
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    data: HashMap<String, VecDeque<Candle>>,
    max_candles: usize,
}

impl CandleBuffer {
    /// Create a new candle buffer
    ///
    /// # Arguments
    /// * `max_candles` - Maximum number of candles to keep per symbol
    pub fn new(max_candles: usize) -> Self {
        Self {
            data: HashMap::new(),
            max_candles: max_candles.max(1),
        }
    }

    /// Append a candle, evicting the oldest once the window is full
    pub fn add_candle(&mut self, candle: Candle) {
        let symbol_candles = self.data.entry(candle.symbol.clone()).or_default();

        symbol_candles.push_back(candle);

        while symbol_candles.len() > self.max_candles {
            symbol_candles.pop_front();
        }
    }

    /// Get the N most recent candles for a symbol, oldest first
    pub fn get_recent_candles(&self, symbol: &str, n: usize) -> Vec<Candle> {
        self.data
            .get(symbol)
            .map(|deque| deque.iter().skip(deque.len().saturating_sub(n)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, symbol: &str) -> Option<&Candle> {
        self.data.get(symbol).and_then(|deque| deque.back())
    }

    pub fn candle_count(&self, symbol: &str) -> usize {
        self.data.get(symbol).map(|d| d.len()).unwrap_or(0)
    }

    pub fn max_candles(&self) -> usize {
        self.max_candles
    }
}
