use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

use super::{CandleBuffer, MarketFeed};
use crate::models::Candle;

/// Feed that plays back fixed candle sequences, one per `next_candle` call.
///
/// An exhausted symbol yields no new candle and keeps its last window.
pub struct ReplayFeed {
    buffer: CandleBuffer,
    pending: HashMap<String, VecDeque<Candle>>,
}

impl ReplayFeed {
    pub fn new(max_candles: usize) -> Self {
        Self {
            buffer: CandleBuffer::new(max_candles),
            pending: HashMap::new(),
        }
    }

    /// Preload candles that are already visible before the first tick
    pub fn with_history(mut self, candles: Vec<Candle>) -> Self {
        for candle in candles {
            self.buffer.add_candle(candle);
        }
        self
    }

    /// Queue candles to be served in order
    pub fn with_script(mut self, candles: Vec<Candle>) -> Self {
        for candle in candles {
            self.pending
                .entry(candle.symbol.clone())
                .or_default()
                .push_back(candle);
        }
        self
    }

    pub fn remaining(&self, symbol: &str) -> usize {
        self.pending.get(symbol).map(|q| q.len()).unwrap_or(0)
    }
}

impl MarketFeed for ReplayFeed {
    fn next_candle(&mut self, symbol: &str) -> Option<Candle> {
        let candle = self.pending.get_mut(symbol)?.pop_front()?;
        self.buffer.add_candle(candle.clone());
        Some(candle)
    }

    fn window(&self, symbol: &str, n: usize) -> Vec<Candle> {
        self.buffer.get_recent_candles(symbol, n)
    }
}

/// Flat candles (open = high = low = close) from a list of closes
pub fn candles_from_closes(
    symbol: &str,
    closes: &[f64],
    start: DateTime<Utc>,
    step: Duration,
) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            symbol: symbol.to_string(),
            timestamp: start + step * i as i32,
            open: close,
            high: close,
            low: close,
            close,
            volume: 500.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_order_then_goes_stale() {
        let start = Utc::now();
        let step = Duration::seconds(30);
        let mut feed = ReplayFeed::new(50)
            .with_history(candles_from_closes("BTCUSDT", &[99.0], start - step, step))
            .with_script(candles_from_closes("BTCUSDT", &[100.0, 101.0], start, step));

        assert_eq!(feed.latest_price("BTCUSDT"), Some(99.0));
        assert_eq!(feed.next_candle("BTCUSDT").unwrap().close, 100.0);
        assert_eq!(feed.next_candle("BTCUSDT").unwrap().close, 101.0);
        assert_eq!(feed.remaining("BTCUSDT"), 0);

        assert!(feed.next_candle("BTCUSDT").is_none());
        assert_eq!(feed.latest_price("BTCUSDT"), Some(101.0));
        assert_eq!(feed.window("BTCUSDT", 10).len(), 3);
    }

    #[test]
    fn test_unknown_symbol() {
        let mut feed = ReplayFeed::new(50);
        assert!(feed.next_candle("ETHUSDT").is_none());
        assert!(feed.window("ETHUSDT", 5).is_empty());
        assert_eq!(feed.latest_price("ETHUSDT"), None);
    }
}
