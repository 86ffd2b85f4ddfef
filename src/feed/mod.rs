// Market data feeds
pub mod candle_buffer;
pub mod replay;
pub mod synthetic;

pub use candle_buffer::CandleBuffer;
pub use replay::{candles_from_closes, ReplayFeed};
pub use synthetic::SyntheticFeed;

use crate::models::Candle;

/// Source of OHLCV candles, advanced once per tick per symbol
pub trait MarketFeed: Send {
    /// Produce the next candle for `symbol` and append it to the window.
    /// `None` when the feed has nothing new for that symbol.
    fn next_candle(&mut self, symbol: &str) -> Option<Candle>;

    /// Last `n` candles for `symbol`, oldest first
    fn window(&self, symbol: &str, n: usize) -> Vec<Candle>;

    /// Close of the most recent candle
    fn latest_price(&self, symbol: &str) -> Option<f64> {
        self.window(symbol, 1).last().map(|c| c.close)
    }
}
