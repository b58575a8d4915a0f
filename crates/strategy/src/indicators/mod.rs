//! Technical indicators
//!
//! All functions take plain `f64` series (oldest first) and return a series of
//! the same length. Positions before an indicator is defined hold `NaN`, so
//! callers read the tail and check `is_nan()`.

mod moving;
mod oscillators;
mod stats;
mod volatility;

pub use moving::{ema, rolling_std, sma};
pub use oscillators::{Bollinger, Macd, bollinger, macd, rsi};
pub use stats::{last_valid, linear_slope, mean, pct_returns, percentile_rank, sample_std};
pub use volatility::{adx, atr, true_range, wilder_smooth};
