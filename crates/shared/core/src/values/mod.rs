use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
/// Future: could become a newtype with validation (non-negative, tick size)
pub type Price = Decimal;

/// Quantity value - whole shares for equities, kept as Decimal for arithmetic
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Ticker symbol for a tradeable instrument
pub type Symbol = String;

/// Identifier of a configured strategy (e.g. "ma_crossover")
pub type StrategyId = String;
