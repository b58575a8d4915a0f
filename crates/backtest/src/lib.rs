//! Meridian Backtester
//!
//! Walk-forward replay of historical bars through the live pipeline's
//! pieces, single-threaded and deterministic:
//! - **Engine**: per-symbol synthetic accounts, exits before entries
//! - **Result**: trades, per-symbol and aggregate stats, equity curves
//! - **Metrics**: drawdown, Sharpe and profit factor as pure functions
//!
//! ## Per bar
//!
//! ```text
//! bar i ──► equity snapshot ──► stop / target ──► sell signal ──► buy signal
//!               (close)         (bar low/high)      (close)      (flat, no exit
//!                                                                 this bar)
//!                                   │                  │              │
//!                                   └──── OrderManager::simulate_fill ┘
//!                                                │
//!                                         PositionLedger ──► TradeRecord
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod result;

pub use config::BacktestConfig;
pub use engine::BacktestEngine;
pub use error::{BacktestError, Result};
pub use result::{AggregateStats, BacktestResult, EquityPoint, SymbolStats, combine_curves};
