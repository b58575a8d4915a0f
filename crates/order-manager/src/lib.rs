//! Meridian Order Manager
//!
//! Everything between a signal and a booked trade:
//! - **Sizing**: signal + account → whole shares, capped by portfolio heat
//! - **Lifecycle**: the synchronous order store and its state transitions
//! - **Execution**: the async boundary that routes orders to a `Broker`
//! - **Ledger**: open positions keyed by (strategy, symbol), stop/target checks
//! - **History**: append-only closed-trade log with performance stats
//!
//! ## Architecture
//!
//! ```text
//! Signal ──► PositionSizer ──► RiskGate ──► OrderRouter ──► Broker
//!                 │                            │
//!                 │ heat                       │ OrderManager (store)
//!                 │                            ▼
//!                 └─────────────────── PositionLedger ──► TradeHistory
//!                                      (stop / target)    (stats, JSON)
//! ```
//!
//! Backtests skip the router and use `OrderManager::simulate_fill`, which
//! collapses submit and fill into one synchronous step.

pub mod error;
pub mod execution;
pub mod history;
pub mod ledger;
pub mod lifecycle;
pub mod sizing;

// Re-export main types
pub use error::{Error, Result};
pub use execution::OrderRouter;
pub use history::{PerformanceStats, TradeFilter, TradeHistory};
pub use ledger::{ExitTrigger, PositionLedger};
pub use lifecycle::OrderManager;
pub use sizing::{PositionSizer, SizeDecision, SizingPolicy, kelly_fraction, policy_size};
