//! Meridian Runner
//!
//! Live orchestration for the Meridian trading runtime:
//! - **Scheduler**: one tokio task per strategy, supervised, cancellable
//! - **Worker**: the per-iteration pipeline from bars to booked trades
//! - **Context**: shared ledger, risk, order store and history
//! - **Notifications**: logged, retained and broadcast alerts
//! - **Config**: JSON engine configuration with an embedded default
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────────────────┐
//!                    │      StrategyScheduler       │
//!                    │  start / stop / emergency    │
//!                    └──────┬──────────────┬────────┘
//!                           │ spawn        │ spawn
//!                    ┌──────▼─────┐  ┌─────▼──────┐
//!                    │  Worker A  │  │  Worker B  │   (CancellationToken)
//!                    └──────┬─────┘  └─────┬──────┘
//!                           │              │
//!   MarketData ──► bars ──► stop/target ──► signal ──► size ──► RiskGate
//!                                                                  │
//!   Broker ◄────────────── OrderRouter ◄───────────────────────────┘
//!                               │ fills
//!                               ▼
//!                    PositionLedger ──► TradeHistory ──► Notifier
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod worker;

pub use config::{
    ConfigError, EngineConfig, SchedulerConfig, StrategyConfig, load_config, load_config_from_str,
    load_default_config,
};
pub use context::TradingContext;
pub use error::{Result, SchedulerError};
pub use notify::NotificationCenter;
pub use scheduler::{CloseFailure, EmergencyReport, StrategyScheduler, StrategyState, StrategyStatus};
pub use worker::{IterationOutcome, IterationSummary, StrategyWorker};
