//! Meridian Risk Manager
//!
//! Admission control for new orders. Every entry passes through the
//! `RiskGate` before it reaches the broker:
//!
//! - **Basic checks**: positive size, sells covered, buys covered by cash
//! - **Daily loss halt**: halts for the rest of the day on a 2% loss
//! - **Portfolio heat**: total distance-to-stop risk, capped at 6%
//! - **Correlated exposure**: greedy return-correlation clusters, 15% each
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         RiskGate                             │
//! │                                                             │
//! │  Portfolio value ───► DailyRiskManager ───► halted?         │
//! │                                                             │
//! │  Positions ─────────► PortfolioHeatManager ───► heat        │
//! │                                                             │
//! │  ReturnHistory ─────► cluster_symbols ───► cluster exposure │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!              Admission: Approved | Reduced | Rejected
//! ```
//!
//! `admit` takes `&self`; only `DailyRiskManager` methods change the halt flag.

pub mod correlation;
pub mod daily;
pub mod error;
pub mod gate;
pub mod heat;
pub mod parameters;

// Re-export main types
pub use correlation::{ReturnHistory, cluster_symbols, pearson};
pub use daily::{DailyRiskManager, DailyStats, HaltEvent, RiskState};
pub use error::{Error, Result};
pub use gate::{
    Admission, Candidate, ClusterExposure, RiskCheckType, RiskGate, RiskReport, RiskViolation,
    Severity,
};
pub use heat::{HeatAction, HeatAdjustment, HeatStatus, PortfolioHeatManager};
pub use parameters::RiskLimits;
