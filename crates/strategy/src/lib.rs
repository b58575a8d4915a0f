//! Meridian Signal Generation
//!
//! Turns per-symbol OHLCV history into trade signals:
//! - Technical indicators over `f64` series
//! - Regime and volume analysis
//! - Strategy variants behind a pure `Strategy` trait
//! - `SignalGenerator` that wraps decisions into `Signal`s
//!
//! ## Architecture
//!
//! ```text
//!  MarketData ──► Vec<Bar> ──► FeatureSnapshot
//!                                   │
//!                    ┌──────────────┼──────────────┐
//!                    ▼              ▼              ▼
//!               indicators      analysis      StrategyParams
//!                    │              │              │ build()
//!                    └──────► Strategy::evaluate ◄─┘
//!                                   │ Decision
//!                                   ▼
//!                            SignalGenerator ──► Signal | HOLD
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_strategy::{FeatureSnapshot, SignalGenerator, StrategyParams};
//!
//! let snapshot = FeatureSnapshot::new("AAPL", bars);
//! let signal = SignalGenerator::default().generate("trend", &snapshot, &StrategyParams::default())?;
//! ```

pub mod analysis;
pub mod breakout;
pub mod crossover;
pub mod error;
pub mod features;
pub mod generator;
pub mod indicators;
pub mod mean_reversion;
pub mod momentum;
pub mod multi_timeframe;
pub mod params;
pub mod rsi_reversion;
pub mod strategy;

pub use analysis::{MarketRegime, RegimeReading, VolumeReading, VolumeSignal, analyze_volume, detect_regime};
pub use breakout::{BreakoutConfig, VolatilityBreakout};
pub use crossover::{CrossoverConfig, MaCrossover};
pub use error::{Result, SignalError};
pub use features::{FeatureSnapshot, IndicatorSnapshot};
pub use generator::SignalGenerator;
pub use mean_reversion::{MeanReversion, MeanReversionConfig};
pub use momentum::{Momentum, MomentumConfig, QuickTest, QuickTestConfig};
pub use multi_timeframe::{MultiTimeframe, MultiTimeframeConfig};
pub use params::StrategyParams;
pub use rsi_reversion::{RsiConfig, RsiReversion};
pub use strategy::{Decision, Strategy};
