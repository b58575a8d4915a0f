//! Configuration types
//!
//! Everything the engine reads at startup: risk limits, scheduler timings
//! and the set of strategies to run.

use std::time::Duration;

use meridian_core::Symbol;
use meridian_order_manager::SizingPolicy;
use meridian_risk_manager::RiskLimits;
use meridian_strategy::{SignalGenerator, StrategyParams};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Timings shared by every strategy worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sleep between iterations
    pub poll_interval_secs: u64,
    /// Sleep while trading is halted
    pub halt_retry_secs: u64,
    /// Sleep after a failed iteration
    pub error_backoff_secs: u64,
    /// Consecutive failed iterations before the worker gives up
    pub max_consecutive_errors: u32,
    /// Bound on joining a worker during stop
    pub join_timeout_secs: u64,
    /// Finished orders older than this are pruned once a day
    pub order_retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,  // 1 minute
            halt_retry_secs: 300,    // 5 minutes
            error_backoff_secs: 10,
            max_consecutive_errors: 5,
            join_timeout_secs: 5,
            order_retention_days: 7,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn halt_retry(&self) -> Duration {
        Duration::from_secs(self.halt_retry_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

/// One configured strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Unique id; also the owner key in the position ledger
    pub id: String,
    pub symbols: Vec<Symbol>,
    pub params: StrategyParams,
    #[serde(default)]
    pub sizing: SizingPolicy,
    #[serde(default)]
    pub generator: SignalGenerator,
    /// Stop distance in ATRs when a signal carries no stop
    #[serde(default = "default_stop_multiplier")]
    pub stop_multiplier: Decimal,
    /// Bars fetched per symbol each iteration
    #[serde(default = "default_lookback_bars")]
    pub lookback_bars: usize,
}

fn default_stop_multiplier() -> Decimal {
    dec!(2)
}

fn default_lookback_bars() -> usize {
    100
}

impl StrategyConfig {
    pub fn new(id: impl Into<String>, symbols: Vec<Symbol>, params: StrategyParams) -> Self {
        Self {
            id: id.into(),
            symbols,
            params,
            sizing: SizingPolicy::default(),
            generator: SignalGenerator::default(),
            stop_multiplier: default_stop_multiplier(),
            lookback_bars: default_lookback_bars(),
        }
    }

    pub fn with_sizing(mut self, sizing: SizingPolicy) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_generator(mut self, generator: SignalGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_stop_multiplier(mut self, multiplier: Decimal) -> Self {
        self.stop_multiplier = multiplier;
        self
    }

    pub fn with_lookback_bars(mut self, bars: usize) -> Self {
        self.lookback_bars = bars;
        self
    }
}

/// Top-level engine configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk: RiskLimits,
    pub scheduler: SchedulerConfig,
    /// Alerts retained by the notification center
    pub notification_history: usize,
    pub strategies: Vec<StrategyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk: RiskLimits::default(),
            scheduler: SchedulerConfig::default(),
            notification_history: 500,
            strategies: Vec::new(),
        }
    }
}
