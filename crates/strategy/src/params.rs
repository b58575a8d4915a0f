//! Strategy parameter sets
//!
//! `StrategyParams` is what configuration files carry. Each variant builds
//! the matching `Strategy`, validating its parameters on the way.

use serde::{Deserialize, Serialize};

use crate::breakout::{BreakoutConfig, VolatilityBreakout};
use crate::crossover::{CrossoverConfig, MaCrossover};
use crate::error::Result;
use crate::mean_reversion::{MeanReversion, MeanReversionConfig};
use crate::momentum::{Momentum, MomentumConfig, QuickTest, QuickTestConfig};
use crate::multi_timeframe::{MultiTimeframe, MultiTimeframeConfig};
use crate::rsi_reversion::{RsiConfig, RsiReversion};
use crate::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyParams {
    MaCrossover(CrossoverConfig),
    RsiReversion(RsiConfig),
    MeanReversion(MeanReversionConfig),
    Momentum(MomentumConfig),
    QuickTest(QuickTestConfig),
    MultiTimeframe(MultiTimeframeConfig),
    VolatilityBreakout(BreakoutConfig),
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams::MaCrossover(CrossoverConfig::default())
    }
}

impl StrategyParams {
    /// Validate and build the strategy
    pub fn build(&self) -> Result<Box<dyn Strategy>> {
        Ok(match self {
            StrategyParams::MaCrossover(c) => Box::new(MaCrossover::new(c.clone())?),
            StrategyParams::RsiReversion(c) => Box::new(RsiReversion::new(c.clone())?),
            StrategyParams::MeanReversion(c) => Box::new(MeanReversion::new(c.clone())?),
            StrategyParams::Momentum(c) => Box::new(Momentum::new(c.clone())?),
            StrategyParams::QuickTest(c) => Box::new(QuickTest::new(c.clone())?),
            StrategyParams::MultiTimeframe(c) => Box::new(MultiTimeframe::new(c.clone())?),
            StrategyParams::VolatilityBreakout(c) => Box::new(VolatilityBreakout::new(c.clone())?),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StrategyParams::MaCrossover(_) => "ma_crossover",
            StrategyParams::RsiReversion(_) => "rsi_reversion",
            StrategyParams::MeanReversion(_) => "mean_reversion",
            StrategyParams::Momentum(_) => "momentum",
            StrategyParams::QuickTest(_) => "quick_test",
            StrategyParams::MultiTimeframe(_) => "multi_timeframe",
            StrategyParams::VolatilityBreakout(_) => "volatility_breakout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json_with_defaults() {
        let params: StrategyParams =
            serde_json::from_str(r#"{"kind": "ma_crossover", "fast_period": 5}"#).unwrap();
        assert_eq!(
            params,
            StrategyParams::MaCrossover(CrossoverConfig {
                fast_period: 5,
                slow_period: 30,
            })
        );

        let params: StrategyParams = serde_json::from_str(r#"{"kind": "quick_test"}"#).unwrap();
        assert_eq!(params.kind(), "quick_test");
    }

    #[test]
    fn test_build_validates() {
        for params in [
            StrategyParams::default(),
            StrategyParams::RsiReversion(RsiConfig::default()),
            StrategyParams::MeanReversion(MeanReversionConfig::default()),
            StrategyParams::Momentum(MomentumConfig::default()),
            StrategyParams::QuickTest(QuickTestConfig::default()),
            StrategyParams::MultiTimeframe(MultiTimeframeConfig::default()),
            StrategyParams::VolatilityBreakout(BreakoutConfig::default()),
        ] {
            let strategy = params.build().unwrap();
            assert_eq!(strategy.name(), params.kind());
        }

        let bad = StrategyParams::MaCrossover(CrossoverConfig {
            fast_period: 30,
            slow_period: 30,
        });
        assert!(bad.build().is_err());
    }
}
