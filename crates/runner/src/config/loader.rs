use std::collections::HashSet;
use std::path::Path;

use meridian_strategy::SignalError;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{EngineConfig, StrategyConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid risk limits: {0}")]
    Risk(#[from] meridian_risk_manager::Error),
    #[error("Strategy {id}: {source}")]
    Strategy { id: String, source: SignalError },
    #[error("Duplicate strategy id: {0}")]
    DuplicateStrategy(String),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Load engine configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<EngineConfig, ConfigError> {
    let default_config = include_str!("default_config.json");
    load_config_from_str(default_config)
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy id is empty".into()));
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid(format!("strategy {} has no symbols", self.id)));
        }
        if self.stop_multiplier <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "strategy {} stop_multiplier must be positive",
                self.id
            )));
        }
        self.params.build().map_err(|source| ConfigError::Strategy {
            id: self.id.clone(),
            source,
        })?;
        Ok(())
    }
}

impl EngineConfig {
    pub fn get_strategy(&self, id: &str) -> Option<&StrategyConfig> {
        self.strategies.iter().find(|s| s.id == id)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk.validate()?;

        let s = &self.scheduler;
        if s.poll_interval_secs == 0 || s.join_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs and join_timeout_secs must be positive".into(),
            ));
        }
        if s.max_consecutive_errors == 0 {
            return Err(ConfigError::Invalid("max_consecutive_errors must be positive".into()));
        }
        if s.order_retention_days < 1 {
            return Err(ConfigError::Invalid("order_retention_days must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for strategy in &self.strategies {
            if !seen.insert(strategy.id.as_str()) {
                return Err(ConfigError::DuplicateStrategy(strategy.id.clone()));
            }
            strategy.validate()?;
        }
        Ok(())
    }
}
