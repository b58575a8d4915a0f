//! Daily loss halt
//!
//! Tracks the portfolio value against the value at the start of the trading
//! day. A breach halts trading until the next day or a manual resume;
//! recovering within the same day does not clear it.

use chrono::NaiveDate;
use log::{error, info};
use meridian_core::{Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current day's risk state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// None until the first portfolio update
    pub trading_day: Option<NaiveDate>,
    pub starting_portfolio_value: Price,
    pub current_portfolio_value: Price,
    pub daily_pnl: Decimal,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

/// Emitted once when a portfolio update trips the daily limit
#[derive(Debug, Clone, PartialEq)]
pub struct HaltEvent {
    pub reason: String,
    pub daily_pnl: Decimal,
    pub loss_pct: Decimal,
    pub at: Timestamp,
}

/// Serializable snapshot for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub trading_day: Option<NaiveDate>,
    pub starting_value: Price,
    pub current_value: Price,
    pub daily_pnl: Decimal,
    /// Percent, e.g. -1.5 for a 1.5% loss
    pub daily_pnl_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DailyRiskManager {
    max_daily_loss_pct: Decimal,
    state: RiskState,
}

impl DailyRiskManager {
    pub fn new(max_daily_loss_pct: Decimal) -> Self {
        Self {
            max_daily_loss_pct,
            state: RiskState::default(),
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Record the latest portfolio value
    ///
    /// The first update of a calendar day resets the starting value and
    /// clears any halt. Returns a `HaltEvent` only on the update that trips
    /// the limit.
    pub fn update_portfolio_value(&mut self, value: Price, now: Timestamp) -> Option<HaltEvent> {
        let today = now.date_naive();
        if self.state.trading_day != Some(today) {
            if let Some(previous) = self.state.trading_day {
                info!(
                    "[RISK] New trading day {} (previous {} closed at pnl {})",
                    today, previous, self.state.daily_pnl
                );
            }
            self.state = RiskState {
                trading_day: Some(today),
                starting_portfolio_value: value,
                current_portfolio_value: value,
                daily_pnl: Decimal::ZERO,
                halted: false,
                halt_reason: None,
            };
            return None;
        }

        self.state.current_portfolio_value = value;
        self.state.daily_pnl = value - self.state.starting_portfolio_value;

        if self.state.halted || self.state.starting_portfolio_value <= Decimal::ZERO {
            return None;
        }

        let loss_pct = self.state.daily_pnl / self.state.starting_portfolio_value;
        if loss_pct <= -self.max_daily_loss_pct {
            let reason = format!(
                "Daily loss limit breached: {:.2}% <= -{:.2}%",
                loss_pct * Decimal::ONE_HUNDRED,
                self.max_daily_loss_pct * Decimal::ONE_HUNDRED
            );
            self.halt(reason.clone());
            return Some(HaltEvent {
                reason,
                daily_pnl: self.state.daily_pnl,
                loss_pct,
                at: now,
            });
        }
        None
    }

    /// Halt trading; returns false if already halted
    pub fn halt(&mut self, reason: impl Into<String>) -> bool {
        if self.state.halted {
            return false;
        }
        let reason = reason.into();
        error!("[RISK] Trading halted: {}", reason);
        self.state.halted = true;
        self.state.halt_reason = Some(reason);
        true
    }

    /// Resume trading (manual intervention)
    pub fn resume(&mut self) {
        if self.state.halted {
            info!("[RISK] Trading resumed");
            self.state.halted = false;
            self.state.halt_reason = None;
        }
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    pub fn can_trade(&self) -> Result<()> {
        if self.state.halted {
            return Err(Error::TradingHalted {
                reason: self
                    .state
                    .halt_reason
                    .clone()
                    .unwrap_or_else(|| "halted".to_string()),
            });
        }
        Ok(())
    }

    pub fn daily_stats(&self) -> DailyStats {
        let daily_pnl_pct = if self.state.starting_portfolio_value > Decimal::ZERO {
            (self.state.daily_pnl / self.state.starting_portfolio_value * Decimal::ONE_HUNDRED)
                .round_dp(4)
        } else {
            Decimal::ZERO
        };

        DailyStats {
            trading_day: self.state.trading_day,
            starting_value: self.state.starting_portfolio_value,
            current_value: self.state.current_portfolio_value,
            daily_pnl: self.state.daily_pnl,
            daily_pnl_pct,
            max_daily_loss_pct: self.max_daily_loss_pct,
            halted: self.state.halted,
            halt_reason: self.state.halt_reason.clone(),
        }
    }
}
