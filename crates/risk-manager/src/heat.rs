//! Portfolio heat
//!
//! Heat is the money lost if every open stop were hit at once, as a fraction
//! of portfolio value. Positions without a stop contribute nothing.

use log::warn;
use meridian_core::Position;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatStatus {
    Normal,
    Warning,
    Critical,
}

/// What `adjust_for_heat` did to a requested size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatAction {
    Unchanged,
    Halved,
    Blocked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatAdjustment {
    pub shares: Decimal,
    /// Heat after adding the adjusted shares
    pub projected_heat: Decimal,
    pub action: HeatAction,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PortfolioHeatManager {
    max_heat: Decimal,
    warning_heat: Decimal,
}

impl PortfolioHeatManager {
    pub fn new(max_heat: Decimal, warning_heat: Decimal) -> Self {
        Self {
            max_heat,
            warning_heat,
        }
    }

    pub fn max_heat(&self) -> Decimal {
        self.max_heat
    }

    pub fn warning_heat(&self) -> Decimal {
        self.warning_heat
    }

    /// Sum of open risk over portfolio value
    pub fn portfolio_heat(&self, positions: &[Position], portfolio_value: Decimal) -> Decimal {
        if portfolio_value <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let at_risk: Decimal = positions.iter().map(Position::risk_amount).sum();
        at_risk / portfolio_value
    }

    pub fn status(&self, heat: Decimal) -> HeatStatus {
        if heat >= self.max_heat {
            HeatStatus::Critical
        } else if heat >= self.warning_heat {
            HeatStatus::Warning
        } else {
            HeatStatus::Normal
        }
    }

    fn projected(&self, current: Decimal, shares: Decimal, risk_per_share: Decimal, pv: Decimal) -> Decimal {
        if pv <= Decimal::ZERO {
            return current;
        }
        current + shares * risk_per_share / pv
    }

    /// Fit a requested size under the heat limits
    ///
    /// At or past max heat the size drops to zero. At or past the warning
    /// level it is halved (floored) and re-checked against max.
    pub fn adjust_for_heat(
        &self,
        shares: Decimal,
        risk_per_share: Decimal,
        current_heat: Decimal,
        portfolio_value: Decimal,
    ) -> HeatAdjustment {
        let risk_per_share = risk_per_share.abs();
        let projected = self.projected(current_heat, shares, risk_per_share, portfolio_value);

        if projected >= self.max_heat {
            warn!(
                "[RISK] Heat {:.4} would reach max {}; blocking {} shares",
                projected, self.max_heat, shares
            );
            return HeatAdjustment {
                shares: Decimal::ZERO,
                projected_heat: current_heat,
                action: HeatAction::Blocked,
                reason: format!("projected heat {:.4} >= max {}", projected, self.max_heat),
            };
        }

        if projected >= self.warning_heat {
            let halved = (shares / Decimal::TWO).floor();
            let rechecked = self.projected(current_heat, halved, risk_per_share, portfolio_value);
            if halved.is_zero() || rechecked >= self.max_heat {
                return HeatAdjustment {
                    shares: Decimal::ZERO,
                    projected_heat: current_heat,
                    action: HeatAction::Blocked,
                    reason: format!("halved size still blocked at heat {:.4}", rechecked),
                };
            }
            return HeatAdjustment {
                shares: halved,
                projected_heat: rechecked,
                action: HeatAction::Halved,
                reason: format!(
                    "projected heat {:.4} >= warning {}; halved to {}",
                    projected, self.warning_heat, halved
                ),
            };
        }

        HeatAdjustment {
            shares,
            projected_heat: projected,
            action: HeatAction::Unchanged,
            reason: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn manager() -> PortfolioHeatManager {
        PortfolioHeatManager::new(dec!(0.06), dec!(0.04))
    }

    fn position(symbol: &str, shares: Decimal, entry: Decimal, stop: Option<Decimal>) -> Position {
        Position {
            strategy_id: "s".into(),
            symbol: symbol.into(),
            shares,
            entry_price: entry,
            entry_time: Utc::now(),
            stop_loss: stop,
            take_profit: None,
        }
    }

    #[test]
    fn test_heat_ignores_positions_without_stop() {
        let positions = vec![
            position("A", dec!(100), dec!(50), Some(dec!(45))), // 500 at risk
            position("B", dec!(10), dec!(200), None),
        ];
        let heat = manager().portfolio_heat(&positions, dec!(100000));
        assert_eq!(heat, dec!(0.005));
        assert_eq!(manager().status(heat), HeatStatus::Normal);
    }

    #[test]
    fn test_adjust_unchanged_below_warning() {
        let adj = manager().adjust_for_heat(dec!(100), dec!(10), dec!(0.01), dec!(100000));
        assert_eq!(adj.action, HeatAction::Unchanged);
        assert_eq!(adj.shares, dec!(100));
        assert_eq!(adj.projected_heat, dec!(0.02));
    }

    #[test]
    fn test_adjust_halves_in_warning_band() {
        // 0.03 + 101 * 10 / 100000 = 0.0401
        let adj = manager().adjust_for_heat(dec!(101), dec!(10), dec!(0.03), dec!(100000));
        assert_eq!(adj.action, HeatAction::Halved);
        assert_eq!(adj.shares, dec!(50));
        assert_eq!(adj.projected_heat, dec!(0.035));
    }

    #[test]
    fn test_adjust_blocks_at_max() {
        let adj = manager().adjust_for_heat(dec!(100), dec!(10), dec!(0.05), dec!(100000));
        assert_eq!(adj.action, HeatAction::Blocked);
        assert_eq!(adj.shares, Decimal::ZERO);
    }

    #[test]
    fn test_single_share_halves_to_block() {
        let adj = manager().adjust_for_heat(dec!(1), dec!(4500), dec!(0), dec!(100000));
        assert_eq!(adj.action, HeatAction::Blocked);
    }
}
