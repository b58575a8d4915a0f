//! Position Sizing
//!
//! Turns a signal and an account snapshot into a whole number of shares.
//! Every policy's result then passes through the portfolio heat limits.

use log::debug;
use meridian_core::{AccountState, Quantity, Signal};
use meridian_risk_manager::{HeatAction, PortfolioHeatManager};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Allocation used when Kelly inputs are not usable
const KELLY_FALLBACK_PCT: Decimal = dec!(0.05);
/// Stop distance in ATRs when the signal carries no stop
const DEFAULT_STOP_ATR: Decimal = dec!(2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizingPolicy {
    FixedDollar {
        amount: Decimal,
    },
    FixedPercent {
        pct: Decimal,
    },
    VolatilityAdjusted {
        risk_per_trade_pct: Decimal,
        stop_multiplier: Decimal,
        max_position_pct: Decimal,
    },
    Kelly {
        win_rate: Decimal,
        reward_risk: Decimal,
        safety_fraction: Decimal,
        max_position_pct: Decimal,
    },
}

impl Default for SizingPolicy {
    fn default() -> Self {
        SizingPolicy::VolatilityAdjusted {
            risk_per_trade_pct: dec!(0.01), // 1% of capital per trade
            stop_multiplier: dec!(2),       // Stop 2 ATR away
            max_position_pct: dec!(0.25),   // 25% max per position
        }
    }
}

impl SizingPolicy {
    pub fn fixed_dollar() -> Self {
        SizingPolicy::FixedDollar { amount: dec!(10000) }
    }

    pub fn fixed_percent() -> Self {
        SizingPolicy::FixedPercent { pct: dec!(0.10) }
    }

    /// Half-Kelly capped at 25%
    pub fn kelly(win_rate: Decimal, reward_risk: Decimal) -> Self {
        SizingPolicy::Kelly {
            win_rate,
            reward_risk,
            safety_fraction: dec!(0.5),
            max_position_pct: dec!(0.25),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeDecision {
    pub shares: Quantity,
    pub dollar_amount: Decimal,
    pub risk_amount: Decimal,
    pub reasoning: String,
}

impl SizeDecision {
    fn zero(reasoning: impl Into<String>) -> Self {
        Self {
            shares: Decimal::ZERO,
            dollar_amount: Decimal::ZERO,
            risk_amount: Decimal::ZERO,
            reasoning: reasoning.into(),
        }
    }
}

/// Kelly fraction of capital, clamped to [0, max]; None when inputs are unusable
pub fn kelly_fraction(win_rate: Decimal, reward_risk: Decimal, safety: Decimal, max: Decimal) -> Option<Decimal> {
    if win_rate < dec!(0.4) || win_rate > Decimal::ONE || reward_risk <= Decimal::ZERO {
        return None;
    }
    let raw = (reward_risk * win_rate - (Decimal::ONE - win_rate)) / reward_risk;
    Some((raw * safety).clamp(Decimal::ZERO, max))
}

/// Shares for `signal` under `policy` alone, before any heat limit
///
/// The backtester sizes this way; live entries go through [`PositionSizer`].
pub fn policy_size(signal: &Signal, account: &AccountState, policy: &SizingPolicy) -> SizeDecision {
    let price = signal.price;
    let pv = account.portfolio_value;
    if price <= Decimal::ZERO || pv <= Decimal::ZERO {
        return SizeDecision::zero(format!("no size at price {price} with portfolio value {pv}"));
    }

    let (shares, reasoning) = match policy {
        SizingPolicy::FixedDollar { amount } => ((*amount / price).floor(), format!("fixed ${amount}")),
        SizingPolicy::FixedPercent { pct } => (
            (pv * *pct / price).floor(),
            format!("fixed {}% of {}", *pct * Decimal::ONE_HUNDRED, pv),
        ),
        SizingPolicy::VolatilityAdjusted {
            risk_per_trade_pct,
            stop_multiplier,
            max_position_pct,
        } => {
            let Some(atr) = signal.atr.filter(|a| *a > Decimal::ZERO) else {
                return SizeDecision::zero("volatility sizing needs a positive ATR");
            };
            let risk = pv * *risk_per_trade_pct;
            let distance = atr * *stop_multiplier;
            let shares = (risk / distance).floor().max(Decimal::ONE);
            let cap = (pv * *max_position_pct / price).floor();
            (
                shares.min(cap),
                format!("risk {risk} over stop distance {distance}, cap {cap}"),
            )
        }
        SizingPolicy::Kelly {
            win_rate,
            reward_risk,
            safety_fraction,
            max_position_pct,
        } => {
            let (fraction, note) = match kelly_fraction(*win_rate, *reward_risk, *safety_fraction, *max_position_pct) {
                Some(f) => (f, "kelly"),
                None => (KELLY_FALLBACK_PCT, "kelly inputs rejected, fallback"),
            };
            (
                (pv * fraction / price).floor(),
                format!("{note} {}% of capital", (fraction * Decimal::ONE_HUNDRED).round_dp(2)),
            )
        }
    };

    let risk_per_share = risk_per_share(signal);
    SizeDecision {
        shares,
        dollar_amount: shares * price,
        risk_amount: shares * risk_per_share,
        reasoning,
    }
}

/// Stop distance: the signal's stop, else two ATRs, else nothing
fn risk_per_share(signal: &Signal) -> Decimal {
    signal
        .stop_loss
        .map(|stop| (signal.price - stop).abs())
        .or_else(|| signal.atr.map(|atr| atr * DEFAULT_STOP_ATR))
        .unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    heat: PortfolioHeatManager,
}

impl PositionSizer {
    pub fn new(heat: PortfolioHeatManager) -> Self {
        Self { heat }
    }

    /// Shares for `signal` under `policy`, after the heat cap
    pub fn size(
        &self,
        signal: &Signal,
        account: &AccountState,
        policy: &SizingPolicy,
        current_heat: Decimal,
    ) -> SizeDecision {
        let base = policy_size(signal, account, policy);
        if base.shares <= Decimal::ZERO {
            return base;
        }

        let risk_per_share = risk_per_share(signal);
        let adjustment =
            self.heat
                .adjust_for_heat(base.shares, risk_per_share, current_heat, account.portfolio_value);
        let reasoning = if adjustment.action == HeatAction::Unchanged {
            base.reasoning
        } else {
            format!("{}; {}", base.reasoning, adjustment.reason)
        };
        let shares = adjustment.shares;

        debug!(
            "[SIZING] {} {} shares @ {} ({})",
            signal.symbol, shares, signal.price, reasoning
        );
        SizeDecision {
            shares,
            dollar_amount: shares * signal.price,
            risk_amount: shares * risk_per_share,
            reasoning,
        }
    }
}
