//! Risk Gate - admission control for new orders
//!
//! Checks run in a fixed order and stop at the first hard rejection:
//!
//! 1. Basic: positive quantity, sells covered by the open position, buys
//!    covered by cash
//! 2. Daily loss halt
//! 3. Portfolio heat (may halve the quantity)
//! 4. Correlated exposure of every multi-symbol cluster
//!
//! `admit` never mutates anything. Breaches are returned as values.
//! `admit_and_reserve` additionally holds an approved entry's risk until
//! the caller releases it, so entries still working at the broker count
//! against heat and exposure for every other caller.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};
use meridian_core::{AccountState, Position, Price, Quantity, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::correlation::{ReturnHistory, cluster_symbols};
use crate::daily::{DailyRiskManager, DailyStats, HaltEvent};
use crate::error::Result;
use crate::heat::{HeatAction, HeatStatus, PortfolioHeatManager};
use crate::parameters::RiskLimits;

/// An order about to be submitted
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub strategy_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    /// Expected fill price
    pub price: Price,
    pub stop_loss: Option<Price>,
}

impl Candidate {
    pub fn buy(
        strategy_id: impl Into<String>,
        symbol: impl Into<Symbol>,
        quantity: Quantity,
        price: Price,
        stop_loss: Option<Price>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side: Side::Buy,
            quantity,
            price,
            stop_loss,
        }
    }

    pub fn sell(
        strategy_id: impl Into<String>,
        symbol: impl Into<Symbol>,
        quantity: Quantity,
        price: Price,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side: Side::Sell,
            quantity,
            price,
            stop_loss: None,
        }
    }

    fn risk_per_share(&self) -> Decimal {
        self.stop_loss
            .map(|stop| (self.price - stop).abs())
            .unwrap_or(Decimal::ZERO)
    }
}

/// A risk violation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskViolation {
    pub check: RiskCheckType,
    pub severity: Severity,
    pub message: String,
    pub requested_value: String,
    pub limit_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskCheckType {
    InvalidQuantity,
    InsufficientPosition,
    InsufficientCash,
    TradingHalted,
    PortfolioHeat,
    CorrelatedExposure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Passed but logged
    Warning,
    /// Quantity reduced to fit within limits
    Adjusted,
    /// Hard rejection
    Rejected,
}

/// Outcome of admission control
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Approved { quantity: Quantity },
    Reduced { quantity: Quantity, violations: Vec<RiskViolation> },
    Rejected { violations: Vec<RiskViolation> },
}

impl Admission {
    pub fn is_approved(&self) -> bool {
        !matches!(self, Admission::Rejected { .. })
    }

    /// Admitted quantity, None when rejected
    pub fn quantity(&self) -> Option<Quantity> {
        match self {
            Admission::Approved { quantity } | Admission::Reduced { quantity, .. } => Some(*quantity),
            Admission::Rejected { .. } => None,
        }
    }

    pub fn violations(&self) -> &[RiskViolation] {
        match self {
            Admission::Approved { .. } => &[],
            Admission::Reduced { violations, .. } | Admission::Rejected { violations } => violations,
        }
    }

    /// Violation messages joined for logs and rejection reasons
    pub fn reason(&self) -> String {
        self.violations()
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn reject(check: RiskCheckType, message: String, requested: impl ToString, limit: impl ToString) -> Admission {
    let violation = RiskViolation {
        check,
        severity: Severity::Rejected,
        message,
        requested_value: requested.to_string(),
        limit_value: limit.to_string(),
    };
    warn!("[RISK REJECTED] {:?}: {}", violation.check, violation.message);
    Admission::Rejected {
        violations: vec![violation],
    }
}

/// Exposure of one correlated cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterExposure {
    pub symbols: Vec<Symbol>,
    pub market_value: Decimal,
    /// Fraction of portfolio value
    pub exposure: Decimal,
}

/// Point-in-time summary of portfolio risk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub heat: Decimal,
    pub heat_status: HeatStatus,
    pub max_heat: Decimal,
    pub clusters: Vec<ClusterExposure>,
    pub max_cluster_exposure: Decimal,
    pub daily: DailyStats,
    pub generated_at: Timestamp,
}

/// Admission control plus the daily halt state it consults
#[derive(Debug, Clone)]
pub struct RiskGate {
    limits: RiskLimits,
    daily: DailyRiskManager,
    heat: PortfolioHeatManager,
    /// Admitted entries not yet in the ledger, keyed by (strategy, symbol)
    reservations: BTreeMap<(String, Symbol), Position>,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Result<Self> {
        limits.validate()?;
        Ok(Self {
            daily: DailyRiskManager::new(limits.max_daily_loss_pct),
            heat: PortfolioHeatManager::new(limits.max_heat, limits.warning_heat),
            limits,
            reservations: BTreeMap::new(),
        })
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn daily(&self) -> &DailyRiskManager {
        &self.daily
    }

    pub fn daily_mut(&mut self) -> &mut DailyRiskManager {
        &mut self.daily
    }

    pub fn heat_manager(&self) -> &PortfolioHeatManager {
        &self.heat
    }

    pub fn update_portfolio_value(&mut self, value: Price, now: Timestamp) -> Option<HaltEvent> {
        self.daily.update_portfolio_value(value, now)
    }

    pub fn is_halted(&self) -> bool {
        self.daily.is_halted()
    }

    /// Ledger positions plus reserved entries the ledger does not hold yet
    pub fn book(&self, positions: &[Position]) -> Vec<Position> {
        let mut book = positions.to_vec();
        book.extend(
            self.reservations
                .values()
                .filter(|r| {
                    !positions
                        .iter()
                        .any(|p| p.strategy_id == r.strategy_id && p.symbol == r.symbol)
                })
                .cloned(),
        );
        book
    }

    /// Admit against the ledger plus outstanding reservations
    ///
    /// An admitted buy is reserved at its admitted quantity, entry price and
    /// stop until `release` is called for the same strategy and symbol.
    pub fn admit_and_reserve(
        &mut self,
        candidate: &Candidate,
        positions: &[Position],
        account: &AccountState,
        returns: &ReturnHistory,
        now: Timestamp,
    ) -> Admission {
        if candidate.side == Side::Sell {
            return self.admit(candidate, positions, account, returns);
        }

        let book = self.book(positions);
        let admission = self.admit(candidate, &book, account, returns);
        if let Some(quantity) = admission.quantity() {
            debug!(
                "[RISK] Reserved {} {} for {} (stop {:?})",
                quantity, candidate.symbol, candidate.strategy_id, candidate.stop_loss
            );
            self.reservations.insert(
                (candidate.strategy_id.clone(), candidate.symbol.clone()),
                Position {
                    strategy_id: candidate.strategy_id.clone(),
                    symbol: candidate.symbol.clone(),
                    shares: quantity,
                    entry_price: candidate.price,
                    entry_time: now,
                    stop_loss: candidate.stop_loss,
                    take_profit: None,
                },
            );
        }
        admission
    }

    /// Drop the reservation for one entry; true when one was held
    pub fn release(&mut self, strategy_id: &str, symbol: &str) -> bool {
        let released = self
            .reservations
            .remove(&(strategy_id.to_string(), symbol.to_string()))
            .is_some();
        if released {
            debug!("[RISK] Released {} reservation for {}", symbol, strategy_id);
        }
        released
    }

    /// Drop every reservation held by a strategy
    pub fn release_strategy(&mut self, strategy_id: &str) -> usize {
        let before = self.reservations.len();
        self.reservations.retain(|(owner, _), _| owner != strategy_id);
        before - self.reservations.len()
    }

    pub fn reservations(&self) -> Vec<Position> {
        self.reservations.values().cloned().collect()
    }

    /// Decide whether `candidate` may be submitted
    pub fn admit(
        &self,
        candidate: &Candidate,
        positions: &[Position],
        account: &AccountState,
        returns: &ReturnHistory,
    ) -> Admission {
        // 1. Basic checks
        if candidate.quantity <= Decimal::ZERO {
            return reject(
                RiskCheckType::InvalidQuantity,
                format!("quantity must be positive, got {}", candidate.quantity),
                candidate.quantity,
                "> 0",
            );
        }

        if candidate.side == Side::Sell {
            let open: Decimal = positions
                .iter()
                .filter(|p| p.strategy_id == candidate.strategy_id && p.symbol == candidate.symbol)
                .map(|p| p.shares)
                .sum();
            if candidate.quantity > open {
                return reject(
                    RiskCheckType::InsufficientPosition,
                    format!(
                        "sell {} {} exceeds open position {}",
                        candidate.quantity, candidate.symbol, open
                    ),
                    candidate.quantity,
                    open,
                );
            }
        } else {
            let notional = candidate.quantity * candidate.price;
            if notional > account.cash {
                return reject(
                    RiskCheckType::InsufficientCash,
                    format!("buy notional {} exceeds cash {}", notional, account.cash),
                    notional,
                    account.cash,
                );
            }
        }

        // 2. Daily halt
        if let Err(e) = self.daily.can_trade() {
            return reject(RiskCheckType::TradingHalted, e.to_string(), "trade", "halted");
        }

        // Exits reduce risk; heat and exposure only gate entries
        if candidate.side == Side::Sell {
            return Admission::Approved {
                quantity: candidate.quantity,
            };
        }

        // 3. Portfolio heat
        let pv = account.portfolio_value;
        let current_heat = self.heat.portfolio_heat(positions, pv);
        let adjustment =
            self.heat
                .adjust_for_heat(candidate.quantity, candidate.risk_per_share(), current_heat, pv);

        let mut violations = Vec::new();
        let quantity = match adjustment.action {
            HeatAction::Blocked => {
                return reject(
                    RiskCheckType::PortfolioHeat,
                    adjustment.reason,
                    candidate.quantity,
                    self.limits.max_heat,
                );
            }
            HeatAction::Halved => {
                info!("[RISK ADJUSTED] PortfolioHeat: {}", adjustment.reason);
                violations.push(RiskViolation {
                    check: RiskCheckType::PortfolioHeat,
                    severity: Severity::Adjusted,
                    message: adjustment.reason,
                    requested_value: candidate.quantity.to_string(),
                    limit_value: self.limits.warning_heat.to_string(),
                });
                adjustment.shares
            }
            HeatAction::Unchanged => candidate.quantity,
        };

        // 4. Correlated exposure
        if let Some(breach) = self.exposure_breach(candidate, quantity, positions, pv, returns) {
            return reject(
                RiskCheckType::CorrelatedExposure,
                format!(
                    "cluster [{}] exposure {:.4} exceeds {}",
                    breach.symbols.join(", "),
                    breach.exposure,
                    self.limits.max_correlated_exposure
                ),
                breach.exposure.round_dp(4),
                self.limits.max_correlated_exposure,
            );
        }

        if violations.is_empty() {
            Admission::Approved { quantity }
        } else {
            Admission::Reduced {
                quantity,
                violations,
            }
        }
    }

    fn exposure_breach(
        &self,
        candidate: &Candidate,
        quantity: Quantity,
        positions: &[Position],
        pv: Decimal,
        returns: &ReturnHistory,
    ) -> Option<ClusterExposure> {
        if pv <= Decimal::ZERO {
            return None;
        }
        let mut values = position_values(positions, &HashMap::new(), returns);
        *values.entry(candidate.symbol.clone()).or_insert(Decimal::ZERO) += quantity * candidate.price;

        let mut held: BTreeSet<Symbol> = positions.iter().map(|p| p.symbol.clone()).collect();
        held.insert(candidate.symbol.clone());
        let symbols: Vec<Symbol> = held.into_iter().collect();

        // Any correlated group over the cap blocks new entries, not just the
        // candidate's own. A lone symbol is never a correlated group.
        self.cluster_exposures(&symbols, &values, pv, returns)
            .into_iter()
            .filter(|c| c.symbols.len() > 1 && c.exposure > self.limits.max_correlated_exposure)
            .max_by(|a, b| a.exposure.cmp(&b.exposure))
    }

    fn cluster_exposures(
        &self,
        symbols: &[Symbol],
        values: &HashMap<Symbol, Decimal>,
        pv: Decimal,
        returns: &ReturnHistory,
    ) -> Vec<ClusterExposure> {
        cluster_symbols(
            symbols,
            returns,
            self.limits.correlation_threshold,
            self.limits.lookback_days,
        )
        .into_iter()
        .map(|symbols| {
            let market_value: Decimal = symbols.iter().filter_map(|s| values.get(s)).sum();
            let exposure = if pv > Decimal::ZERO {
                market_value / pv
            } else {
                Decimal::ZERO
            };
            ClusterExposure {
                symbols,
                market_value,
                exposure,
            }
        })
        .collect()
    }

    /// Heat, cluster exposure and daily state for the current book
    ///
    /// Reserved entries count toward heat and exposure.
    pub fn risk_report(
        &self,
        positions: &[Position],
        marks: &HashMap<Symbol, Price>,
        portfolio_value: Decimal,
        returns: &ReturnHistory,
        now: Timestamp,
    ) -> RiskReport {
        let book = self.book(positions);
        let heat = self.heat.portfolio_heat(&book, portfolio_value);
        let values = position_values(&book, marks, returns);
        let symbols: Vec<Symbol> = values.keys().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let clusters = self.cluster_exposures(&symbols, &values, portfolio_value, returns);
        let max_cluster_exposure = clusters
            .iter()
            .map(|c| c.exposure)
            .max()
            .unwrap_or(Decimal::ZERO);

        RiskReport {
            heat,
            heat_status: self.heat.status(heat),
            max_heat: self.limits.max_heat,
            clusters,
            max_cluster_exposure,
            daily: self.daily.daily_stats(),
            generated_at: now,
        }
    }
}

/// Market value per symbol; marks fall back to the history's last close, then entry
fn position_values(
    positions: &[Position],
    marks: &HashMap<Symbol, Price>,
    returns: &ReturnHistory,
) -> HashMap<Symbol, Decimal> {
    let mut values = HashMap::new();
    for position in positions {
        let mark = marks
            .get(&position.symbol)
            .copied()
            .or_else(|| returns.mark(&position.symbol))
            .unwrap_or(position.entry_price);
        *values.entry(position.symbol.clone()).or_insert(Decimal::ZERO) += position.market_value(mark);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn gate() -> RiskGate {
        RiskGate::new(RiskLimits::default()).unwrap()
    }

    fn account() -> AccountState {
        AccountState::with_cash(dec!(100000))
    }

    fn position(symbol: &str, shares: Decimal, entry: Decimal, stop: Option<Decimal>) -> Position {
        Position {
            strategy_id: "trend".into(),
            symbol: symbol.into(),
            shares,
            entry_price: entry,
            entry_time: Utc::now(),
            stop_loss: stop,
            take_profit: None,
        }
    }

    #[test]
    fn test_clean_entry_is_approved() {
        let candidate = Candidate::buy("trend", "AAPL", dec!(100), dec!(100), Some(dec!(98)));
        let admission = gate().admit(&candidate, &[], &account(), &ReturnHistory::new());
        assert_eq!(admission, Admission::Approved { quantity: dec!(100) });
        assert!(admission.violations().is_empty());
    }

    #[test]
    fn test_basic_checks() {
        let g = gate();
        let history = ReturnHistory::new();

        let zero = Candidate::buy("trend", "AAPL", dec!(0), dec!(100), None);
        let admission = g.admit(&zero, &[], &account(), &history);
        assert_eq!(admission.violations()[0].check, RiskCheckType::InvalidQuantity);

        let too_big = Candidate::buy("trend", "AAPL", dec!(2000), dec!(100), None);
        let admission = g.admit(&too_big, &[], &account(), &history);
        assert_eq!(admission.violations()[0].check, RiskCheckType::InsufficientCash);

        let held = vec![position("AAPL", dec!(10), dec!(100), None)];
        let oversell = Candidate::sell("trend", "AAPL", dec!(11), dec!(100));
        let admission = g.admit(&oversell, &held, &account(), &history);
        assert_eq!(admission.violations()[0].check, RiskCheckType::InsufficientPosition);

        let exit = Candidate::sell("trend", "AAPL", dec!(10), dec!(100));
        assert!(g.admit(&exit, &held, &account(), &history).is_approved());
    }

    #[test]
    fn test_halted_gate_rejects() {
        let mut g = gate();
        g.daily_mut().halt("manual");
        let candidate = Candidate::buy("trend", "AAPL", dec!(10), dec!(100), None);
        let admission = g.admit(&candidate, &[], &account(), &ReturnHistory::new());
        assert_eq!(admission.violations()[0].check, RiskCheckType::TradingHalted);
        assert!(admission.reason().contains("manual"));
    }

    #[test]
    fn test_heat_warning_reduces() {
        // Existing heat 0.035, candidate adds 0.01
        let held = vec![position("MSFT", dec!(700), dec!(100), Some(dec!(95)))];
        let candidate = Candidate::buy("trend", "AAPL", dec!(100), dec!(100), Some(dec!(90)));
        let admission = gate().admit(&candidate, &held, &account(), &ReturnHistory::new());

        match admission {
            Admission::Reduced { quantity, violations } => {
                assert_eq!(quantity, dec!(50));
                assert_eq!(violations[0].severity, Severity::Adjusted);
            }
            other => panic!("expected reduction, got {other:?}"),
        }
    }

    #[test]
    fn test_admit_is_side_effect_free() {
        let g = gate();
        let candidate = Candidate::buy("trend", "AAPL", dec!(100), dec!(100), Some(dec!(98)));
        let first = g.admit(&candidate, &[], &account(), &ReturnHistory::new());
        let second = g.admit(&candidate, &[], &account(), &ReturnHistory::new());
        assert_eq!(first, second);
        assert!(!g.is_halted());
    }

    #[test]
    fn test_risk_report() {
        let g = gate();
        let held = vec![
            position("AAPL", dec!(100), dec!(100), Some(dec!(95))),
            position("MSFT", dec!(50), dec!(200), None),
        ];
        let marks: HashMap<Symbol, Price> = [("AAPL".to_string(), dec!(110))].into_iter().collect();
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 16, 0, 0).unwrap();
        let report = g.risk_report(&held, &marks, dec!(100000), &ReturnHistory::new(), now);

        assert_eq!(report.heat, dec!(0.005));
        assert_eq!(report.heat_status, HeatStatus::Normal);
        // No history: each symbol is its own cluster
        assert_eq!(report.clusters.len(), 2);
        assert_eq!(report.clusters[0].market_value, dec!(11000));
        assert_eq!(report.max_cluster_exposure, dec!(0.11));
        assert_eq!(report.generated_at, now);
    }

    #[test]
    fn test_reservations_count_until_released() {
        let mut g = gate();
        let now = Utc::now();
        let history = ReturnHistory::new();

        // A full entry risks 2500 of 100k: 0.025 heat
        let first = Candidate::buy("trend", "AAPL", dec!(100), dec!(100), Some(dec!(75)));
        let admission = g.admit_and_reserve(&first, &[], &account(), &history, now);
        assert_eq!(admission, Admission::Approved { quantity: dec!(100) });
        assert_eq!(g.reservations().len(), 1);

        // Second strategy sees 0.025 reserved: projected 0.05 is past warning, halved
        let second = Candidate::buy("swing", "MSFT", dec!(100), dec!(100), Some(dec!(75)));
        let admission = g.admit_and_reserve(&second, &[], &account(), &history, now);
        assert_eq!(admission.quantity(), Some(dec!(50)));

        // 0.0375 reserved; another full entry projects 0.0625
        let third = Candidate::buy("breakout", "NVDA", dec!(100), dec!(100), Some(dec!(75)));
        let admission = g.admit_and_reserve(&third, &[], &account(), &history, now);
        assert_eq!(admission.violations()[0].check, RiskCheckType::PortfolioHeat);
        assert!(!admission.is_approved());
        assert_eq!(g.reservations().len(), 2);

        // Plain admit ignores reservations
        assert!(g.admit(&third, &[], &account(), &history).is_approved());

        assert!(g.release("trend", "AAPL"));
        assert!(!g.release("trend", "AAPL"));
        assert_eq!(g.release_strategy("swing"), 1);
        assert!(g.reservations().is_empty());
        assert!(g.admit_and_reserve(&third, &[], &account(), &history, now).is_approved());
    }

    #[test]
    fn test_filled_reservation_is_not_double_counted() {
        let mut g = gate();
        let now = Utc::now();
        let candidate = Candidate::buy("trend", "AAPL", dec!(100), dec!(100), Some(dec!(70)));
        g.admit_and_reserve(&candidate, &[], &account(), &ReturnHistory::new(), now);

        // Filled and booked before the reservation was released
        let held = vec![position("AAPL", dec!(100), dec!(100), Some(dec!(70)))];
        assert_eq!(g.book(&held).len(), 1);
        assert_eq!(g.book(&[]).len(), 1);
    }
}
