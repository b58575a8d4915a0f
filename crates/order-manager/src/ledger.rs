//! Position Ledger
//!
//! One long position per (strategy, symbol). Opening twice is an error;
//! closing produces the immutable `TradeRecord` for the closed shares.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::info;
use meridian_core::{CloseReason, Position, Price, Quantity, Symbol, Timestamp, TradeRecord};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Protective level hit by a price or bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    StopLoss { level: Price },
    TakeProfit { level: Price },
}

impl ExitTrigger {
    /// Fill price for the exit: the level itself, not the bar extreme
    pub fn exit_price(&self) -> Price {
        match self {
            ExitTrigger::StopLoss { level } | ExitTrigger::TakeProfit { level } => *level,
        }
    }

    pub fn close_reason(&self) -> CloseReason {
        match self {
            ExitTrigger::StopLoss { .. } => CloseReason::StopLoss,
            ExitTrigger::TakeProfit { .. } => CloseReason::TakeProfit,
        }
    }
}

type Key = (String, Symbol);

#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: BTreeMap<Key, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(strategy_id: &str, symbol: &str) -> Key {
        (strategy_id.to_string(), symbol.to_string())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        strategy_id: &str,
        symbol: &str,
        shares: Quantity,
        price: Price,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
        at: Timestamp,
    ) -> Result<&Position> {
        if shares <= Decimal::ZERO {
            return Err(Error::InvalidQuantity(shares));
        }
        let key = Self::key(strategy_id, symbol);
        if self.positions.contains_key(&key) {
            return Err(Error::PositionExists {
                strategy_id: strategy_id.to_string(),
                symbol: symbol.to_string(),
            });
        }

        info!(
            "[{}] Opened {} {} @ {} (stop {:?}, target {:?})",
            strategy_id, shares, symbol, price, stop_loss, take_profit
        );
        let position = Position {
            strategy_id: strategy_id.to_string(),
            symbol: symbol.to_string(),
            shares,
            entry_price: price,
            entry_time: at,
            stop_loss,
            take_profit,
        };
        Ok(self.positions.entry(key).or_insert(position))
    }

    /// Close `quantity` shares (all when None) at `exit_price`
    pub fn close(
        &mut self,
        strategy_id: &str,
        symbol: &str,
        exit_price: Price,
        quantity: Option<Quantity>,
        reason: CloseReason,
        at: Timestamp,
    ) -> Result<TradeRecord> {
        let key = Self::key(strategy_id, symbol);
        let position = self.positions.get_mut(&key).ok_or_else(|| Error::PositionNotFound {
            strategy_id: strategy_id.to_string(),
            symbol: symbol.to_string(),
        })?;

        let shares = quantity.unwrap_or(position.shares);
        if shares <= Decimal::ZERO {
            return Err(Error::InvalidQuantity(shares));
        }
        if shares > position.shares {
            return Err(Error::CloseExceedsPosition {
                symbol: symbol.to_string(),
                requested: shares,
                open: position.shares,
            });
        }

        let record = TradeRecord::from_close(position, shares, exit_price, at, reason);
        position.shares -= shares;
        if position.shares.is_zero() {
            self.positions.remove(&key);
        }

        info!(
            "[{}] Closed {} {} @ {} ({:?}) pnl {}",
            strategy_id, shares, symbol, exit_price, reason, record.pnl
        );
        Ok(record)
    }

    /// Stop when price <= stop, target when price >= target
    pub fn check_stop_take_profit(&self, strategy_id: &str, symbol: &str, price: Price) -> Option<ExitTrigger> {
        let position = self.get(strategy_id, symbol)?;
        if let Some(stop) = position.stop_loss
            && price <= stop
        {
            return Some(ExitTrigger::StopLoss { level: stop });
        }
        if let Some(target) = position.take_profit
            && price >= target
        {
            return Some(ExitTrigger::TakeProfit { level: target });
        }
        None
    }

    /// Check a bar's range: stop against the low first, then target against the high
    pub fn check_bar(&self, strategy_id: &str, symbol: &str, low: Price, high: Price) -> Option<ExitTrigger> {
        let position = self.get(strategy_id, symbol)?;
        if let Some(stop) = position.stop_loss
            && low <= stop
        {
            return Some(ExitTrigger::StopLoss { level: stop });
        }
        if let Some(target) = position.take_profit
            && high >= target
        {
            return Some(ExitTrigger::TakeProfit { level: target });
        }
        None
    }

    pub fn get(&self, strategy_id: &str, symbol: &str) -> Option<&Position> {
        self.positions.get(&Self::key(strategy_id, symbol))
    }

    pub fn contains(&self, strategy_id: &str, symbol: &str) -> bool {
        self.get(strategy_id, symbol).is_some()
    }

    /// All positions, ordered by (strategy, symbol)
    pub fn positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    pub fn positions_for_strategy(&self, strategy_id: &str) -> Vec<Position> {
        self.positions
            .values()
            .filter(|p| p.strategy_id == strategy_id)
            .cloned()
            .collect()
    }

    /// Distinct held symbols, ascending
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        self.positions.values().map(|p| p.symbol.clone()).collect()
    }

    /// Unrealized PnL across positions with a mark; unmarked positions count zero
    pub fn unrealized_pnl(&self, marks: &HashMap<Symbol, Price>) -> Decimal {
        self.positions
            .values()
            .filter_map(|p| marks.get(&p.symbol).map(|m| p.unrealized_pnl(*m)))
            .sum()
    }

    /// Total market value, marking unmarked positions at entry
    pub fn market_value(&self, marks: &HashMap<Symbol, Price>) -> Decimal {
        self.positions
            .values()
            .map(|p| p.market_value(marks.get(&p.symbol).copied().unwrap_or(p.entry_price)))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 2, 5, 15, 0, 0).unwrap()
    }

    fn ledger_with_position() -> PositionLedger {
        let mut ledger = PositionLedger::new();
        ledger
            .open("trend", "AAPL", dec!(100), dec!(100), Some(dec!(95)), Some(dec!(110)), t0())
            .unwrap();
        ledger
    }

    #[test]
    fn test_one_position_per_pair() {
        let mut ledger = ledger_with_position();
        let err = ledger
            .open("trend", "AAPL", dec!(10), dec!(101), None, None, t0())
            .unwrap_err();
        assert!(matches!(err, Error::PositionExists { .. }));

        // Another strategy may hold the same symbol
        ledger
            .open("breakout", "AAPL", dec!(10), dec!(101), None, None, t0())
            .unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.symbols().len(), 1);
    }

    #[test]
    fn test_partial_then_full_close() {
        let mut ledger = ledger_with_position();
        let later = t0() + Duration::days(3);

        let partial = ledger
            .close("trend", "AAPL", dec!(104), Some(dec!(40)), CloseReason::Signal, later)
            .unwrap();
        assert_eq!(partial.pnl, dec!(160));
        assert_eq!(ledger.get("trend", "AAPL").unwrap().shares, dec!(60));

        let rest = ledger
            .close("trend", "AAPL", dec!(98), None, CloseReason::Signal, later)
            .unwrap();
        assert_eq!(rest.shares, dec!(60));
        assert_eq!(rest.pnl, dec!(-120));
        assert_eq!(rest.days_held(), 3);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_close_validation() {
        let mut ledger = ledger_with_position();
        let err = ledger
            .close("trend", "AAPL", dec!(100), Some(dec!(101)), CloseReason::Signal, t0())
            .unwrap_err();
        assert!(matches!(err, Error::CloseExceedsPosition { .. }));

        let err = ledger
            .close("trend", "AAPL", dec!(100), Some(dec!(0)), CloseReason::Signal, t0())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuantity(_)));

        let err = ledger
            .close("trend", "MSFT", dec!(100), None, CloseReason::Signal, t0())
            .unwrap_err();
        assert!(matches!(err, Error::PositionNotFound { .. }));
    }

    #[test]
    fn test_stop_fills_at_level_not_low() {
        let ledger = ledger_with_position();
        let trigger = ledger.check_bar("trend", "AAPL", dec!(94), dec!(99)).unwrap();
        assert_eq!(trigger, ExitTrigger::StopLoss { level: dec!(95) });
        assert_eq!(trigger.exit_price(), dec!(95));
        assert_eq!(trigger.close_reason(), CloseReason::StopLoss);
    }

    #[test]
    fn test_stop_checked_before_target() {
        let ledger = ledger_with_position();
        // Bar spans both levels
        let trigger = ledger.check_bar("trend", "AAPL", dec!(94), dec!(111)).unwrap();
        assert_eq!(trigger.close_reason(), CloseReason::StopLoss);

        let trigger = ledger.check_bar("trend", "AAPL", dec!(99), dec!(111)).unwrap();
        assert_eq!(trigger, ExitTrigger::TakeProfit { level: dec!(110) });

        assert!(ledger.check_bar("trend", "AAPL", dec!(96), dec!(109)).is_none());
    }

    #[test]
    fn test_price_checks_and_marks() {
        let ledger = ledger_with_position();
        assert!(ledger.check_stop_take_profit("trend", "AAPL", dec!(95)).is_some());
        assert!(ledger.check_stop_take_profit("trend", "AAPL", dec!(110)).is_some());
        assert!(ledger.check_stop_take_profit("trend", "AAPL", dec!(100)).is_none());

        let marks: HashMap<Symbol, Price> = [("AAPL".to_string(), dec!(103))].into_iter().collect();
        assert_eq!(ledger.unrealized_pnl(&marks), dec!(300));
        assert_eq!(ledger.market_value(&marks), dec!(10300));
    }
}
