//! Trade History
//!
//! Append-only log of closed trades with filtering and performance
//! statistics. Persisted as a JSON array.

use std::fs;
use std::path::Path;

use log::info;
use meridian_core::{TradeRecord, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Selects which trades feed a performance summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeFilter {
    pub strategy_id: Option<String>,
    pub symbol: Option<String>,
    /// Inclusive lower bound on exit time
    pub start: Option<Timestamp>,
    /// Inclusive upper bound on exit time
    pub end: Option<Timestamp>,
}

impl TradeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn strategy(strategy_id: impl Into<String>) -> Self {
        Self {
            strategy_id: Some(strategy_id.into()),
            ..Self::default()
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_range(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    fn matches(&self, trade: &TradeRecord) -> bool {
        self.strategy_id.as_ref().is_none_or(|s| *s == trade.strategy_id)
            && self.symbol.as_ref().is_none_or(|s| *s == trade.symbol)
            && self.start.is_none_or(|start| trade.exit_time >= start)
            && self.end.is_none_or(|end| trade.exit_time <= end)
    }
}

/// Summary statistics over a set of closed trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total: usize,
    pub winning: usize,
    pub losing: usize,
    /// Fraction of trades with positive PnL (0.0 - 1.0)
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub avg_pnl: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    /// Gross profit over gross loss; a zero gross loss counts as one
    pub profit_factor: Decimal,
}

impl PerformanceStats {
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a TradeRecord>) -> Self {
        let mut stats = PerformanceStats::default();
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;

        for trade in trades {
            stats.total += 1;
            stats.total_pnl += trade.pnl;
            if trade.pnl > Decimal::ZERO {
                stats.winning += 1;
                gross_profit += trade.pnl;
                stats.largest_win = stats.largest_win.max(trade.pnl);
            } else if trade.pnl < Decimal::ZERO {
                stats.losing += 1;
                gross_loss += trade.pnl.abs();
                stats.largest_loss = stats.largest_loss.min(trade.pnl);
            }
        }

        if stats.total == 0 {
            return stats;
        }

        let total = Decimal::from(stats.total);
        stats.win_rate = Decimal::from(stats.winning) / total;
        stats.avg_pnl = stats.total_pnl / total;
        if stats.winning > 0 {
            stats.avg_win = gross_profit / Decimal::from(stats.winning);
        }
        if stats.losing > 0 {
            stats.avg_loss = -gross_loss / Decimal::from(stats.losing);
        }
        let denominator = if gross_loss.is_zero() { Decimal::ONE } else { gross_loss };
        stats.profit_factor = gross_profit / denominator;
        stats
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradeHistory {
    trades: Vec<TradeRecord>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn by_strategy(&self, strategy_id: &str) -> Vec<&TradeRecord> {
        self.trades.iter().filter(|t| t.strategy_id == strategy_id).collect()
    }

    pub fn by_symbol(&self, symbol: &str) -> Vec<&TradeRecord> {
        self.trades.iter().filter(|t| t.symbol == symbol).collect()
    }

    /// Trades whose exit falls in `[start, end]`
    pub fn in_range(&self, start: Timestamp, end: Timestamp) -> Vec<&TradeRecord> {
        self.trades
            .iter()
            .filter(|t| t.exit_time >= start && t.exit_time <= end)
            .collect()
    }

    /// Last `n` trades, newest first
    pub fn recent(&self, n: usize) -> Vec<&TradeRecord> {
        self.trades.iter().rev().take(n).collect()
    }

    pub fn performance(&self, filter: &TradeFilter) -> PerformanceStats {
        PerformanceStats::from_trades(self.trades.iter().filter(|t| filter.matches(t)))
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.trades)?;
        fs::write(path.as_ref(), json)?;
        info!("Saved {} trades to {}", self.trades.len(), path.as_ref().display());
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let trades: Vec<TradeRecord> = serde_json::from_str(&raw)?;
        Ok(Self { trades })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use meridian_core::CloseReason;
    use rust_decimal_macros::dec;

    fn trade(strategy: &str, symbol: &str, entry: Decimal, exit: Decimal, day: i64) -> TradeRecord {
        let entry_time = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap() + Duration::days(day);
        TradeRecord {
            strategy_id: strategy.into(),
            symbol: symbol.into(),
            shares: dec!(10),
            entry_price: entry,
            exit_price: exit,
            entry_time,
            exit_time: entry_time + Duration::days(2),
            pnl: (exit - entry) * dec!(10),
            return_pct: (exit - entry) / entry * dec!(100),
            close_reason: CloseReason::Signal,
        }
    }

    fn history() -> TradeHistory {
        let mut h = TradeHistory::new();
        h.record(trade("trend", "AAPL", dec!(100), dec!(110), 0)); // +100
        h.record(trade("trend", "MSFT", dec!(200), dec!(190), 1)); // -100
        h.record(trade("revert", "AAPL", dec!(50), dec!(53), 2)); // +30
        h.record(trade("trend", "AAPL", dec!(100), dec!(95), 3)); // -50
        h
    }

    #[test]
    fn test_queries() {
        let h = history();
        assert_eq!(h.by_strategy("trend").len(), 3);
        assert_eq!(h.by_symbol("AAPL").len(), 3);

        let recent = h.recent(2);
        assert_eq!(recent[0].pnl, dec!(-50));
        assert_eq!(recent[1].pnl, dec!(30));

        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        // Exits on 03-03, 03-04 15:00, 03-05 15:00, 03-06
        assert_eq!(h.in_range(start, end).len(), 1);
    }

    #[test]
    fn test_performance() {
        let stats = history().performance(&TradeFilter::all());
        assert_eq!(stats.total, 4);
        assert_eq!(stats.winning, 2);
        assert_eq!(stats.losing, 2);
        assert_eq!(stats.win_rate, dec!(0.5));
        assert_eq!(stats.total_pnl, dec!(-20));
        assert_eq!(stats.avg_pnl, dec!(-5));
        assert_eq!(stats.avg_win, dec!(65));
        assert_eq!(stats.avg_loss, dec!(-75));
        assert_eq!(stats.largest_win, dec!(100));
        assert_eq!(stats.largest_loss, dec!(-100));
        assert_eq!(stats.profit_factor, dec!(130) / dec!(150));
    }

    #[test]
    fn test_filtered_performance_without_losses() {
        let stats = history().performance(&TradeFilter::strategy("revert"));
        assert_eq!(stats.total, 1);
        assert_eq!(stats.profit_factor, dec!(30));

        let stats = history().performance(&TradeFilter::strategy("trend").with_symbol("AAPL"));
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_pnl, dec!(50));

        assert_eq!(TradeHistory::new().performance(&TradeFilter::all()), PerformanceStats::default());
    }

    #[test]
    fn test_json_persistence() {
        let path = std::env::temp_dir().join(format!("meridian_history_{}.json", std::process::id()));
        let h = history();
        h.save_json(&path).unwrap();
        let loaded = TradeHistory::load_json(&path).unwrap();
        assert_eq!(loaded.trades(), h.trades());
        let _ = std::fs::remove_file(&path);
    }
}
