//! Backtest results and summary statistics

use std::collections::BTreeMap;

use meridian_core::{Symbol, Timestamp, TradeRecord};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::metrics;

/// Account value at one bar's close, recorded before that bar's exits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub equity: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub symbol: Symbol,
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_trades: usize,
    pub total_return_pct: Decimal,
    pub win_rate_pct: Decimal,
    pub avg_trade_return_pct: Decimal,
    pub best_trade_pct: Decimal,
    pub worst_trade_pct: Decimal,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: Decimal,
    pub avg_days_held: f64,
}

impl SymbolStats {
    /// Statistics for one symbol's account; a symbol that never traded reports zeros
    pub fn compute(
        symbol: &str,
        initial_capital: Decimal,
        final_capital: Decimal,
        trades: &[TradeRecord],
        curve: &[EquityPoint],
    ) -> Self {
        let mut stats = Self {
            symbol: symbol.to_string(),
            initial_capital,
            final_capital,
            ..Self::default()
        };
        if trades.is_empty() {
            return stats;
        }

        let count = Decimal::from(trades.len());
        let winners = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count();
        let returns: Vec<Decimal> = trades.iter().map(|t| t.return_pct).collect();
        let equity: Vec<f64> = curve.iter().map(|p| p.equity.to_f64().unwrap_or(0.0)).collect();
        let days: Vec<f64> = trades.iter().map(|t| t.days_held() as f64).collect();

        stats.total_trades = trades.len();
        if initial_capital > Decimal::ZERO {
            stats.total_return_pct = (final_capital - initial_capital) / initial_capital * Decimal::ONE_HUNDRED;
        }
        stats.win_rate_pct = Decimal::from(winners) / count * Decimal::ONE_HUNDRED;
        stats.avg_trade_return_pct = returns.iter().sum::<Decimal>() / count;
        stats.best_trade_pct = returns.iter().copied().max().unwrap_or_default();
        stats.worst_trade_pct = returns.iter().copied().min().unwrap_or_default();
        stats.max_drawdown_pct = metrics::max_drawdown_pct(&equity);
        stats.sharpe_ratio = metrics::sharpe_ratio(&equity);
        stats.profit_factor = metrics::profit_factor(trades);
        stats.avg_days_held = metrics::mean(&days);
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_return_pct: Decimal,
    pub total_trades: usize,
    pub symbols_tested: usize,
    pub avg_return_per_symbol_pct: Decimal,
    /// Mean over symbols that traded
    pub avg_win_rate_pct: Decimal,
    /// Mean over symbols with a non-zero ratio
    pub avg_sharpe_ratio: f64,
    /// Worst single-symbol drawdown
    pub max_drawdown_pct: f64,
    /// Over every trade in the run
    pub profit_factor: Decimal,
}

impl AggregateStats {
    pub fn compute(per_symbol: &BTreeMap<Symbol, SymbolStats>, trades: &[TradeRecord]) -> Self {
        if per_symbol.is_empty() {
            return Self::default();
        }
        let initial_capital: Decimal = per_symbol.values().map(|s| s.initial_capital).sum();
        let final_capital: Decimal = per_symbol.values().map(|s| s.final_capital).sum();
        let total_return_pct = if initial_capital > Decimal::ZERO {
            (final_capital - initial_capital) / initial_capital * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let returns: Vec<Decimal> = per_symbol.values().map(|s| s.total_return_pct).collect();
        let win_rates: Vec<Decimal> = per_symbol
            .values()
            .filter(|s| s.total_trades > 0)
            .map(|s| s.win_rate_pct)
            .collect();
        let sharpes: Vec<f64> = per_symbol
            .values()
            .map(|s| s.sharpe_ratio)
            .filter(|s| *s != 0.0)
            .collect();

        Self {
            initial_capital,
            final_capital,
            total_return_pct,
            total_trades: per_symbol.values().map(|s| s.total_trades).sum(),
            symbols_tested: per_symbol.len(),
            avg_return_per_symbol_pct: decimal_mean(&returns),
            avg_win_rate_pct: decimal_mean(&win_rates),
            avg_sharpe_ratio: metrics::mean(&sharpes),
            max_drawdown_pct: per_symbol.values().map(|s| s.max_drawdown_pct).fold(0.0, f64::max),
            profit_factor: metrics::profit_factor(trades),
        }
    }
}

fn decimal_mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub per_symbol: BTreeMap<Symbol, SymbolStats>,
    pub aggregate: AggregateStats,
    /// Every closed trade, grouped by symbol in symbol order
    pub trades: Vec<TradeRecord>,
    /// Sum of the per-symbol curves
    pub equity_curve: Vec<EquityPoint>,
    pub symbol_curves: BTreeMap<Symbol, Vec<EquityPoint>>,
    /// Symbols dropped for having fewer bars than the warm-up
    pub skipped: Vec<Symbol>,
}

impl BacktestResult {
    pub fn trades_for(&self, symbol: &str) -> Vec<&TradeRecord> {
        self.trades.iter().filter(|t| t.symbol == symbol).collect()
    }
}

/// Sum per-symbol curves by timestamp
///
/// A symbol with no point at a timestamp contributes its last point, or its
/// starting capital (all cash) before its first.
pub fn combine_curves(
    curves: &BTreeMap<Symbol, Vec<EquityPoint>>,
    starting: &BTreeMap<Symbol, Decimal>,
) -> Vec<EquityPoint> {
    let mut timestamps: Vec<Timestamp> = curves.values().flatten().map(|p| p.timestamp).collect();
    timestamps.sort();
    timestamps.dedup();

    let mut cursors: BTreeMap<&Symbol, usize> = curves.keys().map(|s| (s, 0)).collect();
    let mut combined = Vec::with_capacity(timestamps.len());
    for ts in timestamps {
        let mut point = EquityPoint {
            timestamp: ts,
            equity: Decimal::ZERO,
            cash: Decimal::ZERO,
            positions_value: Decimal::ZERO,
        };
        for (symbol, curve) in curves {
            let Some(cursor) = cursors.get_mut(symbol) else {
                continue;
            };
            while *cursor < curve.len() && curve[*cursor].timestamp <= ts {
                *cursor += 1;
            }
            match cursor.checked_sub(1).and_then(|i| curve.get(i)) {
                Some(last) => {
                    point.equity += last.equity;
                    point.cash += last.cash;
                    point.positions_value += last.positions_value;
                }
                None => {
                    let cash = starting.get(symbol).copied().unwrap_or_default();
                    point.equity += cash;
                    point.cash += cash;
                }
            }
        }
        combined.push(point);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn point(day: i64, equity: Decimal, cash: Decimal) -> EquityPoint {
        EquityPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap() + Duration::days(day),
            equity,
            cash,
            positions_value: equity - cash,
        }
    }

    #[test]
    fn test_combine_carries_forward() {
        let mut curves = BTreeMap::new();
        curves.insert(
            "AAPL".to_string(),
            vec![point(0, dec!(100), dec!(100)), point(1, dec!(110), dec!(10)), point(2, dec!(120), dec!(10))],
        );
        // MSFT starts a day late and misses day 2
        curves.insert("MSFT".to_string(), vec![point(1, dec!(95), dec!(5))]);
        let starting = BTreeMap::from([("AAPL".to_string(), dec!(100)), ("MSFT".to_string(), dec!(100))]);

        let combined = combine_curves(&curves, &starting);
        let equity: Vec<Decimal> = combined.iter().map(|p| p.equity).collect();
        assert_eq!(equity, vec![dec!(200), dec!(205), dec!(215)]);
        assert_eq!(combined[2].cash, dec!(15));
        assert_eq!(combined[2].positions_value, dec!(200));
    }

    #[test]
    fn test_symbol_without_trades_reports_zeros() {
        let stats = SymbolStats::compute("SPY", dec!(5000), dec!(5000), &[], &[point(0, dec!(5000), dec!(5000))]);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.total_return_pct, Decimal::ZERO);
        assert_eq!(stats.max_drawdown_pct, 0.0);
    }

    #[test]
    fn test_aggregate_averages() {
        let mut per_symbol = BTreeMap::new();
        per_symbol.insert(
            "AAPL".to_string(),
            SymbolStats {
                symbol: "AAPL".into(),
                initial_capital: dec!(50000),
                final_capital: dec!(55000),
                total_trades: 2,
                total_return_pct: dec!(10),
                win_rate_pct: dec!(50),
                max_drawdown_pct: 4.0,
                sharpe_ratio: 1.5,
                ..SymbolStats::default()
            },
        );
        per_symbol.insert(
            "SPY".to_string(),
            SymbolStats {
                symbol: "SPY".into(),
                initial_capital: dec!(50000),
                final_capital: dec!(50000),
                ..SymbolStats::default()
            },
        );

        let agg = AggregateStats::compute(&per_symbol, &[]);
        assert_eq!(agg.initial_capital, dec!(100000));
        assert_eq!(agg.final_capital, dec!(105000));
        assert_eq!(agg.total_return_pct, dec!(5));
        assert_eq!(agg.avg_return_per_symbol_pct, dec!(5));
        // Only AAPL traded
        assert_eq!(agg.avg_win_rate_pct, dec!(50));
        assert_eq!(agg.avg_sharpe_ratio, 1.5);
        assert_eq!(agg.max_drawdown_pct, 4.0);
        assert_eq!(agg.total_trades, 2);
    }
}
