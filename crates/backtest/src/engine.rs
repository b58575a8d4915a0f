//! Backtest engine
//!
//! Replays each symbol's bars through the same signal generator, sizing
//! policy, order store and position ledger the live worker uses. Each
//! symbol trades its own slice of the capital. Within a bar the order is
//! fixed: equity snapshot, then exits, then entries.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use meridian_core::{AccountState, Bar, CloseReason, OrderRequest, Price, Side, Signal, Symbol, Timestamp, TradeRecord};
use meridian_order_manager::{OrderManager, PositionLedger, policy_size};
use meridian_strategy::{FeatureSnapshot, Strategy};
use rust_decimal::Decimal;

use crate::config::BacktestConfig;
use crate::error::{BacktestError, Result};
use crate::result::{AggregateStats, BacktestResult, EquityPoint, SymbolStats, combine_curves};

pub struct BacktestEngine {
    config: BacktestConfig,
    strategy: Box<dyn Strategy>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        let strategy = config.params.build()?;
        Ok(Self { config, strategy })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Replay every symbol with at least `warmup_bars` bars
    pub fn run(&self, data: &BTreeMap<Symbol, Vec<Bar>>) -> Result<BacktestResult> {
        let warmup = self.config.warmup_bars;
        let (valid, skipped): (Vec<_>, Vec<_>) = data.iter().partition(|(_, bars)| bars.len() >= warmup.max(1));
        let skipped: Vec<Symbol> = skipped.into_iter().map(|(s, _)| s.clone()).collect();
        for symbol in &skipped {
            warn!("[BACKTEST] Skipping {}: fewer than {} bars", symbol, warmup);
        }
        if valid.is_empty() {
            return Err(BacktestError::NoData { warmup });
        }

        let capital = self.config.initial_capital / Decimal::from(valid.len());
        info!(
            "[BACKTEST] {} on {} symbols, {} each",
            self.strategy.name(),
            valid.len(),
            capital
        );

        let mut per_symbol = BTreeMap::new();
        let mut symbol_curves = BTreeMap::new();
        let mut starting = BTreeMap::new();
        let mut trades = Vec::new();
        for (symbol, bars) in valid {
            let mut bars = bars.clone();
            bars.sort_by_key(|b| b.timestamp);

            let run = self.run_symbol(symbol, &bars, capital)?;
            let stats = SymbolStats::compute(symbol, capital, run.cash, &run.trades, &run.curve);
            info!(
                "[BACKTEST] {}: {} trades, return {:.2}%, max drawdown {:.2}%",
                symbol, stats.total_trades, stats.total_return_pct, stats.max_drawdown_pct
            );

            per_symbol.insert(symbol.clone(), stats);
            starting.insert(symbol.clone(), capital);
            symbol_curves.insert(symbol.clone(), run.curve);
            trades.extend(run.trades);
        }

        let aggregate = AggregateStats::compute(&per_symbol, &trades);
        let equity_curve = combine_curves(&symbol_curves, &starting);
        Ok(BacktestResult {
            per_symbol,
            aggregate,
            trades,
            equity_curve,
            symbol_curves,
            skipped,
        })
    }

    fn run_symbol(&self, symbol: &str, bars: &[Bar], capital: Decimal) -> Result<SymbolRun> {
        let mut run = SymbolRun::new(&self.config, symbol, capital);
        let start = self.config.warmup_bars.min(bars.len().saturating_sub(1));

        for i in start..bars.len() {
            let bar = &bars[i];
            run.mark(bar);

            let window_start = (i + 1).saturating_sub(self.config.lookback_bars);
            let snapshot = FeatureSnapshot::new(symbol, bars[window_start..=i].to_vec());
            let signal = match self
                .config
                .generator
                .generate_with(&self.config.strategy_id, self.strategy.as_ref(), &snapshot)
            {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("[BACKTEST] {} signal error at {}: {}", symbol, bar.timestamp, e);
                    None
                }
            };

            let exited = run.check_exit(bar, signal.as_ref())?;
            if !exited
                && !run.holding()
                && let Some(signal) = signal.filter(|s| s.is_buy() && s.confidence >= self.config.min_confidence)
            {
                run.enter(bar, signal)?;
            }
        }

        if let Some(last) = bars.last()
            && run.holding()
        {
            run.close(last.close, CloseReason::EndOfRun, last.timestamp)?;
        }
        Ok(run)
    }
}

/// One symbol's synthetic account
struct SymbolRun<'a> {
    config: &'a BacktestConfig,
    symbol: Symbol,
    cash: Decimal,
    orders: OrderManager,
    ledger: PositionLedger,
    entry_commission: Decimal,
    trades: Vec<TradeRecord>,
    curve: Vec<EquityPoint>,
}

impl<'a> SymbolRun<'a> {
    fn new(config: &'a BacktestConfig, symbol: &str, capital: Decimal) -> Self {
        Self {
            config,
            symbol: symbol.to_string(),
            cash: capital,
            orders: OrderManager::new(),
            ledger: PositionLedger::new(),
            entry_commission: Decimal::ZERO,
            trades: Vec::new(),
            curve: Vec::new(),
        }
    }

    fn holding(&self) -> bool {
        self.ledger.contains(&self.config.strategy_id, &self.symbol)
    }

    /// Equity at the bar's close, before anything trades on it
    fn mark(&mut self, bar: &Bar) {
        let positions_value = self
            .ledger
            .get(&self.config.strategy_id, &self.symbol)
            .map(|p| p.market_value(bar.close))
            .unwrap_or_default();
        self.curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.cash + positions_value,
            cash: self.cash,
            positions_value,
        });
    }

    /// Stop or target inside the bar's range first, then a sell signal at the close
    fn check_exit(&mut self, bar: &Bar, signal: Option<&Signal>) -> Result<bool> {
        let id = &self.config.strategy_id;
        let opened_before = self
            .ledger
            .get(id, &self.symbol)
            .is_some_and(|p| p.entry_time < bar.timestamp);
        if !opened_before {
            return Ok(false);
        }

        if let Some(trigger) = self.ledger.check_bar(id, &self.symbol, bar.low, bar.high) {
            self.close(trigger.exit_price(), trigger.close_reason(), bar.timestamp)?;
            return Ok(true);
        }
        if signal.is_some_and(|s| s.is_sell()) {
            self.close(bar.close, CloseReason::Signal, bar.timestamp)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn enter(&mut self, bar: &Bar, signal: Signal) -> Result<()> {
        let price = bar.close;
        let mut signal = signal;
        if signal.stop_loss.is_none()
            && let Some(atr) = signal.atr
        {
            let stop = price - self.config.stop_multiplier * atr;
            signal = signal.with_stop_loss(stop);
        }

        let account = AccountState::with_cash(self.cash);
        let size = policy_size(&signal, &account, &self.config.sizing);
        if size.shares <= Decimal::ZERO {
            debug!("[BACKTEST] {} sized to zero: {}", self.symbol, size.reasoning);
            return Ok(());
        }
        let notional = size.shares * price;
        let commission = notional * self.config.commission_rate;
        if notional + commission > self.cash {
            debug!(
                "[BACKTEST] {} entry {} plus commission exceeds cash {}",
                self.symbol, notional, self.cash
            );
            return Ok(());
        }

        let request =
            OrderRequest::market(self.symbol.clone(), Side::Buy, size.shares).with_strategy(self.config.strategy_id.clone());
        let order = self.orders.simulate_fill(request, price, bar.timestamp)?;
        self.cash -= notional + commission;
        self.entry_commission = commission;
        self.ledger.open(
            &self.config.strategy_id,
            &self.symbol,
            order.filled_quantity,
            price,
            signal.stop_loss,
            signal.take_profit,
            bar.timestamp,
        )?;
        debug!(
            "[BACKTEST] {} BUY {} @ {} stop {:?} target {:?}",
            self.symbol, order.filled_quantity, price, signal.stop_loss, signal.take_profit
        );
        Ok(())
    }

    /// Sell the whole position; the record's pnl is net of both commissions
    fn close(&mut self, price: Price, reason: CloseReason, at: Timestamp) -> Result<()> {
        let Some(shares) = self.ledger.get(&self.config.strategy_id, &self.symbol).map(|p| p.shares) else {
            return Ok(());
        };
        let request =
            OrderRequest::market(self.symbol.clone(), Side::Sell, shares).with_strategy(self.config.strategy_id.clone());
        self.orders.simulate_fill(request, price, at)?;

        let notional = shares * price;
        let commission = notional * self.config.commission_rate;
        self.cash += notional - commission;

        let mut record = self
            .ledger
            .close(&self.config.strategy_id, &self.symbol, price, None, reason, at)?;
        record.pnl -= self.entry_commission + commission;
        let cost = record.entry_price * record.shares;
        if cost > Decimal::ZERO {
            record.return_pct = record.pnl / cost * Decimal::ONE_HUNDRED;
        }
        self.entry_commission = Decimal::ZERO;

        debug!(
            "[BACKTEST] {} SELL {} @ {} ({:?}, net pnl {})",
            self.symbol, shares, price, reason, record.pnl
        );
        self.trades.push(record);
        Ok(())
    }
}
