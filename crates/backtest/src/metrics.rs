//! Performance metrics
//!
//! Pure functions: an equity curve or a trade list in, a number out.

use meridian_core::TradeRecord;
use rust_decimal::Decimal;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Bar-to-bar fractional changes; points after a non-positive value are skipped
pub fn pct_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Largest peak-to-trough fall, as a positive percentage
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst * 100.0
}

/// Annualized Sharpe of bar returns (zero risk-free rate, sample std)
///
/// 0.0 with fewer than two returns or no variance.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    let returns = pct_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = sample_std(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Gross profit over gross loss; a book with no losers divides by 1
pub fn profit_factor(trades: &[TradeRecord]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }
    let gross_profit: Decimal = trades.iter().filter(|t| t.pnl > Decimal::ZERO).map(|t| t.pnl).sum();
    let gross_loss: Decimal = trades
        .iter()
        .filter(|t| t.pnl < Decimal::ZERO)
        .map(|t| t.pnl.abs())
        .sum();
    let gross_loss = if gross_loss.is_zero() { Decimal::ONE } else { gross_loss };
    gross_profit / gross_loss
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
