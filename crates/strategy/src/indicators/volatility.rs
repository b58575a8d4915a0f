//! True range, ATR and ADX.
//!
//! ATR here is the rolling mean of true range. ADX uses Wilder smoothing for
//! the directional movement and its own average.

use super::sma;

/// True range; the first bar has no previous close so TR[0] = high - low
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    let mut tr = vec![f64::NAN; n];
    if n == 0 {
        return tr;
    }

    tr[0] = high[0] - low[0];
    for i in 1..n {
        let pc = close[i - 1];
        tr[i] = (high[i] - low[i])
            .max((high[i] - pc).abs())
            .max((low[i] - pc).abs());
    }
    tr
}

/// Average true range (rolling mean of TR)
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    sma(&true_range(high, low, close), period)
}

/// Wilder smoothing (alpha = 1/period), seeded with the mean of the first
/// `period` valid values
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 {
        return out;
    }
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return out;
    };
    if n < start + period {
        return out;
    }
    let seed = &values[start..start + period];
    if seed.iter().any(|v| v.is_nan()) {
        return out;
    }

    let mut prev = seed.iter().sum::<f64>() / period as f64;
    out[start + period - 1] = prev;
    for i in start + period..n {
        if values[i].is_nan() {
            break;
        }
        prev += (values[i] - prev) / period as f64;
        out[i] = prev;
    }
    out
}

/// Average Directional Index
///
/// Needs roughly `2 * period` bars before the first value appears.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    let out = vec![f64::NAN; n];
    if n < 2 || period == 0 {
        return out;
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    let mut tr = true_range(high, low, close);
    tr[0] = f64::NAN;

    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if smooth_tr[i].is_nan() || smooth_tr[i] == 0.0 {
            continue;
        }
        let plus_di = 100.0 * smooth_plus[i] / smooth_tr[i];
        let minus_di = 100.0 * smooth_minus[i] / smooth_tr[i];
        let sum = plus_di + minus_di;
        dx[i] = if sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / sum
        };
    }

    wilder_smooth(&dx, period)
}
