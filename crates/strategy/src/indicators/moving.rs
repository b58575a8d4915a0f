/// Simple moving average
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = sum / period as f64;
    for i in period..n {
        sum += values[i] - values[i - period];
        out[i] = sum / period as f64;
    }
    out
}

/// Exponential moving average, alpha = 2 / (period + 1), seeded with the first value
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n == 0 {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    out[0] = values[0];
    for i in 1..n {
        out[i] = alpha * values[i] + (1.0 - alpha) * out[i - 1];
    }
    out
}

/// Rolling sample standard deviation (n - 1 denominator)
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period < 2 || n < period {
        return out;
    }

    for i in (period - 1)..n {
        out[i] = super::sample_std(&values[i + 1 - period..=i]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(&out[2..], &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let out = ema(&[10.0, 10.0, 10.0], 5);
        assert_eq!(out, vec![10.0, 10.0, 10.0]);

        let out = ema(&[0.0, 3.0], 2);
        // alpha = 2/3
        assert!((out[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_std_constant_is_zero() {
        let out = rolling_std(&[5.0; 6], 4);
        assert!(out[2].is_nan());
        assert_eq!(out[5], 0.0);
    }
}
