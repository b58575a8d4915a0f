//! Return correlation and greedy clustering

use std::collections::BTreeMap;

use meridian_core::{Bar, Price, Symbol};
use rust_decimal::prelude::ToPrimitive;

/// Pearson correlation; None with fewer than two points or zero variance
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Close histories per symbol, for correlation and marks
#[derive(Debug, Clone, Default)]
pub struct ReturnHistory {
    closes: BTreeMap<Symbol, Vec<f64>>,
    marks: BTreeMap<Symbol, Price>,
}

impl ReturnHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bar history; the last close becomes the symbol's mark
    pub fn insert_bars(&mut self, symbol: impl Into<Symbol>, bars: &[Bar]) {
        let symbol = symbol.into();
        if let Some(last) = bars.last() {
            self.marks.insert(symbol.clone(), last.close);
        }
        let closes = bars
            .iter()
            .filter_map(|b| b.close.to_f64())
            .collect();
        self.closes.insert(symbol, closes);
    }

    pub fn insert_closes(&mut self, symbol: impl Into<Symbol>, closes: Vec<f64>) {
        self.closes.insert(symbol.into(), closes);
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.closes.contains_key(symbol)
    }

    pub fn mark(&self, symbol: &str) -> Option<Price> {
        self.marks.get(symbol).copied()
    }

    /// Simple returns for a symbol, oldest first
    pub fn returns(&self, symbol: &str) -> Vec<f64> {
        self.closes
            .get(symbol)
            .map(|c| {
                c.windows(2)
                    .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Correlation over the last `lookback` aligned returns
    ///
    /// A symbol is fully correlated with itself. Pairs without enough data
    /// read as uncorrelated.
    pub fn correlation(&self, a: &str, b: &str, lookback: usize) -> f64 {
        if a == b {
            return 1.0;
        }
        let (ra, rb) = (self.returns(a), self.returns(b));
        let n = ra.len().min(rb.len()).min(lookback);
        if n < 2 {
            return 0.0;
        }
        pearson(&ra[ra.len() - n..], &rb[rb.len() - n..]).unwrap_or(0.0)
    }
}

/// Single-pass greedy clustering over a fixed symbol order
///
/// The first unclustered symbol seeds a cluster; every later unclustered
/// symbol with correlation to the seed at or above `threshold` joins it.
pub fn cluster_symbols(
    symbols: &[Symbol],
    history: &ReturnHistory,
    threshold: f64,
    lookback: usize,
) -> Vec<Vec<Symbol>> {
    let mut assigned = vec![false; symbols.len()];
    let mut clusters = Vec::new();

    for i in 0..symbols.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut cluster = vec![symbols[i].clone()];
        for j in (i + 1)..symbols.len() {
            if !assigned[j] && history.correlation(&symbols[i], &symbols[j], lookback) >= threshold {
                assigned[j] = true;
                cluster.push(symbols[j].clone());
            }
        }
        clusters.push(cluster);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize, phase: f64, scale: f64) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + scale * ((i as f64) / 3.0 + phase).sin())
            .collect()
    }

    #[test]
    fn test_pearson_extremes() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&a, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &[4.0, 3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&a, &[5.0; 4]).is_none());
        assert!(pearson(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn test_missing_history_is_uncorrelated() {
        let mut history = ReturnHistory::new();
        history.insert_closes("A", wave(30, 0.0, 5.0));
        assert_eq!(history.correlation("A", "B", 60), 0.0);
        assert_eq!(history.correlation("B", "B", 60), 1.0);
    }

    #[test]
    fn test_greedy_clusters() {
        let mut history = ReturnHistory::new();
        history.insert_closes("AAA", wave(80, 0.0, 5.0));
        history.insert_closes("BBB", wave(80, 0.0, 7.0));
        history.insert_closes("CCC", wave(80, 3.1, 5.0));
        history.insert_closes("DDD", wave(80, 0.0, 6.0));

        let symbols: Vec<Symbol> = ["AAA", "BBB", "CCC", "DDD"].iter().map(|s| s.to_string()).collect();
        let clusters = cluster_symbols(&symbols, &history, 0.7, 60);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], vec!["AAA", "BBB", "DDD"]);
        assert_eq!(clusters[1], vec!["CCC"]);
    }
}
