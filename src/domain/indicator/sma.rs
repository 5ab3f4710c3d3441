//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). The first (n-1) rows are null, as is any
//! window containing a non-finite close.

use crate::domain::indicator::finite;

pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    (0..closes.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &closes[i + 1 - period..=i];
            finite(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}
