//! RSI (Relative Strength Index).
//!
//! Average gain and loss are simple rolling means over the last n
//! close-to-close changes, not Wilder's recursive smoothing:
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: the first n rows are null (row n is the first with n changes).

use crate::domain::indicator::finite;

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return values;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    for (i, value) in values.iter_mut().enumerate().skip(period) {
        let window = &changes[i - period..i];
        if window.iter().any(|c| c.is_nan()) {
            continue;
        }
        let avg_gain = window.iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
        let avg_loss = window.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;
        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        *value = finite(rsi);
    }
    values
}
