//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//!
//! Default parameters: fast=12, slow=26, signal=9. Every EMA is seeded from
//! its first input, so there is no warm-up gap.

use crate::domain::indicator::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdLine {
    pub line: f64,
    pub signal: f64,
}

impl MacdLine {
    pub fn histogram(&self) -> f64 {
        self.line - self.signal
    }
}

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_span: usize,
) -> Vec<MacdLine> {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal = calculate_ema(&line, signal_span);

    line.into_iter()
        .zip(signal)
        .map(|(line, signal)| MacdLine { line, signal })
        .collect()
}

pub fn calculate_macd_default(closes: &[f64]) -> Vec<MacdLine> {
    calculate_macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
