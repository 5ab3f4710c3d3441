//! Exponential Moving Average.
//!
//! k = 2/(span+1), seeded with the first finite close, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). No bias adjustment and no warm-up gap.
//!
//! NaN inputs are skipped: the row repeats the previous EMA and the old value
//! keeps decaying by (1-k) per skipped row, so the next finite close gets
//! weight k / ((1-k)^(gap+1) + k). Rows before the first finite value are NaN.

pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    let k = 2.0 / (span as f64 + 1.0);
    let mut ema: Option<f64> = None;
    let mut old_weight = 1.0;
    let mut out = Vec::with_capacity(values.len());

    for &v in values {
        ema = match ema {
            None if v.is_nan() => None,
            None => Some(v),
            Some(prev) => {
                old_weight *= 1.0 - k;
                if v.is_nan() {
                    Some(prev)
                } else {
                    let next = (old_weight * prev + k * v) / (old_weight + k);
                    old_weight = 1.0;
                    Some(next)
                }
            }
        };
        out.push(ema.unwrap_or(f64::NAN));
    }
    out
}
