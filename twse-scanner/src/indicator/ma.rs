//! Simple and exponential moving averages.

/// Simple moving average over the trailing `period` values, current one included.
///
/// Entry `i` is `None` until `period` values are available (`i < period - 1`).
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                let window = &values[i + 1 - period..=i];
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}

/// Exponential moving average with smoothing factor `2 / (period + 1)`.
///
/// Leading `None` inputs are skipped. The first output is the simple mean of
/// the first `period` defined inputs, placed on the last of them; every later
/// output is `prev + alpha * (x - prev)`. A `None` after the seed yields `None`
/// and leaves the running value untouched.
pub fn ema(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut current: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(x) = *value else {
            continue;
        };

        match current {
            Some(prev) => {
                let next = prev + alpha * (x - prev);
                current = Some(next);
                out[i] = Some(next);
            }
            None => {
                seed_sum += x;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    current = Some(seed);
                    out[i] = Some(seed);
                }
            }
        }
    }

    out
}
