//! KDJ stochastic oscillator.
//!
//! RSV compares the close to the high-low range of the last `period` bars; K
//! and D are recursive smoothings of RSV and K with weight `1 / smoothing`,
//! both started from a prior value of 50. J = 3K - 2D.

/// Value used for K and D before the first RSV, and for RSV on a flat range.
pub const NEUTRAL: f64 = 50.0;

/// KDJ periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdjConfig {
    pub period: usize,
    pub smoothing: usize,
}

impl Default for KdjConfig {
    fn default() -> Self {
        Self {
            period: 9,
            smoothing: 3,
        }
    }
}

/// K, D and J lines, index-aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub struct KdjSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
    pub j: Vec<Option<f64>>,
}

/// Raw stochastic value over a trailing window of `period` bars.
pub fn rsv(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len().min(highs.len()).min(lows.len());
    if period == 0 {
        return vec![None; n];
    }

    (0..n)
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let start = i + 1 - period;
            let highest = highs[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let lowest = lows[start..=i].iter().copied().fold(f64::INFINITY, f64::min);

            let range = highest - lowest;
            if range.abs() < f64::EPSILON {
                Some(NEUTRAL)
            } else {
                Some(100.0 * (closes[i] - lowest) / range)
            }
        })
        .collect()
}

/// Smooth an RSV line into K and D.
///
/// `K = (s-1)/s * K_prev + 1/s * RSV` and `D = (s-1)/s * D_prev + 1/s * K`,
/// with both previous values starting at [`NEUTRAL`]. Undefined RSV entries
/// produce undefined K and D.
pub fn smooth_kd(rsv: &[Option<f64>], smoothing: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let s = smoothing.max(1) as f64;
    let keep = (s - 1.0) / s;
    let take = 1.0 / s;

    let mut k_prev = NEUTRAL;
    let mut d_prev = NEUTRAL;
    let mut k_line = Vec::with_capacity(rsv.len());
    let mut d_line = Vec::with_capacity(rsv.len());

    for value in rsv {
        match value {
            Some(r) => {
                let k = keep * k_prev + take * r;
                let d = keep * d_prev + take * k;
                k_prev = k;
                d_prev = d;
                k_line.push(Some(k));
                d_line.push(Some(d));
            }
            None => {
                k_line.push(None);
                d_line.push(None);
            }
        }
    }

    (k_line, d_line)
}

/// Compute K, D and J from bar highs, lows and closes.
pub fn kdj(highs: &[f64], lows: &[f64], closes: &[f64], config: &KdjConfig) -> KdjSeries {
    let raw = rsv(highs, lows, closes, config.period);
    let (k, d) = smooth_kd(&raw, config.smoothing);
    let j = k
        .iter()
        .zip(d.iter())
        .map(|(k, d)| Some(3.0 * (*k)? - 2.0 * (*d)?))
        .collect();

    KdjSeries { k, d, j }
}
