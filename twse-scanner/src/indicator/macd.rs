//! MACD (Moving Average Convergence Divergence).

use super::ma::ema;

/// MACD periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// MACD lines, index-aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    /// Fast EMA minus slow EMA
    pub dif: Vec<Option<f64>>,
    /// EMA of DIF
    pub dea: Vec<Option<f64>>,
    /// DIF minus DEA
    pub histogram: Vec<Option<f64>>,
}

/// Compute DIF, DEA and histogram from closing prices.
pub fn macd(closes: &[f64], config: &MacdConfig) -> MacdSeries {
    let input: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();
    let fast = ema(&input, config.fast);
    let slow = ema(&input, config.slow);

    let dif: Vec<Option<f64>> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let dea = ema(&dif, config.signal);

    let histogram = dif
        .iter()
        .zip(dea.iter())
        .map(|(d, s)| Some((*d)? - (*s)?))
        .collect();

    MacdSeries { dif, dea, histogram }
}
