//! Indicator engine.
//!
//! Derives moving averages, MACD and KDJ from a daily bar series. Output is one
//! [`IndicatorFrame`] per input bar; values whose lookback window is not yet
//! full are `None`, never zero.
//!
//! # Warm-up
//!
//! | Field | First defined index |
//! |-------|---------------------|
//! | MA5 / MA10 / MA20 | 4 / 9 / 19 |
//! | DIF | 25 |
//! | DEA, histogram | 33 |
//! | K, D, J | 8 |

pub mod kdj;
pub mod ma;
pub mod macd;

pub use kdj::{KdjConfig, KdjSeries};
pub use macd::{MacdConfig, MacdSeries};

use serde::{Deserialize, Serialize};

use crate::data::DailyBar;

/// Derived indicator values for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFrame {
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    /// MACD line (fast EMA - slow EMA)
    pub dif: Option<f64>,
    /// MACD signal line
    pub dea: Option<f64>,
    pub histogram: Option<f64>,
    pub k: Option<f64>,
    pub d: Option<f64>,
    pub j: Option<f64>,
}

/// Computes [`IndicatorFrame`]s for a bar series.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    ma_periods: [usize; 3],
    macd: MacdConfig,
    kdj: KdjConfig,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self {
            ma_periods: [5, 10, 20],
            macd: MacdConfig::default(),
            kdj: KdjConfig::default(),
        }
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute one frame per bar, index-aligned with `bars`.
    pub fn compute(&self, bars: &[DailyBar]) -> Vec<IndicatorFrame> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

        let [short, mid, long] = self.ma_periods;
        let ma5 = ma::sma(&closes, short);
        let ma10 = ma::sma(&closes, mid);
        let ma20 = ma::sma(&closes, long);
        let macd = macd::macd(&closes, &self.macd);
        let kdj = kdj::kdj(&highs, &lows, &closes, &self.kdj);

        (0..bars.len())
            .map(|i| IndicatorFrame {
                ma5: ma5[i],
                ma10: ma10[i],
                ma20: ma20[i],
                dif: macd.dif[i],
                dea: macd.dea[i],
                histogram: macd.histogram[i],
                k: kdj.k[i],
                d: kdj.d[i],
                j: kdj.j[i],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars(closes: &[f64]) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar {
                date: start + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 80.0 + (i as f64 / 3.0).cos() * 4.0 + i as f64 * 0.15).collect()
    }

    #[test]
    fn test_frames_align_with_input() {
        let input = bars(&wave(75));
        let frames = IndicatorEngine::new().compute(&input);
        assert_eq!(frames.len(), input.len());
    }

    #[test]
    fn test_single_bar() {
        let frames = IndicatorEngine::new().compute(&bars(&[10.0]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], IndicatorFrame::default());
    }

    #[test]
    fn test_ma20_defined_from_index_19() {
        let closes = wave(60);
        let frames = IndicatorEngine::new().compute(&bars(&closes));

        for (i, frame) in frames.iter().enumerate() {
            if i < 19 {
                assert!(frame.ma20.is_none(), "ma20 defined at {}", i);
            } else {
                let mean = closes[i - 19..=i].iter().sum::<f64>() / 20.0;
                assert!((frame.ma20.unwrap() - mean).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_warmup_table() {
        let frames = IndicatorEngine::new().compute(&bars(&wave(60)));

        assert!(frames[3].ma5.is_none() && frames[4].ma5.is_some());
        assert!(frames[8].ma10.is_none() && frames[9].ma10.is_some());
        assert!(frames[24].dif.is_none() && frames[25].dif.is_some());
        assert!(frames[32].dea.is_none() && frames[33].dea.is_some());
        assert!(frames[7].k.is_none() && frames[8].k.is_some());
        assert!(frames[59].j.is_some());
    }

    #[test]
    fn test_recomputation_is_identical() {
        let input = bars(&wave(120));
        let engine = IndicatorEngine::new();
        assert_eq!(engine.compute(&input), engine.compute(&input));
    }
}
