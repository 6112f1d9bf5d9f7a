//! Market data module.
//!
//! Daily bar types, the provider abstraction, and the Yahoo chart adapter used
//! to pull one year of history per ticker.

mod provider;
mod yahoo;

pub use provider::{DataProvider, ProviderError};
pub use yahoo::YahooAdapter;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Core Data Types
// ============================================================================

/// One trading day's observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume (shares)
    pub volume: f64,
}

impl DailyBar {
    fn check(&self) -> Result<(), SeriesError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(SeriesError::NonFinite { date: self.date, field });
            }
        }
        for (field, value) in [("high", self.high), ("low", self.low), ("close", self.close)] {
            if value < 0.0 {
                return Err(SeriesError::NegativePrice { date: self.date, field });
            }
        }
        if self.high < self.low {
            return Err(SeriesError::InvertedRange { date: self.date });
        }
        Ok(())
    }
}

/// Reasons a fetched series is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar dated {current} does not follow {previous}")]
    NonIncreasingDate { previous: NaiveDate, current: NaiveDate },

    #[error("non-finite {field} on {date}")]
    NonFinite { date: NaiveDate, field: &'static str },

    #[error("negative {field} on {date}")]
    NegativePrice { date: NaiveDate, field: &'static str },

    #[error("high below low on {date}")]
    InvertedRange { date: NaiveDate },
}

/// Validated daily history for one ticker, strictly increasing by date.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<DailyBar>,
}

impl PriceSeries {
    /// Validate `bars` and wrap them. Gaps between dates are allowed.
    pub fn new(symbol: impl Into<String>, bars: Vec<DailyBar>) -> Result<Self, SeriesError> {
        for bar in &bars {
            bar.check()?;
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::NonIncreasingDate {
                    previous: pair[0].date,
                    current: pair[1].date,
                });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn test_series_accepts_gaps() {
        let series = PriceSeries::new("2330.TW", vec![bar(3, 10.0), bar(4, 11.0), bar(7, 12.0)])
            .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.symbol(), "2330.TW");
        let closes: Vec<f64> = series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_series_rejects_duplicate_date() {
        let err = PriceSeries::new("X", vec![bar(3, 10.0), bar(3, 11.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::NonIncreasingDate { .. }));
    }

    #[test]
    fn test_series_rejects_out_of_order() {
        let err = PriceSeries::new("X", vec![bar(5, 10.0), bar(4, 11.0)]).unwrap_err();
        assert!(err.to_string().contains("does not follow"));
    }

    #[test]
    fn test_series_rejects_nan_close() {
        let mut b = bar(3, 10.0);
        b.close = f64::NAN;
        let err = PriceSeries::new("X", vec![b]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::NonFinite {
                date: b.date,
                field: "close"
            }
        );
    }

    #[test]
    fn test_series_rejects_negative_low_and_inverted_range() {
        let mut negative = bar(3, 0.5);
        negative.low = -0.5;
        assert!(matches!(
            PriceSeries::new("X", vec![negative]),
            Err(SeriesError::NegativePrice { field: "low", .. })
        ));

        let mut inverted = bar(3, 10.0);
        inverted.high = 8.0;
        assert!(matches!(
            PriceSeries::new("X", vec![inverted]),
            Err(SeriesError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_empty_series_is_valid() {
        let series = PriceSeries::new("X", vec![]).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.len(), 0);
    }
}
