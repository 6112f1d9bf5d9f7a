//! Screener engine module.
//!
//! Walks the ticker pool one symbol at a time: fetch history, compute
//! indicators, apply the gate. Per-symbol failures are recorded and the scan
//! moves on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use twse_common::ScannerConfig;

use crate::data::{DailyBar, DataProvider, PriceSeries, ProviderError, SeriesError};
use crate::indicator::{IndicatorEngine, IndicatorFrame};

use super::gate::{CandidateGate, GateChecks};

// ============================================================================
// Candidate
// ============================================================================

/// A bar paired with its indicator values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingEntry {
    pub bar: DailyBar,
    pub frame: IndicatorFrame,
}

/// A ticker that passed the gate on its latest bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Normalized ticker (e.g., "2330.TW")
    pub symbol: String,
    /// Most recent entries, oldest first; the last one passed the gate
    pub trailing_window: Vec<TrailingEntry>,
}

impl Candidate {
    /// The entry that passed the gate.
    pub fn latest(&self) -> Option<&TrailingEntry> {
        self.trailing_window.last()
    }
}

// ============================================================================
// Per-symbol Outcome
// ============================================================================

/// Why a ticker was not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The provider returned no bars
    NoData,
    /// Fewer bars than the configured minimum
    InsufficientHistory { bars: usize, required: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => write!(f, "no data"),
            Self::InsufficientHistory { bars, required } => {
                write!(f, "{} bars, need {}", bars, required)
            }
        }
    }
}

/// Errors that stop a single ticker's evaluation.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("fetch failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed series: {0}")]
    Malformed(#[from] SeriesError),
}

/// Result of evaluating one ticker.
#[derive(Debug)]
pub enum SymbolOutcome {
    Candidate(Candidate),
    /// Evaluated and failed the gate; `None` when the latest frame was not
    /// fully defined
    Rejected(Option<GateChecks>),
    Skipped(SkipReason),
    Failed(ScanError),
}

/// A ticker whose evaluation errored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

// ============================================================================
// Scan Result
// ============================================================================

/// Result of one pass over the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Scan ID (timestamp-based)
    pub scan_id: String,
    /// Candidates in pool order
    pub candidates: Vec<Candidate>,
    /// Tickers skipped for missing or short history
    pub skipped: Vec<(String, SkipReason)>,
    /// Tickers evaluated that failed the gate
    pub rejected: usize,
    /// Tickers whose fetch or validation errored
    pub failures: Vec<SymbolFailure>,
    /// Pool size
    pub total_scanned: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl ScanResult {
    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} tickers in {:.1}s: {} candidates, {} rejected, {} skipped, {} failed",
            self.total_scanned,
            self.duration_secs,
            self.candidates.len(),
            self.rejected,
            self.skipped.len(),
            self.failures.len()
        )
    }
}

// ============================================================================
// Screener Engine
// ============================================================================

/// Sequential scanner over a ticker pool.
pub struct ScreenerEngine<P: DataProvider> {
    provider: Arc<P>,
    indicators: IndicatorEngine,
    gate: CandidateGate,
    lookback_days: u32,
    min_bars: usize,
    trailing_window: usize,
}

impl<P: DataProvider> ScreenerEngine<P> {
    /// Create a new screener engine.
    pub fn new(config: &ScannerConfig, provider: Arc<P>) -> Self {
        Self {
            provider,
            indicators: IndicatorEngine::new(),
            gate: CandidateGate::from_config(config),
            lookback_days: config.lookback_days,
            min_bars: config.min_bars,
            trailing_window: config.trailing_window.max(1),
        }
    }

    /// Scan every ticker in `pool`, in order.
    ///
    /// Never fails as a whole; per-ticker errors land in
    /// [`ScanResult::failures`].
    pub async fn run_scan(&self, pool: &[String]) -> ScanResult {
        let started_at = Utc::now();
        let id = format!("scan_{}", started_at.format("%Y%m%d_%H%M%S"));

        info!(
            scan_id = %id,
            pool = pool.len(),
            provider = self.provider.name(),
            "Starting scan"
        );

        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        let mut failures = Vec::new();
        let mut rejected = 0;

        for symbol in pool {
            match self.scan_symbol(symbol).await {
                SymbolOutcome::Candidate(candidate) => {
                    if let Some(latest) = candidate.latest() {
                        info!(
                            symbol = %symbol,
                            close = latest.bar.close,
                            date = %latest.bar.date,
                            "Strong candidate found"
                        );
                    }
                    candidates.push(candidate);
                }
                SymbolOutcome::Rejected(checks) => {
                    debug!(symbol = %symbol, checks = ?checks, "Gate not passed");
                    rejected += 1;
                }
                SymbolOutcome::Skipped(reason) => {
                    debug!(symbol = %symbol, reason = %reason, "Skipped");
                    skipped.push((symbol.clone(), reason));
                }
                SymbolOutcome::Failed(e) => {
                    error!(symbol = %symbol, error = %e, "Scan failed for ticker");
                    failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let completed_at = Utc::now();
        let duration_secs = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let result = ScanResult {
            scan_id: id,
            candidates,
            skipped,
            rejected,
            failures,
            total_scanned: pool.len(),
            started_at,
            completed_at,
            duration_secs,
        };

        info!(scan_id = %result.scan_id, "{}", result.summary());
        result
    }

    /// Fetch and evaluate a single ticker.
    pub async fn scan_symbol(&self, symbol: &str) -> SymbolOutcome {
        let bars = match self.provider.get_daily_bars(symbol, self.lookback_days).await {
            Ok(bars) => bars,
            Err(e) => return SymbolOutcome::Failed(e.into()),
        };

        // Short histories are skipped before any bar is validated
        if let Some(reason) = self.history_shortfall(bars.len()) {
            return SymbolOutcome::Skipped(reason);
        }

        match PriceSeries::new(symbol, bars) {
            Ok(series) => self.evaluate_series(&series),
            Err(e) => SymbolOutcome::Failed(e.into()),
        }
    }

    /// Evaluate an already-fetched series.
    pub fn evaluate_series(&self, series: &PriceSeries) -> SymbolOutcome {
        if let Some(reason) = self.history_shortfall(series.len()) {
            return SymbolOutcome::Skipped(reason);
        }

        let frames = self.indicators.compute(series.bars());
        let entries: Vec<TrailingEntry> = series
            .bars()
            .iter()
            .zip(frames)
            .map(|(bar, frame)| TrailingEntry { bar: *bar, frame })
            .collect();

        let n = entries.len();
        let (latest, previous) = (&entries[n - 1], &entries[n - 2]);

        match self.gate.check(latest, previous) {
            Some(checks) if checks.passed() => {
                let start = n.saturating_sub(self.trailing_window);
                SymbolOutcome::Candidate(Candidate {
                    symbol: series.symbol().to_string(),
                    trailing_window: entries[start..].to_vec(),
                })
            }
            checks => SymbolOutcome::Rejected(checks),
        }
    }

    fn history_shortfall(&self, bars: usize) -> Option<SkipReason> {
        if bars == 0 {
            return Some(SkipReason::NoData);
        }
        // Two bars are the floor for the previous-entry lookup
        let required = self.min_bars.max(2);
        (bars < required).then_some(SkipReason::InsufficientHistory { bars, required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use std::collections::HashMap;

    /// Uptrend with a mild oscillation; at 80 bars the last bar passes every
    /// gate condition with bias20 near 3.8%.
    fn uptrend(n: usize) -> Vec<DailyBar> {
        series_from(n, |i| 100.0 + 0.25 * i + 2.0 * (i / 4.0).sin())
    }

    /// Mirror-image downtrend; MA alignment fails.
    fn downtrend(n: usize) -> Vec<DailyBar> {
        series_from(n, |i| 120.0 - 0.25 * i + 2.0 * (i / 4.0).sin())
    }

    fn series_from(n: usize, close_at: impl Fn(f64) -> f64) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let close = close_at(i as f64);
                DailyBar {
                    date: start + Duration::days(i as i64),
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume: 10_000.0,
                }
            })
            .collect()
    }

    struct FixtureProvider {
        bars: HashMap<String, Vec<DailyBar>>,
    }

    #[async_trait]
    impl DataProvider for FixtureProvider {
        fn name(&self) -> &'static str {
            "fixture"
        }

        async fn get_daily_bars(
            &self,
            symbol: &str,
            _lookback_days: u32,
        ) -> Result<Vec<DailyBar>, ProviderError> {
            match symbol {
                "DOWN.TW" => Err(ProviderError::Network("connection reset".into())),
                _ => Ok(self.bars.get(symbol).cloned().unwrap_or_default()),
            }
        }
    }

    fn engine(bars: Vec<(&str, Vec<DailyBar>)>) -> ScreenerEngine<FixtureProvider> {
        let provider = FixtureProvider {
            bars: bars.into_iter().map(|(s, b)| (s.to_string(), b)).collect(),
        };
        ScreenerEngine::new(&ScannerConfig::default(), Arc::new(provider))
    }

    fn pool(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_uptrend_is_candidate() {
        let engine = engine(vec![("A.TW", uptrend(80))]);
        match engine.scan_symbol("A.TW").await {
            SymbolOutcome::Candidate(c) => {
                assert_eq!(c.symbol, "A.TW");
                assert_eq!(c.trailing_window.len(), 10);
                let latest = c.latest().unwrap();
                assert_eq!(latest.bar.date, NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
                assert!(latest.frame.ma20.is_some());
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_downtrend_is_rejected() {
        let engine = engine(vec![("B.TW", downtrend(80))]);
        match engine.scan_symbol("B.TW").await {
            SymbolOutcome::Rejected(Some(checks)) => assert!(!checks.ma_aligned),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_history_is_skipped() {
        let engine = engine(vec![("C.TW", uptrend(30))]);
        assert!(matches!(
            engine.scan_symbol("C.TW").await,
            SymbolOutcome::Skipped(SkipReason::InsufficientHistory { bars: 30, required: 60 })
        ));
    }

    #[tokio::test]
    async fn test_short_malformed_history_is_skipped_not_failed() {
        let mut bars = uptrend(30);
        bars[5].close = f64::NAN;
        let engine = engine(vec![("N.TW", bars)]);
        assert!(matches!(
            engine.scan_symbol("N.TW").await,
            SymbolOutcome::Skipped(SkipReason::InsufficientHistory { bars: 30, required: 60 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_no_data() {
        let engine = engine(vec![]);
        assert!(matches!(
            engine.scan_symbol("ZZZZ.TW").await,
            SymbolOutcome::Skipped(SkipReason::NoData)
        ));
    }

    #[tokio::test]
    async fn test_malformed_series_fails() {
        let mut bars = uptrend(80);
        bars.swap(10, 11);
        let engine = engine(vec![("M.TW", bars)]);
        assert!(matches!(
            engine.scan_symbol("M.TW").await,
            SymbolOutcome::Failed(ScanError::Malformed(SeriesError::NonIncreasingDate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_run_scan_isolates_failures() {
        let engine = engine(vec![
            ("A.TW", uptrend(80)),
            ("B.TW", downtrend(80)),
            ("C.TW", uptrend(30)),
        ]);
        let result = engine
            .run_scan(&pool(&["A.TW", "DOWN.TW", "B.TW", "C.TW", "A.TW"]))
            .await;

        assert_eq!(result.total_scanned, 5);
        let symbols: Vec<&str> = result.candidates.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A.TW", "A.TW"]);
        assert_eq!(result.rejected, 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].symbol, "DOWN.TW");
        assert!(result.failures[0].reason.contains("connection reset"));
        assert!(result.scan_id.starts_with("scan_"));
        assert!(result.summary().contains("2 candidates"));
    }

    #[test]
    fn test_trailing_window_shorter_series() {
        let config = ScannerConfig {
            min_bars: 2,
            trailing_window: 200,
            ..Default::default()
        };
        let engine = ScreenerEngine::new(
            &config,
            Arc::new(FixtureProvider {
                bars: HashMap::new(),
            }),
        );
        let series = PriceSeries::new("A.TW", uptrend(80)).unwrap();
        match engine.evaluate_series(&series) {
            SymbolOutcome::Candidate(c) => assert_eq!(c.trailing_window.len(), 80),
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_frame_is_rejected_without_checks() {
        let config = ScannerConfig {
            min_bars: 2,
            ..Default::default()
        };
        let engine = ScreenerEngine::new(
            &config,
            Arc::new(FixtureProvider {
                bars: HashMap::new(),
            }),
        );
        let series = PriceSeries::new("A.TW", uptrend(20)).unwrap();
        assert!(matches!(engine.evaluate_series(&series), SymbolOutcome::Rejected(None)));
    }
}
