//! TWSE Scanner Library
//!
//! Screens Taiwan-listed tickers for a bullish momentum pattern on daily bars
//! and forwards the hits to an LLM analyzer and a notification channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        twse-scanner (one cycle)                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Data Provider  │─▶│ Indicator Engine│─▶│  Candidate Gate │      │
//! │  │  (Yahoo chart)  │  │ MA / MACD / KDJ │  │  4 conditions   │      │
//! │  └─────────────────┘  └─────────────────┘  └────────┬────────┘      │
//! │                                                     │               │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌────────▼────────┐      │
//! │  │    Notifier     │◀─│    Analyzer     │◀─│ Pipeline Driver │      │
//! │  │ (Telegram / log)│  │    (Gemini)     │  │   (max 30)      │      │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Gate
//!
//! A ticker is a strong candidate when, on its latest bar:
//! - MA5 > MA10 > MA20
//! - DIF > DEA
//! - K > D
//! - close sits less than 5% above MA20

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod data;
pub mod indicator;
pub mod notification;
pub mod pipeline;
pub mod screener;

use std::sync::Arc;

use tracing::info;
use twse_common::Config;

use crate::analysis::{Analyzer, GeminiAnalyzer};
use crate::data::{DataProvider, YahooAdapter};
use crate::notification::{DashboardNotifier, Notifier};
use crate::pipeline::{PipelineDriver, PipelineOutcome};
use crate::screener::{resolve_pool, ScreenerEngine};

/// One scan → analyze → notify cycle over a resolved pool.
pub struct ScanService<P: DataProvider, A, N> {
    pool: Vec<String>,
    engine: ScreenerEngine<P>,
    driver: PipelineDriver<A, N>,
}

impl ScanService<YahooAdapter, GeminiAnalyzer, DashboardNotifier> {
    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(YahooAdapter::from_config(config)),
            GeminiAnalyzer::from_config(config),
            DashboardNotifier::from_config(config),
        )
    }
}

impl<P, A, N> ScanService<P, A, N>
where
    P: DataProvider,
    A: Analyzer,
    N: Notifier<A::Report>,
{
    pub fn new(config: &Config, provider: Arc<P>, analyzer: A, notifier: N) -> Self {
        Self {
            pool: resolve_pool(&config.scanner),
            engine: ScreenerEngine::new(&config.scanner, provider),
            driver: PipelineDriver::new(analyzer, notifier, config.scanner.max_analyzed),
        }
    }

    /// Tickers this service scans, in order.
    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    /// Run one full cycle. Per-ticker and downstream failures are logged,
    /// never returned.
    pub async fn run_once(&self) -> PipelineOutcome {
        let scan = self.engine.run_scan(&self.pool).await;
        let outcome = self.driver.drive(scan.total_scanned, &scan.candidates).await;

        info!(
            scan_id = %scan.scan_id,
            scanned = outcome.scanned,
            candidates = outcome.candidates,
            analyzed = outcome.analyzed,
            reports = outcome.reports,
            notified = outcome.notified,
            "Cycle complete"
        );
        outcome
    }
}
