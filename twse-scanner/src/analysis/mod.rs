//! Candidate analysis.
//!
//! The pipeline hands each candidate to an [`Analyzer`] as a typed
//! [`AnalysisContext`]. The shipped implementation is [`GeminiAnalyzer`].

mod gemini;

pub use gemini::{AnalysisReport, GeminiAnalyzer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::screener::{Candidate, TrailingEntry};

/// What an analyzer sees for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub symbol: String,
    /// Most recent bars with indicators, oldest first
    pub trailing_window: Vec<TrailingEntry>,
}

impl From<&Candidate> for AnalysisContext {
    fn from(candidate: &Candidate) -> Self {
        Self {
            symbol: candidate.symbol.clone(),
            trailing_window: candidate.trailing_window.clone(),
        }
    }
}

/// Produces a report for a candidate.
///
/// `Ok(None)` means the analyzer declined (no credentials, unusable output);
/// the pipeline drops the candidate without treating it as a failure.
#[async_trait]
pub trait Analyzer: Send + Sync {
    type Report: Send + Sync;

    async fn analyze(&self, context: &AnalysisContext) -> anyhow::Result<Option<Self::Report>>;
}
