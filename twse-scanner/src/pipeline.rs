//! Pipeline driver: bound the candidate list, analyze, notify.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::analysis::{AnalysisContext, Analyzer};
use crate::notification::Notifier;
use crate::screener::Candidate;

/// Counts from one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Tickers in the pool
    pub scanned: usize,
    /// Candidates found by the scan
    pub candidates: usize,
    /// Candidates handed to the analyzer (at most `max_analyzed`)
    pub analyzed: usize,
    /// Reports produced
    pub reports: usize,
    /// Whether the notifier accepted the batch
    pub notified: bool,
}

/// Forwards candidates to an analyzer and the resulting reports to a notifier.
pub struct PipelineDriver<A, N> {
    analyzer: A,
    notifier: N,
    max_analyzed: usize,
}

impl<A, N> PipelineDriver<A, N>
where
    A: Analyzer,
    N: Notifier<A::Report>,
{
    pub fn new(analyzer: A, notifier: N, max_analyzed: usize) -> Self {
        Self {
            analyzer,
            notifier,
            max_analyzed,
        }
    }

    /// Analyze at most `max_analyzed` candidates, in order, and notify once
    /// if any report came back.
    ///
    /// Analyzer errors drop the candidate; notifier errors are logged. Neither
    /// fails the run.
    pub async fn drive(&self, scanned: usize, candidates: &[Candidate]) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            scanned,
            candidates: candidates.len(),
            ..Default::default()
        };

        if candidates.is_empty() {
            info!("No strong candidates today");
            return outcome;
        }

        let bounded = &candidates[..candidates.len().min(self.max_analyzed)];
        if bounded.len() < candidates.len() {
            info!(
                candidates = candidates.len(),
                analyzed = bounded.len(),
                "Candidate list truncated"
            );
        }

        let mut reports = Vec::with_capacity(bounded.len());
        for candidate in bounded {
            let context = AnalysisContext::from(candidate);
            match self.analyzer.analyze(&context).await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => {
                    error!(symbol = %candidate.symbol, error = %e, "Analysis failed");
                }
            }
        }

        outcome.analyzed = bounded.len();
        outcome.reports = reports.len();

        if reports.is_empty() {
            info!(analyzed = outcome.analyzed, "No analysis reports produced");
            return outcome;
        }

        match self.notifier.notify(&reports).await {
            Ok(()) => outcome.notified = true,
            Err(e) => warn!(error = %e, reports = reports.len(), "Failed to send report"),
        }

        outcome
    }
}
