//! Candidate gate.
//!
//! Four conditions on the latest (bar, indicator) entry, all required:
//!
//! 1. MA alignment: MA5 > MA10 > MA20
//! 2. MACD: DIF > DEA (optionally a fresh cross, see [`MacdRule`])
//! 3. KDJ: K > D
//! 4. Not overheated: (close - MA20) / MA20 < bias limit (5% by default)
//!
//! A frame with any required field undefined never reaches the comparisons:
//! [`GateInputs::from_entry`] returns `None` and the gate fails closed.

use serde::{Deserialize, Serialize};
use twse_common::{MacdRule, ScannerConfig};

use super::engine::TrailingEntry;

/// Fully-defined values the gate compares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInputs {
    pub close: f64,
    pub ma5: f64,
    pub ma10: f64,
    pub ma20: f64,
    pub dif: f64,
    pub dea: f64,
    pub k: f64,
    pub d: f64,
}

impl GateInputs {
    /// Extract gate inputs, or `None` if any required indicator is undefined.
    pub fn from_entry(entry: &TrailingEntry) -> Option<Self> {
        let f = &entry.frame;
        Some(Self {
            close: entry.bar.close,
            ma5: f.ma5?,
            ma10: f.ma10?,
            ma20: f.ma20?,
            dif: f.dif?,
            dea: f.dea?,
            k: f.k?,
            d: f.d?,
        })
    }

    /// Deviation of the close from MA20, as a fraction.
    pub fn bias20(&self) -> f64 {
        (self.close - self.ma20) / self.ma20
    }
}

/// Outcome of each gate condition for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateChecks {
    pub ma_aligned: bool,
    pub macd_bullish: bool,
    pub kdj_up: bool,
    pub not_overheated: bool,
    pub bias20: f64,
}

impl GateChecks {
    /// All four conditions hold.
    pub fn passed(&self) -> bool {
        self.ma_aligned && self.macd_bullish && self.kdj_up && self.not_overheated
    }
}

/// Bullish-momentum gate.
#[derive(Debug, Clone, Copy)]
pub struct CandidateGate {
    bias_limit: f64,
    macd_rule: MacdRule,
}

impl Default for CandidateGate {
    fn default() -> Self {
        Self {
            bias_limit: 0.05,
            macd_rule: MacdRule::Above,
        }
    }
}

impl CandidateGate {
    pub fn new(bias_limit: f64, macd_rule: MacdRule) -> Self {
        Self {
            bias_limit,
            macd_rule,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.bias_limit, config.macd_rule)
    }

    /// Evaluate each condition on `latest`; `previous` is only read by
    /// [`MacdRule::Crossover`].
    ///
    /// Returns `None` when the latest frame lacks a required value.
    pub fn check(&self, latest: &TrailingEntry, previous: &TrailingEntry) -> Option<GateChecks> {
        let now = GateInputs::from_entry(latest)?;

        let macd_bullish = match self.macd_rule {
            MacdRule::Above => now.dif > now.dea,
            MacdRule::Crossover => {
                let crossed_from_below = match (previous.frame.dif, previous.frame.dea) {
                    (Some(dif), Some(dea)) => dif <= dea,
                    _ => false,
                };
                crossed_from_below && now.dif > now.dea
            }
        };

        let bias20 = now.bias20();

        Some(GateChecks {
            ma_aligned: now.ma5 > now.ma10 && now.ma10 > now.ma20,
            macd_bullish,
            kdj_up: now.k > now.d,
            not_overheated: bias20 < self.bias_limit,
            bias20,
        })
    }
}
