//! Bullish-momentum screener.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     ┌────────────┐
//! │  Ticker pool │────▶│ DataProvider │────▶│  Indicator   │────▶│ Candidate  │
//! │ (config/env) │     │   (Yahoo)    │     │   Engine     │     │   Gate     │
//! └──────────────┘     └──────────────┘     └──────────────┘     └─────┬──────┘
//!                                                                      │
//!                                                        ScanResult ◀──┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use twse_scanner::screener::{resolve_pool, ScreenerEngine};
//!
//! let engine = ScreenerEngine::new(&config.scanner, Arc::new(YahooAdapter::from_config(&config)?));
//! let result = engine.run_scan(&resolve_pool(&config.scanner)).await;
//! ```

pub mod config;
pub mod engine;
pub mod gate;

pub use config::{normalize_symbol, resolve_pool, DEFAULT_POOL};
pub use engine::{
    Candidate, ScanError, ScanResult, ScreenerEngine, SkipReason, SymbolFailure, SymbolOutcome,
    TrailingEntry,
};
pub use gate::{CandidateGate, GateChecks, GateInputs};
