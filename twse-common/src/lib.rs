//! TWSE Common - Shared configuration, errors and logging for the scanner.
//!
//! This crate provides:
//! - Configuration types, loading and environment overrides
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - Small string utilities used in reports and logs

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    AnalyzerConfig, Config, MacdRule, NotificationConfig, ObservabilityConfig, ScannerConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
