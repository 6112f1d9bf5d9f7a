//! Configuration validation.
//!
//! Catches settings that would make the screen meaningless (a gate that needs
//! two bars fed with fewer, a zero-sized trailing window) before any network
//! traffic happens.

use thiserror::Error;

use crate::config::{
    AnalyzerConfig, Config, NotificationConfig, ObservabilityConfig, ScannerConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.observability.validate(),
            self.scanner.validate(),
            self.analyzer.validate(),
            self.notification.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ScannerConfig {
    fn validate(&self) -> ValidationResult<()> {
        // The gate reads the latest and the previous entry.
        if self.min_bars < 2 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.min_bars".into(),
                reason: "must be at least 2".into(),
            });
        }

        if self.trailing_window == 0 || self.trailing_window > self.min_bars {
            return Err(ValidationError::InvalidValue {
                field: "scanner.trailing_window".into(),
                reason: format!("must be between 1 and scanner.min_bars ({})", self.min_bars),
            });
        }

        if !self.bias_limit.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: "scanner.bias_limit".into(),
                reason: "must be a finite number".into(),
            });
        }

        if self.lookback_days == 0 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.lookback_days".into(),
                reason: "must be positive".into(),
            });
        }

        if self.data_endpoint.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "scanner.data_endpoint".into(),
            });
        }

        Ok(())
    }
}

impl Validate for AnalyzerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "analyzer.model".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "analyzer.timeout_secs".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

impl Validate for NotificationConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.retry_count == 0 {
            return Err(ValidationError::InvalidValue {
                field: "notification.retry_count".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
