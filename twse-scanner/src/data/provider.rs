//! Data provider abstraction.
//!
//! Defines the `DataProvider` trait the scanner pulls daily history through.

use async_trait::async_trait;
use thiserror::Error;

use super::DailyBar;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("Rate limited{}", retry_suffix(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Data not available for the requested symbol
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Upstream answered with something we could not decode
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Internal provider error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(", retry after {} seconds", secs))
        .unwrap_or_default()
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("Request timeout".into())
        } else if err.is_connect() {
            Self::Network("Connection failed".into())
        } else if err.is_decode() {
            Self::InvalidResponse(format!("Failed to parse chart: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

// ============================================================================
// Data Provider Trait
// ============================================================================

/// Trait for daily market data providers.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch daily bars for a symbol, oldest first.
    ///
    /// # Arguments
    /// * `symbol` - Exchange-suffixed ticker (e.g., "2330.TW")
    /// * `lookback_days` - Calendar days of history to request
    ///
    /// Unknown or delisted symbols yield an empty vector, not an error.
    async fn get_daily_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<DailyBar>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
