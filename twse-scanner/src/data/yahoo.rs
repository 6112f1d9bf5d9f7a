//! Yahoo Finance chart adapter.
//!
//! Pulls daily OHLCV history from the public v8 chart endpoint, which covers
//! TWSE (`.TW`) and TPEx (`.TWO`) listings without an API key.
//!
//! # Endpoint
//! - `GET {base}/v8/finance/chart/{symbol}?range=1y&interval=1d`

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{DataProvider, ProviderError};
use super::DailyBar;

/// Seconds to wait after an HTTP 429 before the next run should retry.
const RATE_LIMIT_RETRY_SECS: u64 = 60;

/// Yahoo's browser-less requests are refused without a user agent.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; twse-scanner/0.1)";

/// Map a lookback in calendar days onto the coarsest Yahoo `range` covering it.
fn range_for_lookback(lookback_days: u32) -> &'static str {
    match lookback_days {
        0..=5 => "5d",
        6..=31 => "1mo",
        32..=92 => "3mo",
        93..=183 => "6mo",
        184..=366 => "1y",
        367..=731 => "2y",
        732..=1827 => "5y",
        _ => "10y",
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Daily history provider backed by the Yahoo Finance chart API.
pub struct YahooAdapter {
    /// Base URL (no trailing slash)
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl YahooAdapter {
    /// Create an adapter against `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Create from config
    pub fn from_config(config: &twse_common::Config) -> Self {
        Self::new(
            config.scanner.data_endpoint.clone(),
            Duration::from_secs(config.scanner.request_timeout_secs),
        )
    }

    fn chart_url(&self, symbol: &str, lookback_days: u32) -> String {
        format!(
            "{}/v8/finance/chart/{}?range={}&interval=1d&includePrePost=false",
            self.base_url,
            symbol,
            range_for_lookback(lookback_days)
        )
    }
}

#[async_trait]
impl DataProvider for YahooAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn get_daily_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let url = self.chart_url(symbol, lookback_days);
        debug!(url = %url, symbol, "Fetching daily chart");

        let response = self.client.get(&url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(symbol, "Symbol not found upstream");
            return Ok(Vec::new());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Internal(format!(
                "HTTP {}: {}",
                status,
                twse_common::util::truncate_with_ellipsis(&body, 200)
            )));
        }

        let chart: ChartResponse = response.json().await?;

        parse_chart(symbol, chart)
    }
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Convert a decoded chart payload into bars.
///
/// Rows with any null price are dropped (halted days). When the same exchange
/// date appears twice (the live bar on the current session), the later row wins.
fn parse_chart(symbol: &str, chart: ChartResponse) -> Result<Vec<DailyBar>, ProviderError> {
    if let Some(err) = chart.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(Vec::new());
        }
        return Err(ProviderError::DataNotAvailable(format!(
            "{}: {}",
            err.code,
            err.description.unwrap_or_default()
        )));
    }

    let Some(result) = chart.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let offset = result.meta.map(|m| m.gmtoffset).unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<DailyBar> = Vec::with_capacity(result.timestamp.len());
    let mut dropped = 0usize;

    for (i, ts) in result.timestamp.iter().enumerate() {
        let row = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
        );
        let (Some(open), Some(high), Some(low), Some(close)) = row else {
            dropped += 1;
            continue;
        };

        let date = DateTime::from_timestamp(ts + offset, 0)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("bad timestamp {}", ts)))?
            .date_naive();

        let bar = DailyBar {
            date,
            open,
            high,
            low,
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0.0),
        };

        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    if dropped > 0 {
        warn!(symbol, dropped, "Dropped chart rows with missing prices");
    }

    Ok(bars)
}

// ============================================================================
// Tests
// ============================================================================
