//! Configuration for the scanner.
//!
//! The scanner reads a single file at `~/.twse-scanner/config.json`. Every
//! section has defaults, so a missing file is a valid configuration.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `STOCK_LIST` → scanner.stock_list (comma separated)
//! - `TWSE_LOG_LEVEL` → observability.log_level
//! - `TWSE_LOG_FORMAT` → observability.log_format
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY` → analyzer.api_key
//! - `GEMINI_MODEL` → analyzer.model
//! - `TELEGRAM_BOT_TOKEN` → notification.telegram_bot_token
//! - `TELEGRAM_CHAT_ID` → notification.telegram_chat_id

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".twse-scanner"),
        |dirs| dirs.home_dir().join(".twse-scanner"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration object, passed explicitly to every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Ticker pool, screening thresholds and data source
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// LLM analysis of candidates
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Dashboard delivery
    #[serde(default)]
    pub notification: NotificationConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply process environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored, so `STOCK_LIST=` keeps the configured pool.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(list) = get("STOCK_LIST") {
            self.scanner.stock_list = list.split(',').map(|s| s.to_string()).collect();
        }

        if let Some(level) = get("TWSE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = get("TWSE_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.analyzer.api_key = Some(key);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.analyzer.model = model;
        }

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.notification.telegram_bot_token = Some(token);
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.notification.telegram_chat_id = Some(chat_id);
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets clamped to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// How the MACD condition of the candidate gate is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdRule {
    /// DIF above DEA on the latest bar.
    #[default]
    Above,
    /// DIF crossed above DEA on the latest bar (previous DIF <= DEA).
    Crossover,
}

/// Scanner configuration: ticker pool, data source and gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Tickers to scan. Empty means the built-in default pool.
    #[serde(default)]
    pub stock_list: Vec<String>,

    /// Exchange suffix appended to bare tickers.
    #[serde(default = "default_exchange_suffix")]
    pub exchange_suffix: String,

    /// Calendar days of daily history requested per ticker.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Minimum number of bars for the gate to be evaluated.
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// Number of trailing (bar, indicator) entries attached to a candidate.
    #[serde(default = "default_trailing_window")]
    pub trailing_window: usize,

    /// Upper bound on candidates sent to the analyzer.
    #[serde(default = "default_max_analyzed")]
    pub max_analyzed: usize,

    /// Exclusive upper bound on (close - MA20) / MA20.
    #[serde(default = "default_bias_limit")]
    pub bias_limit: f64,

    /// MACD condition variant.
    #[serde(default)]
    pub macd_rule: MacdRule,

    /// Base URL of the Yahoo-compatible chart API.
    #[serde(default = "default_data_endpoint")]
    pub data_endpoint: String,

    /// HTTP timeout for a single history request.
    #[serde(default = "default_data_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            stock_list: Vec::new(),
            exchange_suffix: default_exchange_suffix(),
            lookback_days: default_lookback_days(),
            min_bars: default_min_bars(),
            trailing_window: default_trailing_window(),
            max_analyzed: default_max_analyzed(),
            bias_limit: default_bias_limit(),
            macd_rule: MacdRule::default(),
            data_endpoint: default_data_endpoint(),
            request_timeout_secs: default_data_timeout_secs(),
        }
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Gemini analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Generative Language API base URL
    #[serde(default = "default_analyzer_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_analyzer_model")]
    pub model: String,

    /// API key; analysis is skipped when absent
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_analyzer_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first failed request
    #[serde(default = "default_analyzer_retries")]
    pub max_retries: u32,

    /// Backoff between retries in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analyzer_endpoint(),
            model: default_analyzer_model(),
            api_key: None,
            timeout_secs: default_analyzer_timeout_secs(),
            max_retries: default_analyzer_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Dashboard delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether the dashboard is pushed to Telegram at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Telegram Bot API base URL
    #[serde(default = "default_telegram_endpoint")]
    pub telegram_endpoint: String,

    /// Bot token
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    /// Target chat
    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    /// Delivery attempts
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Request timeout in seconds
    #[serde(default = "default_notification_timeout_secs")]
    pub timeout_secs: u64,
}

impl NotificationConfig {
    /// Whether Telegram delivery is fully configured.
    pub fn telegram_ready(&self) -> bool {
        self.enabled
            && self.telegram_bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.telegram_chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            telegram_endpoint: default_telegram_endpoint(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            retry_count: default_retry_count(),
            timeout_secs: default_notification_timeout_secs(),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}
fn default_exchange_suffix() -> String {
    ".TW".into()
}
fn default_lookback_days() -> u32 {
    365
}
fn default_min_bars() -> usize {
    60
}
fn default_trailing_window() -> usize {
    10
}
fn default_max_analyzed() -> usize {
    30
}
fn default_bias_limit() -> f64 {
    0.05
}
fn default_data_endpoint() -> String {
    "https://query1.finance.yahoo.com".into()
}
fn default_data_timeout_secs() -> u64 {
    20
}
fn default_analyzer_endpoint() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_analyzer_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_analyzer_timeout_secs() -> u64 {
    60
}
fn default_analyzer_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_telegram_endpoint() -> String {
    "https://api.telegram.org".into()
}
fn default_retry_count() -> u32 {
    3
}
fn default_notification_timeout_secs() -> u64 {
    30
}
