//! Ticker pool resolution.

use twse_common::ScannerConfig;

/// Pool scanned when no stock list is configured: large caps, financials and
/// the two flagship ETFs.
pub const DEFAULT_POOL: [&str; 10] = [
    "2330.TW", "2454.TW", "2317.TW", "2308.TW", "2382.TW", "3231.TW", "2881.TW", "2882.TW",
    "0050.TW", "0056.TW",
];

/// Trim a ticker and append `suffix` unless it already carries it.
///
/// The check is case-insensitive and substring based, so TPEx tickers such as
/// `6488.TWO` pass through unchanged under the `.TW` suffix. Blank entries
/// yield `None`.
pub fn normalize_symbol(raw: &str, suffix: &str) -> Option<String> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        return None;
    }
    if suffix.is_empty() || symbol.to_uppercase().contains(&suffix.to_uppercase()) {
        Some(symbol.to_string())
    } else {
        Some(format!("{}{}", symbol, suffix))
    }
}

/// Resolve the ordered ticker pool for a scan.
///
/// Configured entries are normalized; duplicates are kept. An empty or
/// all-blank list falls back to [`DEFAULT_POOL`].
pub fn resolve_pool(config: &ScannerConfig) -> Vec<String> {
    let pool: Vec<String> = config
        .stock_list
        .iter()
        .filter_map(|s| normalize_symbol(s, &config.exchange_suffix))
        .collect();

    if pool.is_empty() {
        DEFAULT_POOL.iter().map(|s| s.to_string()).collect()
    } else {
        pool
    }
}
