//! Notification module for delivering the analysis dashboard.
//!
//! The dashboard is rendered once per run and handed to a [`MessageSink`]:
//! Telegram when a bot token and chat id are configured, the log otherwise.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use twse_common::util::{sanitize_for_log, truncate_with_ellipsis};
use twse_common::{Config, NotificationConfig};

use crate::analysis::AnalysisReport;

/// Telegram rejects messages over 4096 characters.
const TELEGRAM_MAX_CHARS: usize = 4000;

const SUMMARY_MAX_CHARS: usize = 120;

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━";

// ============================================================================
// Traits
// ============================================================================

/// Delivers a batch of reports.
#[async_trait]
pub trait Notifier<R: Sync>: Send + Sync {
    async fn notify(&self, reports: &[R]) -> Result<()>;
}

/// Transport for a rendered message.
#[async_trait]
pub trait MessageSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, text: &str) -> Result<()>;
}

// ============================================================================
// Telegram
// ============================================================================

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API `sendMessage` sink.
pub struct TelegramSink {
    endpoint: String,
    bot_token: String,
    chat_id: String,
    retry_count: u32,
    client: reqwest::Client,
}

impl TelegramSink {
    /// Build a sink, or `None` when the bot token or chat id is missing.
    pub fn new(config: &NotificationConfig) -> Option<Self> {
        if !config.telegram_ready() {
            return None;
        }
        let bot_token = config.telegram_bot_token.clone()?;
        let chat_id = config.telegram_chat_id.clone()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Some(Self {
            endpoint: config.telegram_endpoint.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
            retry_count: config.retry_count.max(1),
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.endpoint, self.bot_token)
    }

    /// Send one chunk with retry and linear backoff.
    async fn send_chunk(&self, text: &str) -> Result<()> {
        let url = self.url();
        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.try_send(&url, text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %e,
                        "Failed to send Telegram message, retrying..."
                    );
                    last_error = Some(e);

                    if attempt < self.retry_count {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }

    /// Try a single delivery. Falls back to plain text when Telegram cannot
    /// parse the Markdown (model output may contain stray `*` or `_`).
    async fn try_send(&self, url: &str, text: &str) -> Result<()> {
        match self.post(url, text, Some("Markdown")).await {
            Err(e) if e.to_string().contains("can't parse entities") => {
                debug!("Markdown rejected, resending as plain text");
                self.post(url, text, None).await
            }
            other => other,
        }
    }

    async fn post(&self, url: &str, text: &str, parse_mode: Option<&'static str>) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(sanitize_for_log(&e.to_string())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<SendMessageResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(r) if status.is_success() && r.ok => Ok(()),
            Some(r) => anyhow::bail!(
                "HTTP {}: {}",
                status,
                r.description.unwrap_or_else(|| "Unknown error".to_string())
            ),
            None => anyhow::bail!(
                "HTTP {}: {}",
                status,
                truncate_with_ellipsis(&sanitize_for_log(&body), 200)
            ),
        }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let chunks = split_message(text, TELEGRAM_MAX_CHARS);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            self.send_chunk(chunk).await?;
            debug!(chunk = i + 1, total, "Telegram chunk sent");
        }
        Ok(())
    }
}

/// Split `text` on line boundaries into chunks of at most `max_chars`
/// characters. A single overlong line is cut at character boundaries.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ============================================================================
// Log Sink
// ============================================================================

/// Writes the message to the log. Used when Telegram is not configured.
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, text: &str) -> Result<()> {
        info!("Dashboard report:\n{}", text);
        Ok(())
    }
}

// ============================================================================
// Dashboard
// ============================================================================

/// Coarse grouping of free-form operation advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceBucket {
    Buy,
    Hold,
    Sell,
}

impl AdviceBucket {
    pub fn classify(advice: &str) -> Self {
        let lower = advice.to_lowercase();
        if advice.contains('賣') || advice.contains("減碼") || lower.contains("sell") {
            Self::Sell
        } else if advice.contains('買') || advice.contains("加碼") || lower.contains("buy") {
            Self::Buy
        } else {
            Self::Hold
        }
    }
}

fn score_emoji(score: u8) -> &'static str {
    match score {
        70..=u8::MAX => "🟢",
        40..=69 => "🟡",
        _ => "🔴",
    }
}

/// Renders reports into one dashboard and sends it through a sink.
pub struct DashboardNotifier {
    sink: Box<dyn MessageSink>,
}

impl DashboardNotifier {
    pub fn new(sink: Box<dyn MessageSink>) -> Self {
        Self { sink }
    }

    /// Telegram when enabled and configured, otherwise the log.
    pub fn from_config(config: &Config) -> Self {
        let notification = &config.notification;
        let telegram = if notification.enabled {
            TelegramSink::new(notification)
        } else {
            None
        };

        match telegram {
            Some(sink) => Self::new(Box::new(sink)),
            None => {
                info!("Telegram not configured, dashboard will be written to the log");
                Self::new(Box::new(LogSink))
            }
        }
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    /// Render today's dashboard.
    pub fn generate_dashboard_report(&self, reports: &[AnalysisReport]) -> String {
        render_dashboard(reports, Local::now().date_naive())
    }
}

/// Render the dashboard for `date`. Reports appear in the order given.
pub fn render_dashboard(reports: &[AnalysisReport], date: NaiveDate) -> String {
    let (mut buy, mut hold, mut sell) = (0, 0, 0);
    for report in reports {
        match AdviceBucket::classify(&report.operation_advice) {
            AdviceBucket::Buy => buy += 1,
            AdviceBucket::Hold => hold += 1,
            AdviceBucket::Sell => sell += 1,
        }
    }

    let mut out = format!(
        "📊 *台股強勢股 AI 分析儀表板*\n\
        🗓 {} ｜ 共 {} 檔\n\n\
        🟢 買進 {} ｜ ⚪ 觀望 {} ｜ 🔴 賣出 {}\n",
        date.format("%Y-%m-%d"),
        reports.len(),
        buy,
        hold,
        sell
    );

    for report in reports {
        out.push_str(SEPARATOR);
        out.push('\n');
        out.push_str(&format!(
            "{} *{}* ｜ 評分 {} ｜ {}\n操作建議: {}\n",
            score_emoji(report.sentiment_score),
            report.symbol,
            report.sentiment_score,
            report.trend,
            report.operation_advice
        ));
        if !report.summary.is_empty() {
            out.push_str(&format!(
                "摘要: {}\n",
                truncate_with_ellipsis(&report.summary, SUMMARY_MAX_CHARS)
            ));
        }
        for point in &report.key_points {
            out.push_str(&format!("• {}\n", point));
        }
    }

    out.push_str(SEPARATOR);
    out.push_str("\n_以上分析由 AI 產生，僅供參考，不構成投資建議_");
    out
}

#[async_trait]
impl Notifier<AnalysisReport> for DashboardNotifier {
    async fn notify(&self, reports: &[AnalysisReport]) -> Result<()> {
        if reports.is_empty() {
            return Ok(());
        }

        let text = self.generate_dashboard_report(reports);
        self.sink.send(&text).await?;

        info!(
            reports = reports.len(),
            sink = self.sink.name(),
            "Analysis report sent"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn report(symbol: &str, score: u8, advice: &str) -> AnalysisReport {
        AnalysisReport {
            symbol: symbol.to_string(),
            sentiment_score: score,
            trend: "多頭".to_string(),
            operation_advice: advice.to_string(),
            summary: "均線多頭排列".to_string(),
            key_points: vec!["量能放大".to_string()],
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSink for std::sync::Arc<RecordingSink> {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_advice_bucket() {
        assert_eq!(AdviceBucket::classify("買進"), AdviceBucket::Buy);
        assert_eq!(AdviceBucket::classify("加碼"), AdviceBucket::Buy);
        assert_eq!(AdviceBucket::classify("觀望"), AdviceBucket::Hold);
        assert_eq!(AdviceBucket::classify("持有"), AdviceBucket::Hold);
        assert_eq!(AdviceBucket::classify("減碼"), AdviceBucket::Sell);
        assert_eq!(AdviceBucket::classify("賣出"), AdviceBucket::Sell);
        assert_eq!(AdviceBucket::classify("Strong Buy"), AdviceBucket::Buy);
    }

    #[test]
    fn test_render_dashboard() {
        let reports = vec![
            report("2330.TW", 82, "買進"),
            report("2454.TW", 55, "觀望"),
            report("2317.TW", 30, "減碼"),
        ];
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let text = render_dashboard(&reports, date);

        assert!(text.contains("2025-06-10"));
        assert!(text.contains("共 3 檔"));
        assert!(text.contains("買進 1 ｜ ⚪ 觀望 1 ｜ 🔴 賣出 1"));
        assert!(text.contains("🟢 *2330.TW* ｜ 評分 82"));
        assert!(text.contains("🟡 *2454.TW*"));
        assert!(text.contains("🔴 *2317.TW*"));
        assert!(text.contains("• 量能放大"));

        // Order as given
        let a = text.find("2330.TW").unwrap();
        let b = text.find("2454.TW").unwrap();
        let c = text.find("2317.TW").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_render_truncates_long_summary() {
        let mut r = report("2330.TW", 70, "買進");
        r.summary = "長".repeat(300);
        let text = render_dashboard(&[r], NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert!(text.contains(&format!("摘要: {}...", "長".repeat(SUMMARY_MAX_CHARS))));
    }

    #[test]
    fn test_split_message() {
        assert_eq!(split_message("a\nb\nc", 100), vec!["a\nb\nc"]);
        assert_eq!(split_message("aaa\nbbb\nccc", 7), vec!["aaa\nbbb", "ccc"]);
        assert_eq!(split_message("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(split_message("", 10).is_empty());

        let long = "行".repeat(9000);
        let chunks = split_message(&long, TELEGRAM_MAX_CHARS);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= TELEGRAM_MAX_CHARS));
    }

    #[test]
    fn test_telegram_sink_requires_credentials() {
        assert!(TelegramSink::new(&NotificationConfig::default()).is_none());

        let config = NotificationConfig {
            telegram_bot_token: Some("123456:abc".to_string()),
            telegram_chat_id: Some("-100200300".to_string()),
            ..Default::default()
        };
        let sink = TelegramSink::new(&config).unwrap();
        assert_eq!(sink.url(), "https://api.telegram.org/bot123456:abc/sendMessage");
    }

    #[test]
    fn test_send_request_serialization() {
        let request = SendMessageRequest {
            chat_id: "42",
            text: "hello",
            parse_mode: None,
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn test_from_config_falls_back_to_log() {
        let notifier = DashboardNotifier::from_config(&Config::default());
        assert_eq!(notifier.sink_name(), "log");

        let mut config = Config::default();
        config.notification.telegram_bot_token = Some("123456:abc".to_string());
        config.notification.telegram_chat_id = Some("42".to_string());
        assert_eq!(DashboardNotifier::from_config(&config).sink_name(), "telegram");

        config.notification.enabled = false;
        assert_eq!(DashboardNotifier::from_config(&config).sink_name(), "log");
    }

    #[tokio::test]
    async fn test_notify_sends_once() {
        let sink = std::sync::Arc::new(RecordingSink::default());
        let notifier = DashboardNotifier::new(Box::new(sink.clone()));

        notifier.notify(&[]).await.unwrap();
        assert!(sink.sent.lock().unwrap().is_empty());

        notifier
            .notify(&[report("2330.TW", 80, "買進"), report("0050.TW", 60, "持有")])
            .await
            .unwrap();
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("共 2 檔"));
    }
}
