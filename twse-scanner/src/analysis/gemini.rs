//! Gemini-backed candidate analyzer.
//!
//! Sends the candidate's trailing window to the Generative Language API and
//! parses the model's JSON answer into an [`AnalysisReport`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use twse_common::util::{sanitize_for_log, truncate_with_ellipsis};
use twse_common::{AnalyzerConfig, Config, Error};

use super::{AnalysisContext, Analyzer};

// ============================================================================
// Report
// ============================================================================

/// Model verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub symbol: String,
    /// 0 (bearish) to 100 (bullish)
    pub sentiment_score: u8,
    pub trend: String,
    pub operation_advice: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Analyzer calling a Gemini model.
pub struct GeminiAnalyzer {
    config: AnalyzerConfig,
    client: reqwest::Client,
    warned_missing_key: AtomicBool,
}

impl GeminiAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            client,
            warned_missing_key: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.analyzer.clone())
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Call the model with retry, returning its raw text.
    async fn generate(&self, api_key: &str, prompt: &str) -> anyhow::Result<String> {
        let url = self.endpoint_url();
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json",
            },
        };

        let max_attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.try_send(&url, api_key, &request).await {
                Ok(text) => {
                    debug!(model = %self.config.model, attempt, "Gemini request successful");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        model = %self.config.model,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Gemini request failed, retrying..."
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms))
                            .await;
                    }
                }
            }
        }

        Err(last_error
            .map(anyhow::Error::from)
            .unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }

    /// Try a single request.
    async fn try_send(
        &self,
        url: &str,
        api_key: &str,
        request: &GenerateRequest<'_>,
    ) -> twse_common::Result<String> {
        let response = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await
            .map_err(|e| Error::External(sanitize_for_log(&e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::External(sanitize_for_log(&e.to_string())))?;

        if !status.is_success() {
            return Err(Error::External(format!(
                "Gemini API error: HTTP {} - {}",
                status,
                truncate_with_ellipsis(&sanitize_for_log(&body), 300)
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| Error::from(e).with_context("Malformed Gemini response"))?;
        parsed
            .text()
            .ok_or_else(|| Error::External("Gemini returned no text".to_string()))
    }

    /// Build the analysis prompt for one candidate.
    fn build_prompt(&self, context: &AnalysisContext) -> anyhow::Result<String> {
        let window = serde_json::to_string_pretty(&context.trailing_window)
            .context("Failed to render trailing window")?;

        Ok(format!(
            r#"你是一位專業的台股技術分析師。以下個股已通過技術面強勢篩選（均線多頭排列、MACD 多方、KDJ 向上、乖離率未過熱）。

## 股票代號
{}

## 最近 {} 個交易日資料（含技術指標）
```json
{}
```

## 請提供以下分析
1. **情緒評分**: 0-100，越高越看多
2. **趨勢判斷**: 強勢多頭 / 多頭 / 震盪 / 空頭
3. **操作建議**: 買進 / 加碼 / 持有 / 觀望 / 減碼 / 賣出
4. **摘要**: 100 字以內的核心理由
5. **關鍵觀察**: 2-4 點

請只回傳 JSON，格式如下：
```json
{{
  "sentiment_score": 75,
  "trend": "多頭",
  "operation_advice": "買進",
  "summary": "核心理由",
  "key_points": ["觀察1", "觀察2"]
}}
```"#,
            context.symbol,
            context.trailing_window.len(),
            window
        ))
    }

    /// Parse the model's text into a report.
    fn parse_report(&self, symbol: &str, content: &str) -> anyhow::Result<AnalysisReport> {
        let json_str = extract_json(content)?;
        let parsed: serde_json::Value =
            serde_json::from_str(&json_str).context("Failed to parse model output as JSON")?;

        if !parsed.is_object() {
            anyhow::bail!("Model output is not a JSON object");
        }

        let text = |field: &str, fallback: &str| {
            parsed
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        let sentiment_score = parsed
            .get("sentiment_score")
            .and_then(|v| v.as_f64())
            .unwrap_or(50.0)
            .clamp(0.0, 100.0)
            .round() as u8;

        let key_points = parsed
            .get("key_points")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(AnalysisReport {
            symbol: symbol.to_string(),
            sentiment_score,
            trend: text("trend", "震盪"),
            operation_advice: text("operation_advice", "觀望"),
            summary: text("summary", ""),
            key_points,
        })
    }
}

/// Extract a JSON object from text that may wrap it in a markdown code block.
fn extract_json(content: &str) -> anyhow::Result<String> {
    let trimmed = content.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok_and(|v| v.is_object()) {
        return Ok(trimmed.to_string());
    }

    if let Some(start) = content.find("```json") {
        let start = start + 7;
        if let Some(end) = content[start..].find("```") {
            return Ok(content[start..start + end].trim().to_string());
        }
    }

    if let Some(start) = content.find('{') {
        let mut depth = 0;
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in content[start..].char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(content[start..start + i + 1].to_string());
                    }
                }
                _ => {}
            }
        }
    }

    anyhow::bail!("Could not find JSON in response")
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    type Report = AnalysisReport;

    async fn analyze(&self, context: &AnalysisContext) -> anyhow::Result<Option<AnalysisReport>> {
        let Some(api_key) = self.api_key() else {
            if !self.warned_missing_key.swap(true, Ordering::Relaxed) {
                warn!("GEMINI_API_KEY not configured, skipping AI analysis");
            }
            return Ok(None);
        };

        let prompt = self.build_prompt(context)?;
        let content = self
            .generate(api_key, &prompt)
            .await
            .with_context(|| format!("Gemini analysis failed for {}", context.symbol))?;

        match self.parse_report(&context.symbol, &content) {
            Ok(report) => {
                info!(
                    symbol = %report.symbol,
                    score = report.sentiment_score,
                    advice = %report.operation_advice,
                    "Analysis complete"
                );
                Ok(Some(report))
            }
            Err(e) => {
                warn!(
                    symbol = %context.symbol,
                    error = %e,
                    output = %truncate_with_ellipsis(&content, 200),
                    "Unusable model output, dropping candidate"
                );
                Ok(None)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DailyBar;
    use crate::indicator::IndicatorFrame;
    use crate::screener::TrailingEntry;
    use chrono::NaiveDate;

    fn analyzer() -> GeminiAnalyzer {
        GeminiAnalyzer::new(AnalyzerConfig::default())
    }

    fn context() -> AnalysisContext {
        let entry = TrailingEntry {
            bar: DailyBar {
                date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                open: 1_080.0,
                high: 1_095.0,
                low: 1_075.0,
                close: 1_090.0,
                volume: 31_000_000.0,
            },
            frame: IndicatorFrame {
                ma5: Some(1_082.0),
                ma20: Some(1_050.5),
                ..Default::default()
            },
        };
        AnalysisContext {
            symbol: "2330.TW".to_string(),
            trailing_window: vec![entry; 10],
        }
    }

    #[test]
    fn test_build_prompt() {
        let prompt = analyzer().build_prompt(&context()).unwrap();
        assert!(prompt.contains("2330.TW"));
        assert!(prompt.contains("最近 10 個交易日"));
        assert!(prompt.contains("1050.5"));
        assert!(prompt.contains("\"ma10\": null"));
        assert!(prompt.contains("operation_advice"));
    }

    #[test]
    fn test_endpoint_url() {
        let analyzer = GeminiAnalyzer::new(AnalyzerConfig {
            endpoint: "https://example.test/".to_string(),
            model: "gemini-test".to_string(),
            ..Default::default()
        });
        assert_eq!(
            analyzer.endpoint_url(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_response_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"trend\":"},{"text":"\"多頭\"}"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text().as_deref(), Some(r#"{"trend":"多頭"}"#));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_extract_json_from_code_block() {
        let content = "分析如下：\n```json\n{\"trend\": \"多頭\"}\n```\n以上。";
        assert_eq!(extract_json(content).unwrap(), "{\"trend\": \"多頭\"}");
    }

    #[test]
    fn test_extract_json_raw_nested() {
        let content = r#"結果 {"a": {"b": 1}, "c": 2} 完畢"#;
        assert_eq!(extract_json(content).unwrap(), r#"{"a": {"b": 1}, "c": 2}"#);
        assert!(extract_json("沒有資料").is_err());
        assert!(extract_json("{ unterminated").is_err());
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let raw = r#"{"trend": "多頭", "summary": "突破區間 {980 附近"}"#;
        assert_eq!(extract_json(raw).unwrap(), raw);

        let wrapped = r#"分析如下 {"summary": "留意 } 與 \"{\" 符號", "score": 1} 以上"#;
        assert_eq!(
            extract_json(wrapped).unwrap(),
            r#"{"summary": "留意 } 與 \"{\" 符號", "score": 1}"#
        );
    }

    #[test]
    fn test_parse_report() {
        let content = r#"```json
{
  "sentiment_score": 78.6,
  "trend": "強勢多頭",
  "operation_advice": "買進",
  "summary": "均線多頭排列且量能放大",
  "key_points": ["MACD 柱狀體擴大", "KD 高檔鈍化"]
}
```"#;
        let report = analyzer().parse_report("2330.TW", content).unwrap();
        assert_eq!(report.symbol, "2330.TW");
        assert_eq!(report.sentiment_score, 79);
        assert_eq!(report.trend, "強勢多頭");
        assert_eq!(report.operation_advice, "買進");
        assert_eq!(report.key_points.len(), 2);
    }

    #[test]
    fn test_parse_report_raw_json_with_brace_in_summary() {
        let content = r#"{"sentiment_score":70,"trend":"多頭","operation_advice":"買進","summary":"突破區間 {980 附近","key_points":[]}"#;
        let report = analyzer().parse_report("2330.TW", content).unwrap();
        assert_eq!(report.sentiment_score, 70);
        assert_eq!(report.summary, "突破區間 {980 附近");
    }

    #[test]
    fn test_parse_report_fallbacks() {
        let report = analyzer()
            .parse_report("2454.TW", r#"{"sentiment_score": 140, "summary": "  "}"#)
            .unwrap();
        assert_eq!(report.sentiment_score, 100);
        assert_eq!(report.trend, "震盪");
        assert_eq!(report.operation_advice, "觀望");
        assert_eq!(report.summary, "");
        assert!(report.key_points.is_empty());
    }

    #[test]
    fn test_parse_report_rejects_garbage() {
        assert!(analyzer().parse_report("X", "I cannot help with that.").is_err());
        assert!(analyzer().parse_report("X", "```json\n[1, 2]\n```").is_err());
    }

    #[test]
    fn test_missing_key_declines() {
        let analyzer = GeminiAnalyzer::new(AnalyzerConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        });
        let first = tokio_test::block_on(analyzer.analyze(&context())).unwrap();
        let second = tokio_test::block_on(analyzer.analyze(&context())).unwrap();
        assert!(first.is_none());
        assert!(second.is_none());
        assert!(analyzer.warned_missing_key.load(Ordering::Relaxed));
    }
}
