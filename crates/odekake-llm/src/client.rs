use std::sync::OnceLock;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// The model's reading of a page, parsed from its JSON answer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmVerdict {
    pub is_closed: bool,
    #[serde(default)]
    pub reason: String,
    pub confidence: f64,
    #[serde(default)]
    pub detected_info: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Client for a messages-style LLM endpoint.
///
/// Only consulted when page text was fetched but no regex heuristic fired;
/// the resolver treats every failure here as "no signal".
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    /// Same as [`LlmClient::new`] with an explicit base URL, for tests
    /// against a mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Asks the model whether the facility is closed on the date, given the
    /// page text that the regex heuristics could not read.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Status`] for non-2xx answers and
    /// [`LlmError::MalformedResponse`] when no JSON verdict can be parsed
    /// out of the model's reply.
    pub async fn judge(
        &self,
        facility_name: &str,
        date: NaiveDate,
        weekday_label: &str,
        page_text: &str,
    ) -> Result<LlmVerdict, LlmError> {
        let prompt = build_prompt(facility_name, date, weekday_label, page_text);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: 1000,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        let text = parsed
            .content
            .first()
            .map(|b| b.text.as_str())
            .unwrap_or_default();
        extract_verdict(text)
    }
}

fn json_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap())
}

/// Pulls the first `{…}` block out of the model's prose and parses it.
/// A confidence outside the unit interval is as unusable as bad JSON.
fn extract_verdict(text: &str) -> Result<LlmVerdict, LlmError> {
    let block = json_block_re()
        .find(text)
        .ok_or_else(|| LlmError::MalformedResponse("no JSON block in reply".to_string()))?;
    let verdict: LlmVerdict = serde_json::from_str(block.as_str())
        .map_err(|e| LlmError::MalformedResponse(format!("bad JSON verdict: {e}")))?;
    if !verdict.confidence.is_finite() || !(0.0..=1.0).contains(&verdict.confidence) {
        return Err(LlmError::MalformedResponse(format!(
            "confidence {} outside [0, 1]",
            verdict.confidence
        )));
    }
    Ok(verdict)
}

fn build_prompt(facility_name: &str, date: NaiveDate, weekday_label: &str, page_text: &str) -> String {
    // Page text is truncated so one bloated page cannot blow the request.
    let excerpt: String = page_text.chars().take(4000).collect();
    format!(
        "以下は「{facility_name}」の公式サイトの本文です。{date}（{weekday_label}）に\
         この施設が休館かどうかを判定し、次のJSONのみで答えてください。\n\
         {{\"is_closed\": true/false, \"reason\": \"...\", \"confidence\": 0.0-1.0, \
         \"detected_info\": \"...\"}}\n\n---\n{excerpt}",
        date = date.format("%Y-%m-%d"),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> LlmClient {
        LlmClient::new("https://unused.example.com", None, "test-model", 5)
            .unwrap()
            .with_base_url(&server.uri())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 14).unwrap()
    }

    #[tokio::test]
    async fn judge_parses_json_block_out_of_prose() {
        let server = MockServer::start().await;
        let reply = "判定結果は次の通りです。\n{\"is_closed\": true, \"reason\": \"振替休館日\", \"confidence\": 0.85, \"detected_info\": \"カレンダー記載\"}";
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": [{"type": "text", "text": reply}]})),
            )
            .mount(&server)
            .await;

        let verdict = client(&server)
            .judge("金沢市老舗記念館", date(), "火曜日", "本文")
            .await
            .unwrap();
        assert!(verdict.is_closed);
        assert_eq!(verdict.reason, "振替休館日");
        assert!((verdict.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn judge_without_json_block_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": [{"type": "text", "text": "休館だと思います"}]})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .judge("金沢市老舗記念館", date(), "火曜日", "本文")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn judge_rejects_confidence_outside_unit_range() {
        let server = MockServer::start().await;
        let reply = r#"{"is_closed": true, "reason": "休館", "confidence": 5.0, "detected_info": ""}"#;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": [{"type": "text", "text": reply}]})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .judge("金沢市老舗記念館", date(), "火曜日", "本文")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(ref m) if m.contains("confidence")));
    }

    #[tokio::test]
    async fn judge_maps_server_error_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .judge("金沢市老舗記念館", date(), "火曜日", "本文")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Status(s) if s.as_u16() == 500));
    }
}
