/// LLM Client: the single point of entry for all Gemini API calls.
///
/// No other module may call the Gemini API directly. The evaluator owns the
/// policy (timeouts, degrading failures to text); this module only speaks
/// the wire format and classifies errors.
///
/// Model: gemini-2.5-flash (hardcoded so both prompts always hit the same model)
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::evaluation::{EvaluationBackend, EvaluationRequest};

pub mod prompts;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for every evaluation.
pub const MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("GOOGLE_API_KEY is not configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Quota exhausted: {message}")]
    QuotaExceeded { message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    pub fn is_quota(&self) -> bool {
        matches!(self, LlmError::QuotaExceeded { .. })
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    pub usage: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_tokens: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidate_tokens: u32,
}

impl GenerateContentResponse {
    /// Joins every text part of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini `generateContent` client. Cheap to clone.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn endpoint() -> String {
        format!("{GEMINI_API_BASE}/{MODEL}:generateContent")
    }

    /// Makes one call to Gemini with instruction, image and job description parts.
    pub async fn call(
        &self,
        request: &EvaluationRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let body = build_request_body(request);

        let response = self
            .client
            .post(Self::endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, body);
            return Err(classify_error(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                "Gemini call succeeded: prompt_tokens={}, candidate_tokens={}",
                usage.prompt_tokens, usage.candidate_tokens
            );
        }
        Ok(parsed)
    }
}

#[async_trait]
impl EvaluationBackend for GeminiClient {
    async fn generate(&self, request: &EvaluationRequest) -> Result<String, LlmError> {
        let response = self.call(request).await?;
        response.text().ok_or_else(|| {
            let reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            warn!("Gemini returned no text (finish reason: {reason})");
            LlmError::EmptyContent
        })
    }
}

fn build_request_body(request: &EvaluationRequest) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: request.prompt.instruction(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: request.document.mime_type,
                        data: &request.document.data,
                    },
                },
                Part::Text {
                    text: &request.job_description,
                },
            ],
        }],
    }
}

/// Maps a non-2xx Gemini response onto `LlmError`. 429 and `RESOURCE_EXHAUSTED`
/// both mean the free-tier quota is gone.
fn classify_error(status: u16, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<GeminiError>(body).ok();
    let exhausted = parsed
        .as_ref()
        .map(|e| e.error.status == "RESOURCE_EXHAUSTED")
        .unwrap_or(false);
    let message = parsed
        .map(|e| e.error.message)
        .unwrap_or_else(|| body.to_string());

    if status == 429 || exhausted {
        LlmError::QuotaExceeded { message }
    } else {
        LlmError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::EncodedImage;
    use crate::evaluation::PromptKind;

    fn sample_request() -> EvaluationRequest {
        EvaluationRequest::new(
            PromptKind::Match,
            EncodedImage::jpeg("aGVsbG8=".to_string()),
            "Senior Rust engineer".to_string(),
        )
    }

    #[test]
    fn test_request_body_has_three_parts_in_order() {
        let request = sample_request();
        let body = serde_json::to_value(build_request_body(&request)).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], prompts::MATCH_PROMPT);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "aGVsbG8=");
        assert_eq!(parts[2]["text"], "Senior Rust engineer");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "85%\n"}, {"text": "Missing: Kafka"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 900, "candidatesTokenCount": 40}
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("85%\nMissing: Kafka"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_classify_429_as_quota() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded for metric", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = classify_error(429, body);
        assert!(err.is_quota());
        assert!(err.to_string().contains("Quota exceeded for metric"));
    }

    #[test]
    fn test_classify_resource_exhausted_without_429() {
        let body = r#"{"error": {"code": 403, "message": "out of quota", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_error(403, body).is_quota());
    }

    #[test]
    fn test_classify_other_status_as_api_error() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        match classify_error(400, body) {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_unparseable_body_keeps_raw_text() {
        match classify_error(502, "Bad Gateway") {
            LlmError::Api { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_at_first_use() {
        let client = GeminiClient::new(None);
        let err = client.generate(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
