use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lunchbell_core::config::{is_secret_set, ModelConfig};
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::LlmClient;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Concatenated text of the first candidate.
fn parse_response(body: &str, model_id: &str) -> Result<String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| LunchbellError::LlmParse(e.to_string()))?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LunchbellError::EmptyResponse(format!("gemini/{model_id}")))?;

    if let Some(reason) = &candidate.finish_reason {
        debug!(model = %model_id, finish_reason = %reason, "Gemini candidate finished");
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LunchbellError::EmptyResponse(format!("gemini/{model_id}")));
    }
    Ok(text)
}

impl LlmClient for GeminiClient {
    fn complete<'a>(
        &'a self,
        config: &'a ModelConfig,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let api_key = config
                .api_key
                .as_deref()
                .filter(|k| is_secret_set(Some(*k)))
                .ok_or_else(|| {
                    LunchbellError::Config("Gemini: api_key is required (set GEMINI_API_KEY)".into())
                })?;

            let base = config
                .base_url
                .as_deref()
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/');
            let url = format!("{}/models/{}:generateContent", base, config.model_id);

            let body = GenerateRequest {
                contents: vec![Content {
                    role: "user",
                    parts: vec![TextPart { text: prompt }],
                }],
                generation_config: GenerationConfig {
                    max_output_tokens: config.max_tokens,
                    temperature: config.temperature,
                },
            };

            let response = self
                .http
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| LunchbellError::LlmRequest(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| LunchbellError::LlmRequest(e.to_string()))?;
            if !status.is_success() {
                return Err(LunchbellError::LlmRequest(format!("HTTP {}: {}", status, text)));
            }

            parse_response(&text, &config.model_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let body = r#"{"candidates":[
            {"content":{"parts":[{"text":"오늘의 "},{"text":"메뉴"}],"role":"model"},"finishReason":"STOP"},
            {"content":{"parts":[{"text":"ignored"}]}}
        ]}"#;
        assert_eq!(parse_response(body, "gemini-1.5-flash").unwrap(), "오늘의 메뉴");
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = parse_response(body, "gemini-1.5-flash").unwrap_err();
        assert!(matches!(err, LunchbellError::EmptyResponse(_)));
    }

    #[test]
    fn candidate_without_text_is_empty_response() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let err = parse_response(body, "gemini-1.5-flash").unwrap_err();
        assert!(matches!(err, LunchbellError::EmptyResponse(_)));
    }

    #[test]
    fn garbage_is_parse_error() {
        let err = parse_response("<html>", "gemini-1.5-flash").unwrap_err();
        assert!(matches!(err, LunchbellError::LlmParse(_)));
    }

    #[test]
    fn request_uses_camel_case_generation_config() {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 2048,
                temperature: 0.0,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new();
        let config = ModelConfig {
            api_key: Some("${GEMINI_API_KEY}".into()),
            ..ModelConfig::default()
        };
        let err = client.complete(&config, "hi").await.unwrap_err();
        assert!(matches!(err, LunchbellError::Config(_)));
    }
}
