use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use lunchbell_core::config::{is_secret_set, ModelConfig};
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::LlmClient;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions client. Works with OpenAI, Ollama, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_response(body: &str, model_id: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LunchbellError::LlmParse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| LunchbellError::EmptyResponse(model_id.to_string()))
}

impl LlmClient for OpenAiClient {
    fn complete<'a>(
        &'a self,
        config: &'a ModelConfig,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let base = config
                .base_url
                .as_deref()
                .unwrap_or(OPENAI_API_BASE)
                .trim_end_matches('/');
            let url = format!("{base}/chat/completions");

            let body = ChatRequest {
                model: &config.model_id,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            };

            let mut req = self.http.post(&url).json(&body);
            // Local servers like Ollama run without a key.
            if let Some(key) = config.api_key.as_deref().filter(|k| is_secret_set(Some(*k))) {
                req = req.bearer_auth(key);
            }

            let response = req
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
