pub mod fallback;
pub mod providers;

use lunchbell_core::config::ModelConfig;
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::LlmClient;

pub use fallback::FallbackClient;
pub use providers::gemini::GeminiClient;
pub use providers::openai::OpenAiClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Box::new(GeminiClient::new())),
        "openai" | "ollama" | "groq" | "openrouter" | "openai-compatible" => {
            Ok(Box::new(OpenAiClient::new()))
        }
        other => Err(LunchbellError::Config(format!(
            "unknown model provider '{other}' (expected gemini or an OpenAI-compatible provider)"
        ))),
    }
}

/// Create the primary client, wrapped in a [`FallbackClient`] when fallback
/// models are configured.
pub fn create_chain(
    primary: &ModelConfig,
    fallbacks: &[ModelConfig],
) -> Result<Box<dyn LlmClient>> {
    let client = create_client(primary)?;
    if fallbacks.is_empty() {
        return Ok(client);
    }

    let fallbacks = fallbacks
        .iter()
        .map(|config| -> Result<(ModelConfig, Box<dyn LlmClient>)> {
            Ok((config.clone(), create_client(config)?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(FallbackClient::new(client, fallbacks)))
}
