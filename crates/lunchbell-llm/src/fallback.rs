use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::config::ModelConfig;
use lunchbell_core::error::Result;
use lunchbell_core::traits::LlmClient;

/// An LLM client that falls back to alternative models when the primary fails.
///
/// There is no retry loop here: the calling node owns the retry budget, so
/// each `complete` makes at most one call per configured model.
pub struct FallbackClient {
    primary: Box<dyn LlmClient>,
    fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
}

impl FallbackClient {
    pub fn new(
        primary: Box<dyn LlmClient>,
        fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
    ) -> Self {
        Self { primary, fallbacks }
    }
}

impl LlmClient for FallbackClient {
    fn complete<'a>(
        &'a self,
        config: &'a ModelConfig,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let primary_err = match self.primary.complete(config, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            info!(
                model = %config.model_id,
                error = %primary_err,
                "Primary LLM failed, trying fallback models"
            );
            for (fb_config, fb_client) in &self.fallbacks {
                match fb_client.complete(fb_config, prompt).await {
                    Ok(text) => {
                        info!(
                            model = %fb_config.model_id,
                            provider = %fb_config.provider,
                            "Fell back to alternative model"
                        );
                        return Ok(text);
                    }
                    Err(e) => {
                        warn!(
                            model = %fb_config.model_id,
                            error = %e,
                            "Fallback model also failed"
                        );
                    }
                }
            }

            Err(primary_err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use lunchbell_core::error::LunchbellError;

    use super::*;

    struct Canned {
        reply: std::result::Result<&'static str, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Canned {
        fn boxed(
            reply: std::result::Result<&'static str, &'static str>,
        ) -> (Box<dyn LlmClient>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let client = Box::new(Self {
                reply,
                calls: calls.clone(),
            });
            (client, calls)
        }
    }

    impl LlmClient for Canned {
        fn complete<'a>(
            &'a self,
            _config: &'a ModelConfig,
            _prompt: &'a str,
        ) -> BoxFuture<'a, Result<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .reply
                .map(str::to_string)
                .map_err(|e| LunchbellError::LlmRequest(e.to_string()));
            Box::pin(async move { reply })
        }
    }

    fn model(id: &str) -> ModelConfig {
        ModelConfig {
            model_id: id.into(),
            ..ModelConfig::default()
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallbacks() {
        let (primary, _) = Canned::boxed(Ok("primary"));
        let (fb, fb_calls) = Canned::boxed(Ok("fallback"));
        let client = FallbackClient::new(primary, vec![(model("fb"), fb)]);

        assert_eq!(client.complete(&model("main"), "p").await.unwrap(), "primary");
        assert_eq!(fb_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_working_fallback_answers() {
        let (primary, _) = Canned::boxed(Err("HTTP 503"));
        let (broken, broken_calls) = Canned::boxed(Err("HTTP 429"));
        let (working, _) = Canned::boxed(Ok("from fallback"));
        let client = FallbackClient::new(
            primary,
            vec![(model("fb-1"), broken), (model("fb-2"), working)],
        );

        assert_eq!(
            client.complete(&model("main"), "p").await.unwrap(),
            "from fallback"
        );
        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_reports_primary_error() {
        let (primary, primary_calls) = Canned::boxed(Err("HTTP 503"));
        let (fb, _) = Canned::boxed(Err("HTTP 429"));
        let client = FallbackClient::new(primary, vec![(model("fb"), fb)]);

        let err = client.complete(&model("main"), "p").await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    }
}
