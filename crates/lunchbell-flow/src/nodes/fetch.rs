use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::{Clock, ContentSource};
use lunchbell_core::types::{Action, SharedContext};

use crate::graph::{Node, Outcome};
use crate::message;

/// Content at or below this many characters is not a menu post.
pub const MIN_CONTENT_CHARS: usize = 20;

/// Scrapes the latest post into `data.raw_content`.
///
/// Owns `status.fetch_success` and `status.last_run`. When every attempt
/// fails the raw content becomes a notice pointing at the source page, and
/// `fetch_success` stays false.
pub struct FetchMenuNode {
    source: Arc<dyn ContentSource>,
    clock: Arc<dyn Clock>,
}

impl FetchMenuNode {
    pub fn new(source: Arc<dyn ContentSource>, clock: Arc<dyn Clock>) -> Self {
        Self { source, clock }
    }
}

impl Node for FetchMenuNode {
    type Prep = String;
    type Exec = String;

    fn name(&self) -> &str {
        "fetch_menu"
    }

    fn prep(&self, ctx: &SharedContext) -> Result<String> {
        let url = ctx.config().source_url.trim();
        if url.is_empty() {
            return Err(LunchbellError::missing(self.name(), "config.source_url"));
        }
        info!(source = %self.source.name(), url, "Preparing menu fetch");
        Ok(url.to_string())
    }

    fn exec<'a>(&'a self, url: &'a String) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let content = self.source.fetch(url).await?;
            let chars = content.trim().chars().count();
            if chars <= MIN_CONTENT_CHARS {
                return Err(LunchbellError::ContentTooShort {
                    chars,
                    min: MIN_CONTENT_CHARS,
                });
            }
            info!(chars, "Menu content fetched");
            Ok(content)
        })
    }

    fn exec_fallback(&self, url: &String, error: &LunchbellError) -> String {
        warn!(url = %url, error = %error, "Menu fetch failed, using placeholder");
        message::fetch_fallback(url)
    }

    fn post(
        &self,
        ctx: &mut SharedContext,
        _url: String,
        outcome: Outcome<String>,
    ) -> Result<Action> {
        let failure = outcome.error().map(str::to_string);
        let content = outcome.into_value();
        let chars = content.trim().chars().count();

        ctx.status.fetch_success = failure.is_none() && chars > MIN_CONTENT_CHARS;
        ctx.status.last_run = Some(self.clock.now());

        if !ctx.status.fetch_success {
            let reason = failure.unwrap_or_else(|| format!("내용이 너무 짧음 ({chars} 글자)"));
            ctx.status.error_log.push(format!("메뉴 수집 실패: {reason}"));
        }

        info!(success = ctx.status.fetch_success, chars, "Menu content stored");
        ctx.data.raw_content = content;
        Ok(Action::Default)
    }
}
