use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use lunchbell_core::config::SourceConfig;
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::ContentSource;

use crate::html::{json_ld_blocks, meta_content, strip_html_tags};

/// Lines of page text kept by the last-resort strategy must mention one of these.
const MENU_KEYWORDS: [&str; 4] = ["메뉴", "오늘", "음식", "요리"];

/// Scrapes the latest post text from a public Instagram profile or post page.
///
/// Tries, in order: the JSON-LD post body, the `og:description` caption, and
/// finally the visible page text filtered to menu-like lines.
pub struct InstagramSource {
    http: reqwest::Client,
}

impl InstagramSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| LunchbellError::Source(format!("HTTP client init failed: {e}")))?;
        Ok(Self { http })
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LunchbellError::Source(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LunchbellError::Source(format!("HTTP {status} from {url}")));
        }

        resp.text()
            .await
            .map_err(|e| LunchbellError::Source(format!("reading body failed: {e}")))
    }
}

impl ContentSource for InstagramSource {
    fn name(&self) -> &str {
        "instagram"
    }

    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let html = self.fetch_page(locator).await?;
            debug!(url = %locator, bytes = html.len(), "Fetched page");

            match extract_post_text(&html) {
                Some((strategy, text)) => {
                    info!(url = %locator, strategy, chars = text.chars().count(), "Extracted post text");
                    Ok(text)
                }
                None => {
                    warn!(url = %locator, "No post text found on page");
                    Err(LunchbellError::Source(format!("no post text found at {locator}")))
                }
            }
        })
    }
}

/// Run the extraction strategies in order. Returns the winning strategy's
/// name with the text.
pub fn extract_post_text(html: &str) -> Option<(&'static str, String)> {
    if let Some(text) = from_json_ld(html) {
        return Some(("json_ld", text));
    }
    if let Some(text) = meta_content(html, "og:description").and_then(|d| caption(&d)) {
        return Some(("og_description", text));
    }
    from_page_text(html).map(|text| ("page_text", text))
}

fn from_json_ld(html: &str) -> Option<String> {
    json_ld_blocks(html).into_iter().find_map(|block| {
        let value: serde_json::Value = serde_json::from_str(block).ok()?;
        post_body(&value)
    })
}

/// Post text from a JSON-LD document, which may be a single object or a list.
fn post_body(value: &serde_json::Value) -> Option<String> {
    if let Some(items) = value.as_array() {
        return items.iter().find_map(post_body);
    }

    let candidates = [
        value.get("articleBody"),
        value.get("mainEntity").and_then(|m| m.get("text")),
        value.get("caption"),
        value.get("text"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Instagram's description reads `N likes, M comments - user on DATE: "caption"`.
/// Keep only the caption when that shape is present.
fn caption(description: &str) -> Option<String> {
    let text = match description.split_once(": \"") {
        Some((_, quoted)) => quoted.trim_end().trim_end_matches('.').trim_end_matches('"'),
        None => description,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn from_page_text(html: &str) -> Option<String> {
    let text = strip_html_tags(html);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| MENU_KEYWORDS.iter().any(|k| line.contains(k)))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
