use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::config::ModelConfig;
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::LlmClient;
use lunchbell_core::types::{Action, SharedContext};

use crate::graph::{Node, Outcome};
use crate::message;

/// Turns the raw post into a categorized menu summary.
pub struct SummarizeMenuNode {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
}

impl SummarizeMenuNode {
    pub fn new(llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self { llm, model }
    }
}

fn build_prompt(raw: &str) -> String {
    format!(
        r#"다음은 한식뷔페 인스타그램 포스트에서 가져온 메뉴 정보입니다.
이 내용을 읽기 쉽고 구조화된 형태로 요약해주세요.

원본 내용:
{raw}

요약 요구사항:
1. 한국어로 작성
2. 메뉴를 카테고리별로 정리 (주요리, 밑반찬, 국물류, 후식 등)
3. 이모지를 적절히 사용하여 보기 좋게 작성
4. 없는 메뉴는 추가하지 마세요
5. 영업시간이나 기타 정보가 있다면 포함

아래 형식으로 작성해주세요:

🍽️ **오늘의 메뉴**

**🥩 주요리**
- 메뉴1

**🥬 밑반찬**
- 반찬1

**🍲 국물류**
- 국물요리1

**🍰 후식**
- 후식류

**ℹ️ 기타정보**
- 영업시간: (있다면)
- 특이사항: (있다면)"#
    )
}

/// A summary counts only when it is non-empty and talks about the menu.
pub fn looks_like_menu(summary: &str) -> bool {
    let summary = summary.trim();
    !summary.is_empty() && (summary.contains("메뉴") || summary.to_lowercase().contains("menu"))
}

impl Node for SummarizeMenuNode {
    type Prep = String;
    type Exec = String;

    fn name(&self) -> &str {
        "summarize_menu"
    }

    fn prep(&self, ctx: &SharedContext) -> Result<String> {
        info!(chars = ctx.data.raw_content.chars().count(), "Preparing menu summary");
        Ok(ctx.data.raw_content.clone())
    }

    fn exec<'a>(&'a self, raw: &'a String) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if raw.trim().is_empty() {
                return Err(LunchbellError::Source("no menu content to summarize".into()));
            }
            let summary = self.llm.complete(&self.model, &build_prompt(raw)).await?;
            if summary.trim().is_empty() {
                return Err(LunchbellError::EmptyResponse(self.model.model_id.clone()));
            }
            Ok(summary.trim().to_string())
        })
    }

    fn exec_fallback(&self, raw: &String, error: &LunchbellError) -> String {
        warn!(error = %error, "Menu summary failed, quoting raw text");
        message::summary_fallback(raw)
    }

    fn post(
        &self,
        ctx: &mut SharedContext,
        _raw: String,
        outcome: Outcome<String>,
    ) -> Result<Action> {
        let degraded = outcome.is_degraded();
        let summary = outcome.into_value();

        ctx.status.summarize_success = !degraded && looks_like_menu(&summary);
        if !ctx.status.summarize_success {
            ctx.status
                .error_log
                .push("메뉴 요약 실패: 유효하지 않은 요약 결과");
        }

        info!(success = ctx.status.summarize_success, degraded, "Menu summary stored");
        ctx.data.summary = summary;
        Ok(Action::Default)
    }
}
