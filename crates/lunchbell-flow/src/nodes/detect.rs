use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::config::ModelConfig;
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::LlmClient;
use lunchbell_core::types::{Action, SharedContext, SituationAnalysis, SituationKind};

use crate::graph::{Node, Outcome};

const HOLIDAY_KEYWORDS: &[&str] = &["휴무", "쉽니다", "휴업", "closed"];
const SPECIAL_KEYWORDS: &[&str] = &["특별", "이벤트", "한정", "special"];

/// Classifies the scraped post as a normal menu, a closure, or a special
/// menu, and routes on the result.
pub struct SituationDetectorNode {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
}

impl SituationDetectorNode {
    pub fn new(llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self { llm, model }
    }
}

fn build_prompt(raw: &str) -> String {
    format!(
        r#"다음은 한식뷔페 인스타그램 포스트에서 가져온 내용입니다.
오늘이 어떤 상황인지 판단해주세요.

원본 내용:
{raw}

상황 종류:
- normal: 평소처럼 오늘의 메뉴를 안내하는 포스트
- holiday: 휴무일, 임시 휴업 등 영업하지 않는다는 안내
- special_menu: 이벤트, 한정 메뉴 등 특별 메뉴 안내

반드시 아래 JSON 형식으로만 답해주세요:
{{
  "situation_type": "normal | holiday | special_menu",
  "confidence": 0.0,
  "detected_keywords": ["키워드"],
  "summary": "상황 한 줄 요약",
  "action_required": "고객에게 안내할 내용"
}}"#
    )
}

/// Parse the model's reply, tolerating prose or code fences around the JSON
/// object.
pub fn parse_analysis(reply: &str) -> Result<SituationAnalysis> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str(&reply[s..=e])
            .map_err(|err| LunchbellError::LlmParse(err.to_string())),
        _ => Err(LunchbellError::LlmParse(
            "no JSON object in classification reply".into(),
        )),
    }
}

/// Deterministic classification used when the model is unavailable.
///
/// Holiday keywords win over special-menu keywords; empty text is an error
/// situation.
pub fn classify_by_keywords(raw: &str) -> SituationAnalysis {
    let text = raw.trim();
    if text.is_empty() {
        return SituationAnalysis {
            situation_type: SituationKind::Error,
            confidence: 0.0,
            detected_keywords: Vec::new(),
            summary: "분석할 내용이 없습니다".to_string(),
            action_required: "직접 인스타그램을 확인해주세요".to_string(),
        };
    }

    let lower = text.to_lowercase();
    let found = |words: &[&str]| -> Vec<String> {
        words
            .iter()
            .filter(|w| lower.contains(*w))
            .map(|w| w.to_string())
            .collect()
    };

    let holiday = found(HOLIDAY_KEYWORDS);
    if !holiday.is_empty() {
        return SituationAnalysis {
            situation_type: SituationKind::Holiday,
            confidence: 0.6,
            detected_keywords: holiday,
            summary: "휴무 안내로 보입니다".to_string(),
            action_required: "오늘은 영업하지 않습니다".to_string(),
        };
    }

    let special = found(SPECIAL_KEYWORDS);
    if !special.is_empty() {
        return SituationAnalysis {
            situation_type: SituationKind::SpecialMenu,
            confidence: 0.6,
            detected_keywords: special,
            summary: "특별 메뉴 안내로 보입니다".to_string(),
            action_required: String::new(),
        };
    }

    SituationAnalysis {
        situation_type: SituationKind::Normal,
        confidence: 0.5,
        detected_keywords: Vec::new(),
        summary: String::new(),
        action_required: String::new(),
    }
}

impl Node for SituationDetectorNode {
    type Prep = String;
    type Exec = SituationAnalysis;

    fn name(&self) -> &str {
        "situation_detector"
    }

    fn prep(&self, ctx: &SharedContext) -> Result<String> {
        Ok(ctx.data.raw_content.clone())
    }

    fn exec<'a>(&'a self, raw: &'a String) -> BoxFuture<'a, Result<SituationAnalysis>> {
        Box::pin(async move {
            if raw.trim().is_empty() {
                return Err(LunchbellError::Source("no content to classify".into()));
            }
            let reply = self.llm.complete(&self.model, &build_prompt(raw)).await?;
            let analysis = parse_analysis(&reply)?;
            info!(
                situation = ?analysis.situation_type,
                confidence = analysis.confidence,
                "Situation classified"
            );
            Ok(analysis)
        })
    }

    fn exec_fallback(&self, raw: &String, error: &LunchbellError) -> SituationAnalysis {
        warn!(error = %error, "Situation classification failed, using keyword rules");
        classify_by_keywords(raw)
    }

    fn post(
        &self,
        ctx: &mut SharedContext,
        raw: String,
        outcome: Outcome<SituationAnalysis>,
    ) -> Result<Action> {
        let analysis = outcome.into_value();
        let kind = analysis.situation_type;

        // An `error` verdict on real content is still a classification.
        ctx.status.situation_detected = !raw.trim().is_empty();
        if !ctx.status.situation_detected {
            ctx.status
                .error_log
                .push("상황 감지 실패: 분석할 메뉴 내용이 없음");
        }
        ctx.data.situation = Some(analysis);

        info!(situation = ?kind, detected = ctx.status.situation_detected, "Situation stored");
        Ok(kind.action())
    }
}
