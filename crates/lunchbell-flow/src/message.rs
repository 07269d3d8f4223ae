//! Text of every notice the workflow posts.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};

use lunchbell_core::traits::Clock;
use lunchbell_core::types::{DebugReport, SituationAnalysis};

/// Characters of raw post text quoted when a summary or notice falls back.
pub const RAW_EXCERPT_CHARS: usize = 500;

/// Wall clock plus the offset notices are stamped in.
#[derive(Clone)]
pub struct LocalClock {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl LocalClock {
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current time formatted for message headers.
    pub fn label(&self) -> String {
        format_time(self.clock.now(), self.offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

pub fn format_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%Y년 %m월 %d일 %H시 %M분")
        .to_string()
}

/// First `max` chars of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

pub fn menu_message(summary: &str, time: &str) -> String {
    format!(
        "🍽️ **구도 한식뷔페 오늘의 메뉴** 🍽️\n\n\
         📅 업데이트 시간: {time}\n\n\
         {summary}\n\n\
         ---\n\
         💡 *매일 오전 11시에 자동으로 업데이트됩니다*"
    )
}

pub fn error_message(detail: &str, time: &str) -> String {
    format!(
        "🚨 **메뉴 알림 시스템 오류** 🚨\n\n\
         ⏰ 발생 시간: {time}\n\n\
         ❌ 오류 내용:\n{detail}\n\n\
         🔧 관리자가 확인 중입니다. 잠시 후 다시 시도됩니다."
    )
}

/// Detail for the error notice sent when no summary exists: the raw
/// placeholder plus the errors recorded so far.
pub fn error_detail<'a>(raw: &str, errors: impl Iterator<Item = &'a str>) -> String {
    let mut detail = String::new();
    let raw = raw.trim();
    if !raw.is_empty() {
        detail.push_str(&excerpt(raw, RAW_EXCERPT_CHARS));
        detail.push_str("\n\n");
    }
    let lines: Vec<&str> = errors.collect();
    if lines.is_empty() {
        detail.push_str("- 메뉴 요약을 만들지 못했습니다");
    } else {
        for line in lines {
            detail.push_str("- ");
            detail.push_str(line);
            detail.push('\n');
        }
        detail.truncate(detail.trim_end().len());
    }
    detail
}

pub fn summary_fallback(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "메뉴 정보를 가져올 수 없습니다. 직접 인스타그램을 확인해주세요.".to_string();
    }
    format!(
        "🍽️ **오늘의 메뉴** (자동 요약 실패)\n\n\
         📝 원본 정보:\n{}\n\n\
         ⚠️ 자동 요약에 실패했습니다. 위 원본 정보를 참고해주세요.",
        excerpt(raw, RAW_EXCERPT_CHARS)
    )
}

pub fn fetch_fallback(url: &str) -> String {
    format!(
        "오늘의 메뉴 정보를 자동으로 가져올 수 없습니다.\n\
         직접 인스타그램을 확인해주세요.\n\n\
         🔗 {url}"
    )
}

pub fn holiday_message(analysis: &SituationAnalysis, time: &str) -> String {
    let summary = if analysis.summary.trim().is_empty() {
        "오늘은 휴무일입니다."
    } else {
        analysis.summary.trim()
    };
    let mut msg = format!(
        "🏖️ **구도 한식뷔페 휴무 안내** 🏖️\n\n\
         📅 안내 시간: {time}\n\n\
         {summary}\n"
    );
    push_analysis_lines(&mut msg, analysis);
    msg.push_str("\n---\n💡 *다음 영업일에 다시 메뉴를 알려드릴게요*");
    msg
}

pub fn special_menu_message(analysis: &SituationAnalysis, raw: &str, time: &str) -> String {
    let mut msg = format!(
        "🎉 **구도 한식뷔페 특별 메뉴 안내** 🎉\n\n\
         📅 안내 시간: {time}\n"
    );
    if !analysis.summary.trim().is_empty() {
        msg.push('\n');
        msg.push_str(analysis.summary.trim());
        msg.push('\n');
    }
    if !raw.trim().is_empty() {
        msg.push_str("\n📝 원본 정보:\n");
        msg.push_str(&excerpt(raw.trim(), RAW_EXCERPT_CHARS));
        msg.push('\n');
    }
    push_analysis_lines(&mut msg, analysis);
    msg.push_str("\n---\n💡 *많이 찾아주세요!*");
    msg
}

fn push_analysis_lines(msg: &mut String, analysis: &SituationAnalysis) {
    if !analysis.detected_keywords.is_empty() {
        msg.push_str(&format!(
            "\n🔎 감지된 키워드: {}\n",
            analysis.detected_keywords.join(", ")
        ));
    }
    if !analysis.action_required.trim().is_empty() {
        msg.push_str(&format!("🎯 안내: {}\n", analysis.action_required.trim()));
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

/// One-line stage summary stored in `DebugReport::details`.
pub fn stage_details(fetch: bool, detect: bool, summarize: bool, send: bool) -> String {
    format!(
        "수집: {}, 상황 감지: {}, 요약: {}, 전송: {}",
        mark(fetch),
        mark(detect),
        mark(summarize),
        mark(send)
    )
}

pub fn debug_message(report: &DebugReport, time: &str) -> String {
    let errors = if report.error_log.is_empty() {
        "에러 없음".to_string()
    } else {
        report.error_log.join("\n")
    };
    format!(
        "🔍 **디버그 정보** ({gate}) 🔍\n\n\
         ⏰ 시간: {time}\n\n\
         📊 실행 상태:\n\
         - 인스타그램 스크래핑: {fetch}\n\
         - 상황 감지: {detect}\n\
         - 메뉴 요약: {summarize}\n\
         - 슬랙 전송: {send}\n\n\
         🎯 결정: {action} (누적 에러 {count}개)\n\n\
         📝 상세 정보:\n{details}\n\n\
         🐛 에러 로그:\n{errors}",
        gate = report.gate,
        fetch = mark(report.fetch_success),
        detect = mark(report.situation_detected),
        summarize = mark(report.summarize_success),
        send = mark(report.send_success),
        action = report.action,
        count = report.error_count,
        details = report.details,
    )
}
