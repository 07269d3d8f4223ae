use std::sync::Arc;

use lunchbell_core::config::ModelConfig;
use lunchbell_core::types::{Action, RunConfig, SharedContext, SituationKind};
use lunchbell_flow::builder::utc_offset;
use lunchbell_flow::{
    holiday_test_flow, menu_notification_flow, simple_menu_flow, Collaborators,
};
use lunchbell_test_utils::{FixedClock, RecordingSink, ScriptedLlm, ScriptedSource};

const MENU_POST: &str = "🍽️ 구도 한식뷔페 오늘의 메뉴\n🥩 주요리\n- 갈비찜\n- 불고기\n🍲 국물류\n- 된장찌개";
const HOLIDAY_POST: &str = "오늘은 정기 휴무일입니다.\n다음 영업일은 화요일입니다.";
const SUMMARY: &str = "🍽️ **오늘의 메뉴**\n\n**🥩 주요리**\n- 갈비찜\n- 불고기";

fn classification(kind: &str) -> String {
    format!(
        r#"{{"situation_type": "{kind}", "confidence": 0.9, "detected_keywords": [], "summary": "", "action_required": ""}}"#
    )
}

struct Harness {
    source: ScriptedSource,
    llm: ScriptedLlm,
    sink: RecordingSink,
}

impl Harness {
    fn new(source: ScriptedSource, llm: ScriptedLlm) -> Self {
        Self {
            source,
            llm,
            sink: RecordingSink::new(),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            source: Arc::new(self.source.clone()),
            llm: Arc::new(self.llm.clone()),
            model: ModelConfig::default(),
            sink: Arc::new(self.sink.clone()),
            clock: Arc::new(FixedClock::default()),
            utc_offset: utc_offset(9).unwrap(),
            debug_channel: "#lunch-menu-debug".into(),
            error_threshold: 3,
        }
    }
}

fn context(debug_mode: bool) -> SharedContext {
    SharedContext::new(RunConfig {
        source_url: "https://www.instagram.com/sunaedong_buffet/".into(),
        channel: "#lunch-menu".into(),
        debug_mode,
    })
}

#[tokio::test(start_paused = true)]
async fn test_short_content_retries_then_abandons_with_error_notice() {
    let h = Harness::new(ScriptedSource::always("짧은 글"), ScriptedLlm::always(SUMMARY));
    let mut flow = menu_notification_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(
        report.actions_of("debug_fetch"),
        vec![Action::Retry, Action::Retry, Action::Fail]
    );
    // Three invocations of three attempts each.
    assert_eq!(h.source.calls(), 9);
    assert_eq!(h.llm.calls(), 0);
    assert_eq!(ctx.status.error_log.total(), 3);
    assert!(!ctx.status.fetch_success);
    assert!(!ctx.status.final_success);

    let sent = h.sink.messages_to("#lunch-menu");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("메뉴 알림 시스템 오류"));
    assert!(sent[0].text.contains("메뉴 수집 실패"));
    assert_eq!(report.last().unwrap().node, "debug_send");
}

#[tokio::test(start_paused = true)]
async fn test_all_stages_succeed_first_time() {
    let llm = ScriptedLlm::new(vec![Ok(classification("normal")), Ok(SUMMARY.to_string())]);
    let h = Harness::new(ScriptedSource::always(MENU_POST), llm);
    let mut flow = menu_notification_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(
        report.path(),
        vec![
            "fetch_menu",
            "debug_fetch",
            "situation_detector",
            "debug_situation",
            "summarize_menu",
            "debug_summarize",
            "send_slack",
            "debug_send",
        ]
    );
    assert!(report.steps.iter().all(|s| s.attempts == 1 && !s.degraded));
    assert_eq!(report.actions_of("debug_fetch"), vec![Action::Success]);
    assert_eq!(report.actions_of("debug_send"), vec![Action::Success]);
    assert!(ctx.status.final_success);
    assert_eq!(ctx.status.error_log.total(), 0);

    let sent = h.sink.messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("갈비찜"));
}

#[tokio::test(start_paused = true)]
async fn test_holiday_post_sends_holiday_notice_only() {
    let llm = ScriptedLlm::always(&classification("holiday"));
    let h = Harness::new(ScriptedSource::always(HOLIDAY_POST), llm);
    let mut flow = menu_notification_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(report.actions_of("debug_situation"), vec![Action::HolidayNotice]);
    assert_eq!(report.last().unwrap().node, "holiday_notice");
    assert_eq!(report.visits("summarize_menu"), 0);
    assert!(ctx.status.holiday_notice_sent);
    assert!(ctx.status.final_success);
    assert_eq!(
        ctx.data.situation.as_ref().unwrap().situation_type,
        SituationKind::Holiday
    );
    let sent = h.sink.messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("휴무 안내"));
}

#[tokio::test(start_paused = true)]
async fn test_error_classification_routes_straight_to_error_notice() {
    let llm = ScriptedLlm::always(&classification("error"));
    let h = Harness::new(ScriptedSource::always(MENU_POST), llm);
    let mut flow = menu_notification_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(report.actions_of("debug_situation"), vec![Action::ErrorNotice]);
    assert_eq!(
        report.path(),
        vec![
            "fetch_menu",
            "debug_fetch",
            "situation_detector",
            "debug_situation",
            "send_slack",
            "debug_send",
        ]
    );
    assert_eq!(h.llm.calls(), 1);
    assert_eq!(ctx.status.error_log.total(), 0);
    assert!(ctx.status.situation_detected);
    assert!(ctx.status.send_success);
    assert!(!ctx.status.final_success);

    let sent = h.sink.messages_to("#lunch-menu");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("메뉴 알림 시스템 오류"));
    assert!(sent[0].text.contains("된장찌개"));
}

#[tokio::test(start_paused = true)]
async fn test_failing_summarizer_abandons_to_raw_quote() {
    let llm = ScriptedLlm::new(vec![Ok(classification("normal")), Err("model down".into())]);
    let h = Harness::new(ScriptedSource::always(MENU_POST), llm);
    let mut flow = menu_notification_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(
        report.actions_of("debug_summarize"),
        vec![Action::Retry, Action::Retry, Action::Fail]
    );
    // One classification plus three summaries of two attempts each.
    assert_eq!(h.llm.calls(), 7);
    assert!(!ctx.status.summarize_success);
    assert!(ctx.status.send_success);
    assert!(!ctx.status.final_success);

    let sent = h.sink.messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("자동 요약 실패"));
    assert!(sent[0].text.contains("된장찌개"));
}

#[tokio::test(start_paused = true)]
async fn test_abandoning_gate_never_retries_again() {
    let h = Harness::new(ScriptedSource::always("짧은 글"), ScriptedLlm::always(SUMMARY));
    let sink = RecordingSink::with_acceptance(Vec::new(), false);
    let collaborators = Collaborators {
        sink: Arc::new(sink.clone()),
        ..h.collaborators()
    };
    let mut flow = menu_notification_flow(&collaborators).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    // Errors are already at the threshold when the send gate first looks.
    assert_eq!(report.actions_of("debug_send"), vec![Action::Fail]);
    assert_eq!(ctx.status.error_log.total(), 4);
    assert!(!ctx.status.send_success);
    // Two attempts at the single error notice.
    assert_eq!(sink.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rerunning_a_flow_with_fresh_context_leaks_nothing() {
    let mut replies: Vec<Result<String, String>> = vec![Err("timeout".into()); 9];
    replies.push(Ok(MENU_POST.to_string()));
    let llm = ScriptedLlm::new(vec![Ok(classification("normal")), Ok(SUMMARY.to_string())]);
    let h = Harness::new(ScriptedSource::new(replies), llm);
    let mut flow = menu_notification_flow(&h.collaborators()).unwrap();

    let mut first = context(false);
    flow.run(&mut first).await.unwrap();
    assert!(!first.status.final_success);
    assert_eq!(first.status.error_log.total(), 3);

    let mut second = context(false);
    let report = flow.run(&mut second).await.unwrap();

    assert!(second.status.final_success);
    assert_eq!(second.status.error_log.total(), 0);
    assert_eq!(report.steps[0].attempts, 1);
    assert_eq!(report.visits("fetch_menu"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_debug_mode_reports_every_gate_visit() {
    let llm = ScriptedLlm::new(vec![Ok(classification("normal")), Ok(SUMMARY.to_string())]);
    let h = Harness::new(ScriptedSource::always(MENU_POST), llm);
    let mut flow = menu_notification_flow(&h.collaborators()).unwrap();
    let mut ctx = context(true);

    flow.run(&mut ctx).await.unwrap();

    assert_eq!(h.sink.messages_to("#lunch-menu-debug").len(), 4);
    assert_eq!(h.sink.messages_to("#lunch-menu").len(), 1);
    let last = ctx.status.debug_info.unwrap();
    assert_eq!(last.gate, "debug_send");
    assert_eq!(last.action, Action::Success);
}

#[tokio::test(start_paused = true)]
async fn test_simple_flow_routes_special_post() {
    let llm = ScriptedLlm::always(&classification("special_menu"));
    let h = Harness::new(ScriptedSource::always(MENU_POST), llm);
    let mut flow = simple_menu_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(report.path(), vec!["fetch_menu", "situation_detector", "special_menu"]);
    assert!(ctx.status.special_menu_sent);
}

#[tokio::test(start_paused = true)]
async fn test_holiday_test_flow_treats_normal_as_holiday() {
    let llm = ScriptedLlm::always(&classification("normal"));
    let h = Harness::new(ScriptedSource::always(MENU_POST), llm);
    let mut flow = holiday_test_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(report.last().unwrap().node, "holiday_notice");
    assert!(ctx.status.holiday_notice_sent);
}

#[tokio::test(start_paused = true)]
async fn test_unrouted_classification_ends_test_flow() {
    let llm = ScriptedLlm::always(&classification("special_menu"));
    let h = Harness::new(ScriptedSource::always(MENU_POST), llm);
    let mut flow = holiday_test_flow(&h.collaborators()).unwrap();
    let mut ctx = context(false);

    let report = flow.run(&mut ctx).await.unwrap();

    assert_eq!(report.path(), vec!["fetch_menu", "situation_detector"]);
    assert!(h.sink.messages().is_empty());
    assert!(!ctx.status.final_success);
}
