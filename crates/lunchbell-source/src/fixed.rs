use futures::future::BoxFuture;
use tracing::debug;

use lunchbell_core::error::Result;
use lunchbell_core::traits::ContentSource;

/// A regular daily menu post.
pub const NORMAL_MENU_POST: &str = "🍽️ 구도 한식뷔페 오늘의 메뉴

🥩 주요리
- 갈비찜
- 불고기
- 생선구이

🥬 밑반찬
- 김치
- 콩나물무침
- 시금치나물

🍲 국물류
- 된장찌개
- 김치찌개

🍰 후식
- 과일
- 식혜";

/// A closed-today announcement.
pub const HOLIDAY_POST: &str = "오늘은 정기 휴무일입니다.
매주 월요일은 휴무입니다.

다음 영업일은 화요일입니다.
맛있는 한식으로 다시 찾아뵙겠습니다.

감사합니다! 🍽️";

/// A one-day special event menu.
pub const SPECIAL_MENU_POST: &str = "🎊 오늘의 특별 이벤트 메뉴 🎊

한정 특별 메뉴: 갈비찜 + 불고기 콤보
이벤트 기간: 오늘 하루만
특별 가격: 15,000원 (기존 18,000원)

🥩 특별 메뉴 구성:
- 프리미엄 갈비찜
- 불고기
- 각종 밑반찬
- 된장찌개
- 후식 (과일 + 식혜)

🎁 추가 혜택:
- 음료 무료 제공
- 디저트 추가 서비스

많이 찾아주세요! 😋";

/// Returns the same text for every locator. Backs the offline test commands.
#[derive(Debug, Clone)]
pub struct FixedSource {
    text: String,
}

impl FixedSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn normal_menu() -> Self {
        Self::new(NORMAL_MENU_POST)
    }

    pub fn holiday() -> Self {
        Self::new(HOLIDAY_POST)
    }

    pub fn special_menu() -> Self {
        Self::new(SPECIAL_MENU_POST)
    }
}

impl ContentSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            debug!(url = %locator, "Serving fixed post instead of fetching");
            Ok(self.text.clone())
        })
    }
}
