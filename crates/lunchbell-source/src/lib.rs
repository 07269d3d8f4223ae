pub mod fixed;
pub mod html;
pub mod instagram;

pub use fixed::{FixedSource, HOLIDAY_POST, NORMAL_MENU_POST, SPECIAL_MENU_POST};
pub use instagram::InstagramSource;
