pub mod console;
pub mod slack;
pub mod util;

pub use console::ConsoleSink;
pub use slack::SlackClient;
