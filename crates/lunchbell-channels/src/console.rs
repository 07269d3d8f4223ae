use futures::future::BoxFuture;
use tracing::info;

use lunchbell_core::traits::DeliverySink;

/// Prints messages to stdout instead of posting them. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn render(message: &str, destination: &str) -> String {
        format!("──── {destination} ────\n{message}\n")
    }
}

impl DeliverySink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn deliver<'a>(&'a self, message: &'a str, destination: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            info!(channel = %destination, chars = message.chars().count(), "Dry run, printing message");
            println!("{}", Self::render(message, destination));
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_names_destination() {
        let out = ConsoleSink::render("오늘의 메뉴", "#lunch-menu");
        assert!(out.starts_with("──── #lunch-menu ────"));
        assert!(out.contains("오늘의 메뉴"));
    }

    #[tokio::test]
    async fn console_always_accepts() {
        assert!(ConsoleSink.deliver("hi", "#test").await);
    }
}
