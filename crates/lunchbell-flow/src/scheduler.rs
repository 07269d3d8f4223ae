use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::info;

use lunchbell_core::config::ScheduleConfig;
use lunchbell_core::error::{LunchbellError, Result};

use crate::builder::utc_offset;

/// Fires a job on a cron schedule evaluated at a fixed UTC offset.
///
/// Jobs run inline, so a slow run delays the next trigger instead of
/// overlapping it.
pub struct DailyScheduler {
    schedule: Schedule,
    expression: String,
    offset: FixedOffset,
    cancel: CancellationToken,
}

impl DailyScheduler {
    pub fn new(config: &ScheduleConfig, cancel: CancellationToken) -> Result<Self> {
        let schedule = Schedule::from_str(&config.cron).map_err(|e| {
            LunchbellError::Config(format!("invalid cron expression '{}': {e}", config.cron))
        })?;
        Ok(Self {
            schedule,
            expression: config.cron.clone(),
            offset: utc_offset(config.utc_offset_hours)?,
            cancel,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next trigger from now, in the scheduler's offset.
    pub fn next_run_time(&self) -> Option<DateTime<FixedOffset>> {
        self.schedule.upcoming(self.offset).next()
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        self.schedule
            .after(&after.with_timezone(&self.offset))
            .next()
    }

    /// Run the scheduler loop. Blocks until cancelled.
    pub async fn run<F, Fut>(&self, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        info!(cron = %self.expression, "Menu scheduler started");

        loop {
            let Some(fire_at) = self.next_run_time() else {
                info!("Schedule has no upcoming runs, waiting for shutdown");
                self.cancel.cancelled().await;
                break;
            };

            let now = Utc::now().with_timezone(&self.offset);
            let delay = (fire_at - now).to_std().unwrap_or(Duration::from_secs(1));

            info!(
                fire_at = %fire_at.format("%Y-%m-%d %H:%M:%S %:z"),
                delay_secs = delay.as_secs(),
                "Next menu run scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    info!("Firing scheduled menu run");
                    job().await;
                }
                _ = self.cancel.cancelled() => {
                    info!("Menu scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn config(cron: &str) -> ScheduleConfig {
        ScheduleConfig {
            cron: cron.to_string(),
            utc_offset_hours: 9,
        }
    }

    #[test]
    fn test_next_run_is_eleven_local() {
        let s = DailyScheduler::new(&config("0 0 11 * * *"), CancellationToken::new()).unwrap();
        // 01:30 UTC is 10:30 KST, so the next run is 11:00 KST the same day.
        let after = Utc.with_ymd_and_hms(2024, 3, 4, 1, 30, 0).unwrap();
        let next = s.next_after(after).unwrap();
        assert_eq!(next.hour(), 11);
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_past_trigger_moves_to_next_day() {
        let s = DailyScheduler::new(&config("0 0 11 * * *"), CancellationToken::new()).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 4, 3, 0, 0).unwrap();
        let next = s.next_after(after).unwrap();
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_cron_rejected() {
        let err = DailyScheduler::new(&config("every day at noon"), CancellationToken::new())
            .err()
            .unwrap();
        assert!(matches!(err, LunchbellError::Config(_)));
    }

    #[tokio::test]
    async fn test_cancelled_scheduler_returns_without_running_job() {
        let cancel = CancellationToken::new();
        let s = DailyScheduler::new(&config("0 0 11 * * *"), cancel.clone()).unwrap();
        cancel.cancel();

        let mut fired = 0;
        s.run(|| {
            fired += 1;
            async {}
        })
        .await;
        assert_eq!(fired, 0);
    }
}
