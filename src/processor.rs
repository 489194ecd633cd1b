//! Per-context processing
//!
//! Each context moves through a small state machine once per run:
//!
//! ```text
//! Unprocessed ──(ran today)──────────────────────▶ AlreadyDoneToday
//!      │
//!      └──(mark_run)──▶ fetch calendar ──▶ dispatch ──▶ Processed
//! ```
//!
//! The dedup marker is written before the calendar is fetched and is kept
//! even when the fetch or the dispatch fails: a context gets one attempt per
//! day.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::abstractions::{CalendarError, CalendarSource, NotifyBody, NotifyError, Notifier};
use crate::calendar::CalendarMap;
use crate::clock::{format_date, schedule_date, tomorrow_day, Clock};
use crate::context::Context;
use crate::error::ErrorReport;

/// What happened to one context in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The marker already matched today; nothing was done
    AlreadyDoneToday,
    /// The day's run was consumed
    Processed(Dispatch),
}

impl ProcessOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ProcessOutcome::Processed(Dispatch::Failed(_)))
    }

    pub fn was_sent(&self) -> bool {
        matches!(self, ProcessOutcome::Processed(Dispatch::Sent { .. }))
    }
}

/// Result of the lookup and dispatch steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Sent { message_len: usize },
    /// Calendar had nothing (or only blanks) for tomorrow
    NoMessage { day: u32 },
    Failed(ErrorReport),
}

#[derive(Error, Debug)]
enum DispatchError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl DispatchError {
    fn report(&self) -> ErrorReport {
        match self {
            DispatchError::Calendar(e) => e.report(),
            DispatchError::Notify(e) => e.report(),
        }
    }
}

/// Runs the dedup, lookup and dispatch steps for single contexts
pub struct ContextProcessor {
    calendar: Arc<dyn CalendarSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ContextProcessor {
    pub fn new(
        calendar: Arc<dyn CalendarSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            calendar,
            notifier,
            clock,
        }
    }

    /// Process `context` and return its next state alongside the outcome.
    ///
    /// Never fails: calendar and notification errors are logged and folded
    /// into [`Dispatch::Failed`].
    pub async fn process(&self, context: &Context) -> (Context, ProcessOutcome) {
        let today = schedule_date(self.clock.now());

        if context.ran_on(today) {
            info!(today = %format_date(today), "Context already processed today");
            return (context.clone(), ProcessOutcome::AlreadyDoneToday);
        }

        // The marker follows the clock, even when that moves it backward
        if context.last_run_day().is_some_and(|last| last > today) {
            debug!(
                stored = context.last_run_date.as_deref(),
                today = %format_date(today),
                "Run marker is ahead of the clock"
            );
        }

        let marked = context.mark_run(today);
        let day = tomorrow_day(today);

        let dispatch = match self.dispatch(&marked, day).await {
            Ok(dispatch) => dispatch,
            Err(e) => {
                let report = e.report();
                report.log("Context processing failed");
                Dispatch::Failed(report)
            }
        };

        (marked, ProcessOutcome::Processed(dispatch))
    }

    async fn dispatch(&self, context: &Context, day: u32) -> Result<Dispatch, DispatchError> {
        let rows = self.calendar.load(&context.csv_url).await?;
        let calendar = CalendarMap::from_rows(&rows);
        debug!(rows = rows.len(), days = calendar.len(), "Loaded calendar");

        let Some(message) = calendar.message_for(day) else {
            debug!(day, "No message scheduled for tomorrow");
            return Ok(Dispatch::NoMessage { day });
        };

        self.notifier
            .send(&context.token, &NotifyBody::new(message))
            .await?;

        let message_len = message.chars().count();
        info!(day, message_len, "Notification sent");
        Ok(Dispatch::Sent { message_len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::{MockCalendarSource, MockNotifier};
    use crate::calendar::CalendarRow;
    use crate::clock::FixedClock;
    use crate::logging::testing::CapturedLogs;
    use chrono::{TimeZone, Utc};

    const URL: &str = "https://example.com/calendar.csv";

    struct Harness {
        calendar: Arc<MockCalendarSource>,
        notifier: Arc<MockNotifier>,
        processor: ContextProcessor,
    }

    /// 2026-10-05 at +08:00, so tomorrow is the 6th
    fn harness() -> Harness {
        let now = Utc.with_ymd_and_hms(2026, 10, 5, 1, 0, 0).unwrap();
        let calendar = Arc::new(MockCalendarSource::new());
        let notifier = Arc::new(MockNotifier::new());
        let processor = ContextProcessor::new(
            calendar.clone(),
            notifier.clone(),
            Arc::new(FixedClock(now)),
        );
        Harness {
            calendar,
            notifier,
            processor,
        }
    }

    #[tokio::test]
    async fn test_sends_tomorrows_message() {
        let h = harness();
        h.calendar
            .add_calendar(URL, vec![CalendarRow::new(5, "x"), CalendarRow::new(6, "y")])
            .await;

        let (next, outcome) = h.processor.process(&Context::new(URL, "tok")).await;

        assert_eq!(outcome, ProcessOutcome::Processed(Dispatch::Sent { message_len: 1 }));
        assert_eq!(next.last_run_date.as_deref(), Some("2026-10-05"));
        assert_eq!(
            h.notifier.get_sent().await,
            vec![("tok".to_string(), "y".to_string())]
        );
    }

    #[tokio::test]
    async fn test_second_run_same_day_is_noop() {
        let h = harness();
        h.calendar.add_calendar(URL, vec![CalendarRow::new(6, "y")]).await;

        let (first, _) = h.processor.process(&Context::new(URL, "tok")).await;
        let (second, outcome) = h.processor.process(&first).await;

        assert_eq!(outcome, ProcessOutcome::AlreadyDoneToday);
        assert_eq!(second, first);
        assert_eq!(h.notifier.get_sent().await.len(), 1);
        assert_eq!(h.calendar.get_requested().await.len(), 1);
    }

    #[tokio::test]
    async fn test_uses_last_row_for_duplicate_days() {
        let h = harness();
        h.calendar
            .add_calendar(URL, vec![CalendarRow::new(6, "old"), CalendarRow::new(6, "new")])
            .await;

        h.processor.process(&Context::new(URL, "tok")).await;

        assert_eq!(
            h.notifier.get_sent().await,
            vec![("tok".to_string(), "new".to_string())]
        );
    }

    #[tokio::test]
    async fn test_blank_or_missing_message_is_not_sent() {
        let logs = CapturedLogs::start();
        let h = harness();
        h.calendar
            .add_calendar(URL, vec![CalendarRow::new(6, "   ")])
            .await;
        h.calendar
            .add_calendar("other", vec![CalendarRow::new(7, "later")])
            .await;

        let (_, blank) = h.processor.process(&Context::new(URL, "tok")).await;
        let (_, missing) = h.processor.process(&Context::new("other", "tok")).await;

        assert_eq!(blank, ProcessOutcome::Processed(Dispatch::NoMessage { day: 6 }));
        assert_eq!(missing, ProcessOutcome::Processed(Dispatch::NoMessage { day: 6 }));
        assert_eq!(h.notifier.get_attempts().await, 0);
        assert!(logs.lines().iter().all(|l| l["severity"] != "ERROR"));
    }

    #[tokio::test]
    async fn test_marker_ahead_of_clock_is_replaced_with_today() {
        let logs = CapturedLogs::start();
        let h = harness();
        h.calendar.add_calendar(URL, vec![CalendarRow::new(6, "y")]).await;

        let ahead = Context::new(URL, "tok").with_last_run_date("2026-12-31");
        let (next, outcome) = h.processor.process(&ahead).await;

        assert!(outcome.was_sent());
        assert_eq!(next.last_run_date.as_deref(), Some("2026-10-05"));
        let lines = logs.lines();
        assert!(lines.iter().any(|l| {
            l["message"] == "Run marker is ahead of the clock" && l["stored"] == "2026-12-31"
        }));
    }

    #[tokio::test]
    async fn test_calendar_failure_still_consumes_the_day() {
        let h = harness();
        h.calendar.add_failure(URL, 503).await;

        let stale = Context::new(URL, "tok").with_last_run_date("2026-10-01");
        let (next, outcome) = h.processor.process(&stale).await;

        assert!(outcome.is_failure());
        match outcome {
            ProcessOutcome::Processed(Dispatch::Failed(report)) => {
                assert_eq!(report.kind, "CalendarFetchError");
                assert_eq!(report.status, Some(503));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(next.last_run_date.as_deref(), Some("2026-10-05"));
        assert_eq!(h.notifier.get_attempts().await, 0);
    }

    #[tokio::test]
    async fn test_missing_token_is_reported_not_raised() {
        let h = harness();
        h.calendar.add_calendar(URL, vec![CalendarRow::new(6, "y")]).await;

        let (next, outcome) = h.processor.process(&Context::new(URL, "")).await;

        match outcome {
            ProcessOutcome::Processed(Dispatch::Failed(report)) => {
                assert_eq!(report.kind, "ValidationError");
                assert_eq!(report.message, "token is required");
                assert_eq!(report.status, Some(500));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(next.last_run_date.as_deref(), Some("2026-10-05"));
        assert_eq!(h.notifier.get_attempts().await, 0);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_marker() {
        let h = harness();
        h.calendar.add_calendar(URL, vec![CalendarRow::new(6, "y")]).await;
        h.notifier
            .add_failure(NotifyError::Transport {
                message: "Invalid access token".to_string(),
                status: 401,
            })
            .await;

        let (next, outcome) = h.processor.process(&Context::new(URL, "bad")).await;

        assert!(outcome.is_failure());
        assert!(!outcome.was_sent());
        assert_eq!(next.last_run_date.as_deref(), Some("2026-10-05"));
    }

    #[tokio::test]
    async fn test_message_length_counts_characters() {
        let h = harness();
        h.calendar
            .add_calendar(URL, vec![CalendarRow::new(6, "記得繳費")])
            .await;

        let (_, outcome) = h.processor.process(&Context::new(URL, "tok")).await;
        assert_eq!(outcome, ProcessOutcome::Processed(Dispatch::Sent { message_len: 4 }));
    }
}
