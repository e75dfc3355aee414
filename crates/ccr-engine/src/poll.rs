//! Bounded polling for asynchronous cluster jobs (backup, restore).

use std::future::Future;
use std::time::Duration;

use crate::error::SyncResult;

/// How a bounded poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate accepted this value.
    Finished(T),
    /// The retry budget ran out; carries the last observed value.
    Exhausted(Option<T>),
}

impl<T> PollOutcome<T> {
    pub fn is_finished(&self) -> bool {
        matches!(self, PollOutcome::Finished(_))
    }
}

/// Call `check` until `is_done` accepts its value or `max_retries` checks were made.
///
/// Sleeps `interval` between checks (never after the last one), so an
/// exhausted poll sleeps less than `max_retries * interval` in total. Errors
/// from `check` end the poll immediately.
pub async fn poll_until<T, F, Fut, P>(
    max_retries: u32,
    interval: Duration,
    mut check: F,
    is_done: P,
) -> SyncResult<PollOutcome<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = SyncResult<T>>,
    P: Fn(&T) -> bool,
{
    let mut last = None;

    for attempt in 0..max_retries {
        let value = check(attempt).await?;
        if is_done(&value) {
            return Ok(PollOutcome::Finished(value));
        }
        last = Some(value);

        if attempt + 1 < max_retries {
            tokio::time::sleep(interval).await;
        }
    }

    Ok(PollOutcome::Exhausted(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_exactly_budget_polls() {
        let polls = AtomicU32::new(0);
        let start = Instant::now();

        let outcome = poll_until(
            5,
            Duration::from_secs(3),
            |_| {
                polls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SyncError>("RUNNING") }
            },
            |state| *state == "FINISHED",
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Exhausted(Some("RUNNING")));
        assert_eq!(polls.load(Ordering::SeqCst), 5);
        assert!(start.elapsed() <= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_early() {
        let outcome = poll_until(
            20,
            Duration::from_secs(3),
            |attempt| async move { Ok::<_, SyncError>(attempt) },
            |attempt| *attempt == 2,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Finished(2));
        assert!(outcome.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_stops_polling() {
        let polls = AtomicU32::new(0);

        let result = poll_until(
            5,
            Duration::from_secs(1),
            |_| {
                polls.fetch_add(1, Ordering::SeqCst);
                async { Err::<bool, _>(SyncError::Protocol("boom".into())) }
            },
            |done| *done,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_budget() {
        let outcome = poll_until(
            0,
            Duration::from_secs(1),
            |_| async { Ok::<_, SyncError>(true) },
            |done| *done,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Exhausted(None));
    }
}
