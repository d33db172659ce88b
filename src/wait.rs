use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Smallest interval a poll loop sleeps; a zero interval would never drain the budget
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Result of a bounded poll loop
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

/// Poll-sleep loop with a fixed interval and a decrementing total budget
///
/// The budget is only charged for completed sleeps, so a timeout is reported
/// no earlier than `budget` after the first probe. The cancellation token
/// aborts a pending sleep immediately.
#[derive(Debug, Clone)]
pub struct Poller {
    budget: Duration,
    interval: Duration,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(budget: Duration, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            budget,
            interval: interval.max(MIN_INTERVAL),
            cancel,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `probe` until it yields a value, the budget runs out, or the token fires
    ///
    /// `probe` returns `Ok(None)` for "not yet"; an `Err` ends the loop and is
    /// passed through unchanged.
    pub async fn poll<T, E, F, Fut>(&self, mut probe: F) -> Result<Outcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let mut remaining = self.budget;
        let mut attempt: u32 = 0;

        while remaining > Duration::ZERO {
            if self.cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }

            attempt += 1;
            if let Some(value) = probe().await? {
                return Ok(Outcome::Ready(value));
            }

            debug!(
                attempt,
                remaining_secs = remaining.as_secs_f64(),
                "Condition not met yet, sleeping"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(Outcome::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
            remaining = remaining.saturating_sub(self.interval);
        }

        Ok(Outcome::TimedOut)
    }
}
