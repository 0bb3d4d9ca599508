//! Global request rate limiter
//!
//! One limiter is shared by every worker of every category in a run, so the
//! whole run stays inside a single external request budget.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum interval between the starts of consecutive fetches
///
/// `acquire` is a critical section: the waiter holding the lock sleeps until
/// its slot opens, stamps the grant time and releases the lock. The fetch
/// that follows runs outside the lock. Waiters are served in the order the
/// mutex hands out the lock.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_granted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_minute` grants per minute
    ///
    /// A rate of zero disables limiting.
    pub fn new(requests_per_minute: u32) -> Self {
        let min_interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / f64::from(requests_per_minute))
        };

        Self::with_interval(min_interval)
    }

    /// Creates a limiter with an explicit minimum interval
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_granted: Mutex::new(None),
        }
    }

    /// Returns the minimum interval between grants
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next request slot opens and claims it
    ///
    /// Never fails; the only effect is delay. Returns the grant time.
    pub async fn acquire(&self) -> Instant {
        let mut last = self.last_granted.lock().await;

        if let Some(previous) = *last {
            let next_slot = previous + self.min_interval;
            if next_slot > Instant::now() {
                tracing::trace!(
                    "Rate limiter waiting {:?}",
                    next_slot.saturating_duration_since(Instant::now())
                );
                sleep_until(next_slot).await;
            }
        }

        let granted = Instant::now();
        *last = Some(granted);
        granted
    }
}
