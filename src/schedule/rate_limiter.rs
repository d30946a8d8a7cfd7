//! Serializing rate limiter with a minimum spacing between task starts.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Runs tasks one at a time, starting each no sooner than `interval` after the previous start.
///
/// Waiters are served in FIFO order. A task that fails does not disturb the schedule.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter.
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            next_start: Mutex::new(None),
        }
    }

    /// Limiter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimum spacing between starts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `task` once its slot comes up and return its output.
    pub async fn schedule<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // Held for the whole task so tasks never overlap.
        let mut next_start = self.next_start.lock().await;
        if let Some(at) = *next_start {
            if Instant::now() < at {
                trace!(limiter = %self.name, "Waiting for slot");
                sleep_until(at).await;
            }
        }
        *next_start = Some(Instant::now() + self.interval);
        task().await
    }

    /// Wait for the next slot without running anything.
    pub async fn tick(&self) {
        self.schedule(|| async {}).await
    }
}
