//! Rate limiting for CRM API calls.
//!
//! Zoho CRM allows roughly 10 requests per 10 seconds per endpoint;
//! every code path that touches the API goes through one shared
//! limiter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Extra sleep after a computed wait, to absorb clock jitter.
const WAIT_BUFFER: Duration = Duration::from_millis(100);

/// Sliding-window rate limiter.
///
/// Keeps the timestamps of past calls; a call is admitted when fewer
/// than `max_calls` timestamps remain inside the window. The whole
/// purge-decide-record sequence runs under one lock, so concurrent
/// callers cannot double-count.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    time_window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_calls` per `time_window`.
    #[must_use]
    pub fn new(max_calls: usize, time_window: Duration) -> Self {
        Self {
            max_calls,
            time_window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Limiter matching the published Zoho CRM budget.
    #[must_use]
    pub fn zoho_default() -> Self {
        Self::new(10, Duration::from_secs(10))
    }

    /// Try to admit a call without blocking.
    ///
    /// Returns `None` when the call was admitted and recorded, or the
    /// time until the oldest recorded call leaves the window.
    pub async fn acquire(&self) -> Option<Duration> {
        let mut calls = self.calls.lock().await;
        let now = Instant::now();

        while let Some(oldest) = calls.front() {
            if now.duration_since(*oldest) > self.time_window {
                calls.pop_front();
            } else {
                break;
            }
        }

        if calls.len() >= self.max_calls {
            let wait = calls
                .front()
                .map(|oldest| self.time_window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.time_window);
            return Some(wait);
        }

        calls.push_back(now);
        None
    }

    /// Admit a call, sleeping out the window if the budget is spent.
    pub async fn wait_if_needed(&self) {
        if let Some(wait) = self.acquire().await {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait + WAIT_BUFFER).await;
            // Record the call after the wait.
            let _ = self.acquire().await;
        }
    }

    /// Number of calls currently inside the window.
    pub async fn in_flight(&self) -> usize {
        let calls = self.calls.lock().await;
        let now = Instant::now();
        calls
            .iter()
            .filter(|t| now.duration_since(**t) <= self.time_window)
            .count()
    }
}
