//! Send-rate limiting for the robot webhook.
//!
//! The provider caps each robot at 20 messages per minute; exceeding it
//! blacklists the robot for five minutes. The limiter counts admissions and,
//! on every 20th call, sleeps out the remainder of the minute if it passed
//! too quickly. Checking only every Nth call is a coarse approximation of the
//! provider's real limit, kept intentionally: the provider's exact algorithm
//! is not published, and this cadence matches what it demonstrably tolerates.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Provider cap: messages per window before the robot is blacklisted.
const DINGTALK_THRESHOLD: u32 = 20;

/// Provider window over which the cap applies.
const DINGTALK_WINDOW: Duration = Duration::from_secs(60);

/// Blocks a dispatch flow long enough to stay under a calls-per-window cap.
///
/// Not safe for uncoordinated concurrent mutation; the dispatcher owns one
/// limiter behind a mutex so admissions stay FIFO.
#[derive(Debug)]
pub struct RateLimiter {
    threshold: u32,
    window: Duration,
    calls: u64,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            threshold,
            window,
            calls: 0,
            window_start: Instant::now(),
        }
    }

    /// A limiter tuned to the DingTalk robot cap.
    pub fn dingtalk() -> Self {
        Self::new(DINGTALK_THRESHOLD, DINGTALK_WINDOW)
    }

    /// Admits one call, sleeping first if the window filled too fast.
    ///
    /// Every `threshold`-th admission compares elapsed time against the
    /// window; if the window has not yet elapsed, the caller is suspended for
    /// the remainder. The window start resets after every check, wait or not.
    /// Admission itself never fails.
    pub async fn admit(&mut self) {
        self.calls += 1;
        if self.calls % u64::from(self.threshold) == 0 {
            let elapsed = self.window_start.elapsed();
            if elapsed < self.window {
                let wait = self.window - elapsed;
                debug!(
                    calls = self.calls,
                    wait_secs = wait.as_secs_f64(),
                    "provider rate cap reached, pausing dispatch"
                );
                sleep(wait).await;
            }
            self.window_start = Instant::now();
        }
    }

    /// Total admissions since construction.
    #[cfg(test)]
    pub fn calls(&self) -> u64 {
        self.calls
    }
}
