//! In-memory rate limiting
//!
//! Used to throttle password attempts per client address. Each key keeps the
//! timestamps of its recent attempts; only those inside the trailing window
//! count. State lives in the process and clones share it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the oldest attempt leaves the window, only set when blocked
    pub retry_after_seconds: Option<u64>,
}

/// Per-key trailing-window counter
#[derive(Clone)]
pub struct RateLimiter {
    /// key -> attempt timestamps, oldest first
    attempts: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            limit,
            window,
        }
    }

    /// `limit` attempts per trailing minute
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Check and record an attempt for `key`
    pub async fn check(&self, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let window = self.window;
        let mut attempts = self.attempts.lock().await;

        let recent = attempts.entry(key.to_string()).or_default();
        recent.retain(|at| now.duration_since(*at) < window);

        let count = u32::try_from(recent.len()).unwrap_or(u32::MAX);
        if count >= self.limit {
            let retry_after_seconds = recent.first().map(|oldest| {
                let reset_in = window.saturating_sub(now.duration_since(*oldest));
                // Round up so clients never retry into the same window
                reset_in.as_secs() + u64::from(reset_in.subsec_nanos() > 0)
            });
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after_seconds: retry_after_seconds.or(Some(window.as_secs())),
            };
        }

        recent.push(now);
        RateLimitResult {
            allowed: true,
            remaining: self.limit - count - 1,
            retry_after_seconds: None,
        }
    }

    pub async fn allow(&self, key: &str) -> bool {
        self.check(key).await.allowed
    }

    /// Drop keys with no attempt inside the window. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.window;
        let mut attempts = self.attempts.lock().await;
        let before = attempts.len();
        attempts.retain(|_, recent| {
            recent.retain(|at| now.duration_since(*at) < window);
            !recent.is_empty()
        });
        before - attempts.len()
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.attempts.lock().await.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
