//! Per-provider rolling-window rate limiter.
//!
//! Each provider gets a fixed quota of requests per 60-second rolling
//! window.  A request that would exceed the quota is **not sent** — the
//! caller treats the provider as immediately exhausted and moves on to the
//! next one in the fallback chain.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Tracks request timestamps per provider over a rolling window.
///
/// Owned exclusively by the suggestion engine behind a mutex; entries older
/// than the window are dropped on every acquisition attempt.
pub struct RateLimiter {
    quota: u32,
    window: Duration,
    calls: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Standard 60-second window with the given per-provider quota.
    pub fn new(quota: u32) -> Self {
        Self::with_window(quota, Duration::from_secs(60))
    }

    /// Custom window, used by tests.
    pub fn with_window(quota: u32, window: Duration) -> Self {
        Self {
            quota,
            window,
            calls: HashMap::new(),
        }
    }

    /// Try to take one slot for `provider_id`.
    ///
    /// Returns `false` — without recording anything — when the provider has
    /// already used its quota inside the current window.
    pub fn try_acquire(&mut self, provider_id: &str) -> bool {
        let now = Instant::now();
        let entries = self.calls.entry(provider_id.to_string()).or_default();

        while let Some(&front) = entries.front() {
            if now.duration_since(front) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() as u32 >= self.quota {
            return false;
        }
        entries.push_back(now);
        true
    }

    /// Slots still available for `provider_id` in the current window.
    pub fn remaining(&self, provider_id: &str) -> u32 {
        let now = Instant::now();
        let used = self
            .calls
            .get(provider_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.window)
                    .count() as u32
            })
            .unwrap_or(0);
        self.quota.saturating_sub(used)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
