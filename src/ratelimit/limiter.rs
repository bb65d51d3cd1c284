//! Core rate limiter implementation.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::key::ClientKey;
use super::policy::RatePolicy;
use super::window::{Decision, SlidingWindow};

/// The core rate limiter that tracks admissions per client key.
///
/// This struct is thread-safe and can be shared across multiple tasks. Each
/// key's window is locked for the whole prune-then-append step, so concurrent
/// checks for the same key never over-admit.
pub struct RateLimiter {
    /// Admission history indexed by client key
    records: DashMap<ClientKey, SlidingWindow>,
    /// Source of the current time
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new rate limiter on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Check whether `key` may make another call under `policy`.
    ///
    /// Stale admissions are pruned regardless of the outcome. The call is
    /// recorded only when it is admitted.
    pub fn check_and_record(&self, key: &ClientKey, policy: &RatePolicy) -> Decision {
        self.check_and_record_retaining(key, policy, policy.window())
    }

    /// Check `key` under `policy` while keeping its admissions for at least
    /// `retain`.
    ///
    /// Used when several policies share one record: `retain` must cover the
    /// longest of their windows, or a short-window check would prune
    /// admissions that a long-window policy still counts.
    pub fn check_and_record_retaining(
        &self,
        key: &ClientKey,
        policy: &RatePolicy,
        retain: Duration,
    ) -> Decision {
        let now = self.clock.now();

        trace!(key = %key, policy = %policy, retain = ?retain, "Checking rate limit");

        let decision = {
            let mut window = self.records.entry(key.clone()).or_default();
            window.try_admit_retaining(now, policy, retain)
        };

        if let Decision::Reject { retry_after } = decision {
            debug!(
                key = %key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Admissions currently counted against `key` under `policy`.
    pub fn admitted(&self, key: &ClientKey, policy: &RatePolicy) -> usize {
        let now = self.clock.now();
        self.records
            .get(key)
            .map(|w| w.count_within(now, policy.window()))
            .unwrap_or(0)
    }

    /// Remove keys whose newest admission is at least `idle` old.
    ///
    /// Returns the number of keys removed.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let now = self.clock.now();
        let before = self.records.len();

        self.records.retain(|_, window| {
            window
                .newest()
                .map(|newest| now.saturating_duration_since(newest) < idle)
                .unwrap_or(false)
        });

        let evicted = before.saturating_sub(self.records.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.records.len(), "Evicted idle rate limit keys");
        }
        evicted
    }

    /// Run `evict_idle` every `every` on the tokio runtime.
    pub fn spawn_eviction(self: &Arc<Self>, every: Duration, idle: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        info!(every = ?every, idle = ?idle, "Rate limit key eviction started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.evict_idle(idle);
            }
        })
    }

    /// Clear all admission history.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Get the number of tracked keys.
    pub fn key_count(&self) -> usize {
        self.records.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
