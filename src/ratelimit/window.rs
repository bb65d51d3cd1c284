//! Sliding window of admission timestamps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::policy::RatePolicy;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call was admitted and recorded
    Admit,
    /// The call was refused and not recorded
    Reject {
        /// Time until the call would fit in the window
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the call may proceed.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// Admission timestamps for one client key, oldest first.
///
/// A timestamp counts while its age is strictly below the window, so the
/// counted interval is `(now - window, now]`.
#[derive(Debug, Default, Clone)]
pub struct SlidingWindow {
    admissions: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop admissions that have aged out of `window`.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.admissions.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Prune, then admit and record `now` if the policy still has room.
    pub fn try_admit(&mut self, now: Instant, policy: &RatePolicy) -> Decision {
        self.try_admit_retaining(now, policy, policy.window())
    }

    /// Like [`try_admit`](Self::try_admit), but keeps admissions for at least
    /// `retain` so that longer policies checked against the same record still
    /// see them.
    ///
    /// Only admissions inside `policy`'s window are counted.
    pub fn try_admit_retaining(
        &mut self,
        now: Instant,
        policy: &RatePolicy,
        retain: Duration,
    ) -> Decision {
        self.prune(now, retain.max(policy.window()));

        if self.count_within(now, policy.window()) >= policy.max_calls() as usize {
            return Decision::Reject {
                retry_after: self.retry_after(now, policy),
            };
        }

        self.admissions.push_back(now);
        Decision::Admit
    }

    /// Admissions still inside `window` at `now`, without pruning.
    pub fn count_within(&self, now: Instant, window: Duration) -> usize {
        self.admissions
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < window)
            .count()
    }

    /// Time until enough admissions leave `policy`'s window for one more
    /// call to fit.
    pub fn retry_after(&self, now: Instant, policy: &RatePolicy) -> Duration {
        let window = policy.window();
        let counted = self.count_within(now, window);
        let max = policy.max_calls() as usize;
        if counted < max {
            return Duration::ZERO;
        }

        // Oldest first, so the (counted - max)th counted entry is the one that
        // has to expire.
        self.admissions
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < window)
            .nth(counted - max)
            .map(|&t| window.saturating_sub(now.saturating_duration_since(t)))
            .unwrap_or(Duration::ZERO)
    }

    /// Most recent admission, if any.
    pub fn newest(&self) -> Option<Instant> {
        self.admissions.back().copied()
    }

    /// Number of stored admissions.
    pub fn len(&self) -> usize {
        self.admissions.len()
    }

    /// Whether no admissions are stored.
    pub fn is_empty(&self) -> bool {
        self.admissions.is_empty()
    }
}
