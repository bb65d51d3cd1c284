//! Rate limit policies and the operations they guard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{LifekitError, Result};

/// Maximum admissions allowed within a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    max_calls: u32,
    window: Duration,
}

impl RatePolicy {
    /// Create a policy, rejecting a zero call count or an empty window.
    pub fn new(max_calls: u32, window: Duration) -> Result<Self> {
        if max_calls == 0 {
            return Err(LifekitError::Config(
                "rate limit max_calls must be at least 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(LifekitError::Config(
                "rate limit window must be longer than zero".to_string(),
            ));
        }
        Ok(Self { max_calls, window })
    }

    /// Shorthand for a policy counted over one minute.
    pub fn per_minute(max_calls: u32) -> Result<Self> {
        Self::new(max_calls, Duration::from_secs(60))
    }

    /// Maximum admissions per window.
    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    /// Length of the trailing window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl fmt::Display for RatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} calls / {:?}", self.max_calls, self.window)
    }
}

/// Operations that pass through the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardedOperation {
    Sentiment,
    Flashcards,
    Recipes,
}

impl GuardedOperation {
    /// All guarded operations.
    pub const ALL: [GuardedOperation; 3] = [
        GuardedOperation::Sentiment,
        GuardedOperation::Flashcards,
        GuardedOperation::Recipes,
    ];

    /// Stable name, used as the key scope.
    pub fn name(&self) -> &'static str {
        match self {
            GuardedOperation::Sentiment => "sentiment",
            GuardedOperation::Flashcards => "flashcards",
            GuardedOperation::Recipes => "recipes",
        }
    }

    /// Built-in policy for this operation.
    pub fn default_policy(&self) -> RatePolicy {
        let max_calls = match self {
            GuardedOperation::Sentiment => 5,
            GuardedOperation::Flashcards => 3,
            GuardedOperation::Recipes => 2,
        };
        RatePolicy {
            max_calls,
            window: Duration::from_secs(60),
        }
    }
}

impl fmt::Display for GuardedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
