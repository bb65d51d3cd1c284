//! Rate limit rules configuration.
//!
//! Rules override the built-in policy of each guarded operation. Either the
//! Envoy-style `requests_per_unit`/`unit` pair or an explicit
//! `max_calls`/`window_secs` pair is accepted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::key::ClientKey;
use super::policy::{GuardedOperation, RatePolicy};
use crate::error::{LifekitError, Result};

/// How admission records are partitioned between operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionScope {
    /// Each operation counts a client's calls separately
    #[default]
    PerOperation,
    /// All operations count against one record per client
    Shared,
}

/// Time unit for rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of this time unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

/// A rate limit rule for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateLimitRule {
    /// Number of requests allowed per unit of time
    PerUnit {
        requests_per_unit: u32,
        unit: TimeUnit,
    },
    /// Number of requests allowed per window of seconds
    Window { max_calls: u32, window_secs: u64 },
}

impl RateLimitRule {
    /// Validate the rule and turn it into a policy.
    pub fn to_policy(&self) -> Result<RatePolicy> {
        match *self {
            RateLimitRule::PerUnit {
                requests_per_unit,
                unit,
            } => RatePolicy::new(requests_per_unit, unit.duration()),
            RateLimitRule::Window {
                max_calls,
                window_secs,
            } => RatePolicy::new(max_calls, Duration::from_secs(window_secs)),
        }
    }
}

/// Rate limit configuration as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Admission record partitioning
    #[serde(default)]
    pub scope: AdmissionScope,
    /// Per-operation overrides
    #[serde(default)]
    pub operations: HashMap<GuardedOperation, RateLimitRule>,
}

impl RateLimitConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LifekitError::Config(format!("Failed to parse rate limit config: {}", e)))
    }

    /// Resolve the effective policies, validating every override.
    pub fn policies(&self) -> Result<RatePolicies> {
        let mut policies = RatePolicies::default();
        policies.scope = self.scope;

        for (op, rule) in &self.operations {
            let policy = rule.to_policy().map_err(|e| match e {
                LifekitError::Config(msg) => LifekitError::Config(format!("{}: {}", op, msg)),
                other => other,
            })?;
            policies.set(*op, policy);
        }

        Ok(policies)
    }
}

/// Validated policies for every guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicies {
    pub scope: AdmissionScope,
    sentiment: RatePolicy,
    flashcards: RatePolicy,
    recipes: RatePolicy,
}

impl Default for RatePolicies {
    fn default() -> Self {
        Self {
            scope: AdmissionScope::default(),
            sentiment: GuardedOperation::Sentiment.default_policy(),
            flashcards: GuardedOperation::Flashcards.default_policy(),
            recipes: GuardedOperation::Recipes.default_policy(),
        }
    }
}

impl RatePolicies {
    /// Policy guarding `op`.
    pub fn policy(&self, op: GuardedOperation) -> RatePolicy {
        match op {
            GuardedOperation::Sentiment => self.sentiment,
            GuardedOperation::Flashcards => self.flashcards,
            GuardedOperation::Recipes => self.recipes,
        }
    }

    /// Replace the policy guarding `op`.
    pub fn set(&mut self, op: GuardedOperation, policy: RatePolicy) {
        match op {
            GuardedOperation::Sentiment => self.sentiment = policy,
            GuardedOperation::Flashcards => self.flashcards = policy,
            GuardedOperation::Recipes => self.recipes = policy,
        }
    }

    /// How long admissions recorded for `op` must be kept.
    ///
    /// Under shared scope every operation writes to one record, so it has to
    /// outlive the longest window of any operation.
    pub fn retention(&self, op: GuardedOperation) -> Duration {
        match self.scope {
            AdmissionScope::PerOperation => self.policy(op).window(),
            AdmissionScope::Shared => GuardedOperation::ALL
                .iter()
                .map(|&other| self.policy(other).window())
                .max()
                .unwrap_or_else(|| self.policy(op).window()),
        }
    }

    /// Key under which `client`'s calls to `op` are counted.
    pub fn key_for(&self, op: GuardedOperation, client: ClientKey) -> ClientKey {
        match self.scope {
            AdmissionScope::PerOperation => ClientKey::scoped(op.name(), client.client),
            AdmissionScope::Shared => ClientKey::new(client.client),
        }
    }
}
