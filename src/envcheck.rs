//! Environment readiness check.
//!
//! `MYSQL_URL` is expected in the plain `mysql://` form that Rust MySQL
//! drivers accept, rather than a `mysql+pymysql://` driver-qualified URL.

use tracing::{info, warn};

use crate::config::EnvSettings;

/// Expected prefix of a `MYSQL_URL` value.
///
/// Deliberately `mysql://`; a `mysql+pymysql://` URL is reported as suspect.
pub const MYSQL_URL_PREFIX: &str = "mysql://";

/// Whether a variable was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarStatus {
    Set,
    Missing,
}

/// One checked variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarCheck {
    pub name: &'static str,
    pub status: VarStatus,
    /// Missing required variables fail the check
    pub required: bool,
}

/// Result of checking the environment.
#[derive(Debug, Clone)]
pub struct EnvReport {
    pub vars: Vec<VarCheck>,
    pub mysql_url: Option<String>,
}

impl EnvReport {
    /// Check `env` for the variables the service reads.
    ///
    /// Only the chat API key is required; the sentiment token and the
    /// payment secret have local fallbacks or fail per request.
    pub fn check(env: &EnvSettings) -> Self {
        let var = |name, value: &Option<String>, required| VarCheck {
            name,
            status: if value.is_some() {
                VarStatus::Set
            } else {
                VarStatus::Missing
            },
            required,
        };

        Self {
            vars: vec![
                var("HUGGINGFACE_TOKEN", &env.huggingface_token, false),
                var("OPENAI_API_KEY", &env.openai_api_key, true),
                var("PAYSTACK_SECRET_KEY", &env.paystack_secret_key, false),
            ],
            mysql_url: env.mysql_url.clone(),
        }
    }

    /// True when no required variable is missing.
    pub fn passed(&self) -> bool {
        self.vars
            .iter()
            .all(|v| !v.required || v.status == VarStatus::Set)
    }

    /// Whether `MYSQL_URL` is set but malformed.
    pub fn mysql_url_suspect(&self) -> bool {
        self.mysql_url
            .as_deref()
            .map(|url| !url.starts_with(MYSQL_URL_PREFIX))
            .unwrap_or(false)
    }

    /// Process exit code: 0 on pass, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    /// Log every finding.
    pub fn log(&self) {
        for var in &self.vars {
            match var.status {
                VarStatus::Set => info!("[OK] {} set", var.name),
                VarStatus::Missing => warn!("[MISSING] {}", var.name),
            }
        }

        info!(
            "[VAL] MYSQL_URL = {}",
            self.mysql_url.as_deref().unwrap_or("(using in-memory fallback)")
        );
        if self.mysql_url_suspect() {
            warn!("[WARN] MYSQL_URL should start with {}", MYSQL_URL_PREFIX);
        }

        info!("Result: {}", if self.passed() { "PASS" } else { "NEEDS FIX" });
    }
}
