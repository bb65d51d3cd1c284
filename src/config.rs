//! Configuration management for Lifekit.
//!
//! Settings come from an optional YAML file. Credentials and service URLs
//! from the environment (and a `.env` file, if present) are layered on top.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{LifekitError, Result};
use crate::ratelimit::RateLimitConfig;

/// Main configuration for the Lifekit service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifekitConfig {
    /// External service endpoints and credentials
    #[serde(default)]
    pub services: ServicesConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitConfig,

    /// Background upkeep
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

/// Sentiment model host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    #[serde(default = "default_sentiment_url")]
    pub url: String,

    /// Bearer token; the local fallback is used when unset
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_sentiment_timeout")]
    pub timeout_secs: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            url: default_sentiment_url(),
            token: None,
            timeout_secs: default_sentiment_timeout(),
        }
    }
}

fn default_sentiment_url() -> String {
    "https://api-inference.huggingface.co/models/cardiffnlp/twitter-roberta-base-sentiment"
        .to_string()
}

fn default_sentiment_timeout() -> u64 {
    15
}

/// Chat-completion host used for recipe suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_url")]
    pub url: String,

    /// Bearer key; the local fallback is used when unset
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_chat_temperature")]
    pub temperature: f64,

    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: default_chat_url(),
            api_key: None,
            model: default_chat_model(),
            temperature: default_chat_temperature(),
            timeout_secs: default_chat_timeout(),
        }
    }
}

fn default_chat_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_chat_temperature() -> f64 {
    0.4
}

fn default_chat_timeout() -> u64 {
    20
}

/// Payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default = "default_payments_url")]
    pub url: String,

    /// Secret key; payment creation fails when unset
    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default = "default_payments_timeout")]
    pub timeout_secs: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            url: default_payments_url(),
            secret_key: None,
            timeout_secs: default_payments_timeout(),
        }
    }
}

fn default_payments_url() -> String {
    "https://api.paystack.co/transaction/initialize".to_string()
}

fn default_payments_timeout() -> u64 {
    10
}

/// Background upkeep of the rate limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// How often idle rate limit keys are swept, in seconds
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,

    /// Keys with no admission for this long are dropped, in seconds
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            eviction_interval_secs: default_eviction_interval(),
            idle_ttl_secs: default_idle_ttl(),
        }
    }
}

fn default_eviction_interval() -> u64 {
    60
}

fn default_idle_ttl() -> u64 {
    600
}

/// Variables read from the process environment.
///
/// Empty values are treated as unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvSettings {
    pub huggingface_token: Option<String>,
    pub huggingface_model_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_chat_url: Option<String>,
    pub openai_model: Option<String>,
    pub paystack_secret_key: Option<String>,
    pub paystack_initialize_url: Option<String>,
    pub mysql_url: Option<String>,
}

impl EnvSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_source(None)
    }

    /// Read settings from an explicit variable map instead of the process
    /// environment.
    pub fn from_map(vars: config::Map<String, String>) -> Result<Self> {
        Self::from_source(Some(vars))
    }

    fn from_source(source: Option<config::Map<String, String>>) -> Result<Self> {
        let settings: EnvSettings = config::Config::builder()
            .add_source(config::Environment::default().source(source))
            .build()?
            .try_deserialize()?;
        Ok(settings.without_empty())
    }

    fn without_empty(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        Self {
            huggingface_token: keep(self.huggingface_token),
            huggingface_model_url: keep(self.huggingface_model_url),
            openai_api_key: keep(self.openai_api_key),
            openai_chat_url: keep(self.openai_chat_url),
            openai_model: keep(self.openai_model),
            paystack_secret_key: keep(self.paystack_secret_key),
            paystack_initialize_url: keep(self.paystack_initialize_url),
            mysql_url: keep(self.mysql_url),
        }
    }
}

impl LifekitConfig {
    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: LifekitConfig = serde_yaml::from_str(&contents)
            .map_err(|e| LifekitError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load the file (or defaults), then overlay `.env` and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(dotenv_path) = dotenvy::dotenv() {
            info!(path = %dotenv_path.display(), "Loaded .env file");
        }

        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        config.apply_env(&EnvSettings::from_env()?);
        Ok(config)
    }

    /// Overlay environment settings; set variables win over file values.
    pub fn apply_env(&mut self, env: &EnvSettings) {
        let services = &mut self.services;

        if let Some(token) = &env.huggingface_token {
            services.sentiment.token = Some(token.clone());
        }
        if let Some(url) = &env.huggingface_model_url {
            services.sentiment.url = url.clone();
        }
        if let Some(key) = &env.openai_api_key {
            services.chat.api_key = Some(key.clone());
        }
        if let Some(url) = &env.openai_chat_url {
            services.chat.url = url.clone();
        }
        if let Some(model) = &env.openai_model {
            services.chat.model = model.clone();
        }
        if let Some(key) = &env.paystack_secret_key {
            services.payments.secret_key = Some(key.clone());
        }
        if let Some(url) = &env.paystack_initialize_url {
            services.payments.url = url.clone();
        }
    }
}
