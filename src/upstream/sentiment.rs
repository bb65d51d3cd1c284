//! Sentiment model client.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{PostJson, Transport};
use crate::config::SentimentConfig;
use crate::error::{LifekitError, Result};

/// Scores text with a hosted classification model.
pub struct SentimentClient {
    transport: Arc<dyn Transport>,
    url: String,
    token: String,
    timeout: Duration,
}

impl SentimentClient {
    /// Build a client, or `None` when no token is configured.
    pub fn from_config(config: &SentimentConfig, transport: Arc<dyn Transport>) -> Option<Self> {
        let token = config.token.clone()?;
        Some(Self {
            transport,
            url: config.url.clone(),
            token,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Score `text` from 0 to 100 by the model's positive label.
    pub async fn score(&self, text: &str) -> Result<u8> {
        let reply = self
            .transport
            .post_json(PostJson {
                url: self.url.clone(),
                bearer: Some(self.token.clone()),
                body: json!({ "inputs": text }),
                timeout: self.timeout,
            })
            .await?;

        positive_score(&reply)
    }
}

/// Positive-label probability scaled to 0..=100.
///
/// Expects `[[{"label": ..., "score": ...}, ...]]`. The first label starting
/// with `POS` wins. A reply of another shape, or one without a positive
/// label, scores 0. Label entries that are not objects, and a positive
/// label whose score is not a number, are errors.
pub fn positive_score(reply: &Value) -> Result<u8> {
    let Some(labels) = reply.get(0).and_then(Value::as_array) else {
        return Ok(0);
    };

    let mut positive = 0.0;
    for entry in labels {
        let obj = entry.as_object().ok_or_else(|| {
            LifekitError::Upstream(format!("Unexpected sentiment label entry: {}", entry))
        })?;
        let label = match obj.get("label") {
            None => "",
            Some(Value::String(label)) => label.as_str(),
            Some(other) => {
                return Err(LifekitError::Upstream(format!(
                    "Unexpected sentiment label: {}",
                    other
                )))
            }
        };
        if !label.to_uppercase().starts_with("POS") {
            continue;
        }

        positive = match obj.get("score") {
            None => 0.0,
            Some(score) => score
                .as_f64()
                .or_else(|| score.as_str().and_then(|s| s.trim().parse().ok()))
                .filter(|p: &f64| p.is_finite())
                .ok_or_else(|| {
                    LifekitError::Upstream(format!("Non-numeric sentiment score: {}", score))
                })?,
        };
        break;
    }

    Ok((positive * 100.0).round_ties_even().clamp(0.0, 100.0) as u8)
}
