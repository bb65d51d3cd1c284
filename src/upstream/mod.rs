//! Clients for the external services.
//!
//! Every client talks through [`Transport`], a JSON request/response seam
//! implemented over HTTP by [`HttpTransport`].

mod chat;
mod payment;
mod sentiment;

pub use chat::ChatClient;
pub use payment::{PaymentGateway, PaymentSession};
pub use sentiment::SentimentClient;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{LifekitError, Result};

/// A JSON POST to an external service.
#[derive(Debug, Clone)]
pub struct PostJson {
    pub url: String,
    /// Bearer token sent in the `Authorization` header
    pub bearer: Option<String>,
    pub body: Value,
    pub timeout: Duration,
}

/// Request/response channel to external services.
///
/// Non-success statuses are reported as errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, request: PostJson) -> Result<Value>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, request: PostJson) -> Result<Value> {
        debug!(url = %request.url, timeout = ?request.timeout, "Calling external service");

        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| LifekitError::Upstream(e.to_string()))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| LifekitError::Upstream(format!("invalid JSON reply: {}", e)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for client and service tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replies with queued results in order and records each request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value>>>,
        requests: Mutex<Vec<PostJson>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, value: Value) -> Self {
            self.replies.lock().push_back(Ok(value));
            self
        }

        pub fn fail(self, message: &str) -> Self {
            self.replies
                .lock()
                .push_back(Err(LifekitError::Upstream(message.to_string())));
            self
        }

        pub fn requests(&self) -> Vec<PostJson> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_json(&self, request: PostJson) -> Result<Value> {
            self.requests.lock().push(request);
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LifekitError::Upstream("no scripted reply".to_string())))
        }
    }
}
