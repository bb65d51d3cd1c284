//! Payment gateway client.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{PostJson, Transport};
use crate::config::PaymentsConfig;
use crate::error::{LifekitError, Result};
use crate::validation::ValidPayment;

/// An initialized checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub authorization_url: String,
    pub reference: String,
}

/// Initializes hosted checkout sessions.
pub struct PaymentGateway {
    transport: Arc<dyn Transport>,
    url: String,
    secret_key: String,
    timeout: Duration,
}

impl PaymentGateway {
    /// Build a gateway client, or `None` when no secret key is configured.
    pub fn from_config(config: &PaymentsConfig, transport: Arc<dyn Transport>) -> Option<Self> {
        let secret_key = config.secret_key.clone()?;
        Some(Self {
            transport,
            url: config.url.clone(),
            secret_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Start a checkout for `payment`. The amount is sent in minor units.
    pub async fn initialize(&self, payment: &ValidPayment) -> Result<PaymentSession> {
        let body = json!({
            "amount": payment.amount_minor(),
            "email": payment.email,
            "currency": payment.currency,
            "description": payment.description,
        });

        let reply = self
            .transport
            .post_json(PostJson {
                url: self.url.clone(),
                bearer: Some(self.secret_key.clone()),
                body,
                timeout: self.timeout,
            })
            .await
            .map_err(|e| LifekitError::Upstream(format!("Payment creation failed: {}", e)))?;

        parse_session(&reply)
    }
}

/// Read the session out of an initialize reply.
///
/// A falsy `status` is a refusal carrying the gateway's `message`.
pub fn parse_session(reply: &Value) -> Result<PaymentSession> {
    if !reply.get("status").and_then(Value::as_bool).unwrap_or(false) {
        let message = reply
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Payment failed");
        warn!(reason = message, "Payment gateway refused the session");
        return Err(LifekitError::Upstream(message.to_string()));
    }

    let field = |name: &str| {
        reply
            .get("data")
            .and_then(|data| data.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LifekitError::Upstream(format!("Payment reply is missing data.{}", name)))
    };

    Ok(PaymentSession {
        authorization_url: field("authorization_url")?,
        reference: field("reference")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::testing::ScriptedTransport;

    fn payment() -> ValidPayment {
        ValidPayment {
            amount: 250.5,
            email: "donor@example.org".to_string(),
            currency: "KES".to_string(),
            description: "SDG Support Payment".to_string(),
        }
    }

    fn gateway(transport: Arc<ScriptedTransport>) -> PaymentGateway {
        let config = PaymentsConfig {
            secret_key: Some("sk_test_1".to_string()),
            ..Default::default()
        };
        PaymentGateway::from_config(&config, transport).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_success() {
        let transport = Arc::new(ScriptedTransport::new().reply(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.example/abc",
                "reference": "ref_abc"
            }
        })));

        let session = gateway(transport.clone()).initialize(&payment()).await.unwrap();
        assert_eq!(session.authorization_url, "https://checkout.example/abc");
        assert_eq!(session.reference, "ref_abc");

        let sent = &transport.requests()[0];
        assert_eq!(sent.body["amount"], 25050);
        assert_eq!(sent.body["currency"], "KES");
        assert_eq!(sent.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_refusal_uses_gateway_message() {
        let transport = Arc::new(
            ScriptedTransport::new().reply(json!({"status": false, "message": "Invalid key"})),
        );
        let err = gateway(transport).initialize(&payment()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid key");
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_transport_failure_is_wrapped() {
        let transport = Arc::new(ScriptedTransport::new().fail("connection refused"));
        let err = gateway(transport).initialize(&payment()).await.unwrap_err();
        assert_eq!(err.to_string(), "Payment creation failed: connection refused");
    }

    #[test]
    fn test_parse_session_defaults() {
        let err = parse_session(&json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Payment failed");

        let err = parse_session(&json!({"status": true, "data": {"reference": "r"}})).unwrap_err();
        assert!(err.to_string().contains("authorization_url"));
    }

    #[test]
    fn test_no_secret_no_gateway() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::new());
        assert!(PaymentGateway::from_config(&PaymentsConfig::default(), transport).is_none());
    }
}
