//! Request handling for the Lifekit operations.
//!
//! Every guarded operation runs the same pipeline: rate limit check keyed by
//! the caller's address, input validation, an external call or its local
//! fallback, then persistence.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::LifekitConfig;
use crate::error::{LifekitError, Result};
use crate::fallback;
use crate::models::{
    FlashcardItem, FlashcardsRequest, FlashcardsResponse, HealthResponse, PaymentRequest,
    PaymentResponse, RecipeItem, RecipesRequest, RecipesResponse, SentimentRequest,
    SentimentResponse,
};
use crate::ratelimit::{ClientKey, Decision, GuardedOperation, RateLimiter, RatePolicies};
use crate::store::{MemoryStore, NewPayment, NewRecipe, Repository};
use crate::upstream::{ChatClient, HttpTransport, PaymentGateway, SentimentClient, Transport};
use crate::validation;

/// The Lifekit operations with their shared state.
pub struct LifekitService {
    limiter: Arc<RateLimiter>,
    policies: RatePolicies,
    store: Arc<dyn Repository>,
    sentiment: Option<SentimentClient>,
    chat: Option<ChatClient>,
    payments: Option<PaymentGateway>,
    eviction_every: Duration,
    idle_ttl: Duration,
}

impl LifekitService {
    /// Wire the service from explicit collaborators.
    ///
    /// Fails if a configured rate limit rule is invalid.
    pub fn new(
        config: &LifekitConfig,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn Repository>,
    ) -> Result<Self> {
        let policies = config.rate_limiting.policies()?;
        let services = &config.services;

        let service = Self {
            limiter,
            policies,
            store,
            sentiment: SentimentClient::from_config(&services.sentiment, Arc::clone(&transport)),
            chat: ChatClient::from_config(&services.chat, Arc::clone(&transport)),
            payments: PaymentGateway::from_config(&services.payments, transport),
            eviction_every: Duration::from_secs(config.maintenance.eviction_interval_secs),
            idle_ttl: Duration::from_secs(config.maintenance.idle_ttl_secs),
        };

        info!(
            sentiment_model = service.sentiment.is_some(),
            chat_model = service.chat.is_some(),
            payment_gateway = service.payments.is_some(),
            "Lifekit service initialized"
        );
        for op in GuardedOperation::ALL {
            debug!(operation = %op, policy = %service.policies.policy(op), "Rate limit policy");
        }

        Ok(service)
    }

    /// Wire the service with an HTTP transport, a fresh limiter and an
    /// in-memory store.
    pub fn from_config(config: &LifekitConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(HttpTransport::new()),
            Arc::new(RateLimiter::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Wire the service from configuration and start its idle-key sweep.
    ///
    /// This is the entry point for hosting the service in a process. It must
    /// be called inside a tokio runtime; the sweep runs until the returned
    /// handle is aborted.
    pub fn start(config: &LifekitConfig) -> Result<(Self, JoinHandle<()>)> {
        let service = Self::from_config(config)?;
        let maintenance = service.spawn_maintenance();
        Ok((service, maintenance))
    }

    pub fn policies(&self) -> &RatePolicies {
        &self.policies
    }

    /// Start the periodic sweep of idle rate limit keys.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        self.limiter.spawn_eviction(self.eviction_every, self.idle_ttl)
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
        }
    }

    fn admit(&self, op: GuardedOperation, client: IpAddr) -> Result<()> {
        let key = self.policies.key_for(op, ClientKey::from(client));
        let policy = self.policies.policy(op);
        let retain = self.policies.retention(op);
        match self.limiter.check_and_record_retaining(&key, &policy, retain) {
            Decision::Admit => Ok(()),
            Decision::Reject { retry_after } => {
                warn!(
                    operation = %op,
                    client = %client,
                    retry_after_secs = retry_after.as_secs_f64(),
                    "Rate limit exceeded"
                );
                Err(LifekitError::RateLimited { retry_after })
            }
        }
    }

    /// Score journal text and store it.
    #[instrument(skip(self, request), fields(operation = "sentiment"))]
    pub async fn sentiment(
        &self,
        client: IpAddr,
        request: SentimentRequest,
    ) -> Result<SentimentResponse> {
        self.admit(GuardedOperation::Sentiment, client)?;
        let text = validation::journal_text(request.text.as_deref())?;

        let score = match &self.sentiment {
            Some(model) => match model.score(&text).await {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!(error = %e, "Sentiment model failed, using local score");
                    None
                }
            },
            None => None,
        };
        let score = score.unwrap_or_else(|| fallback::sentiment_score(&text));

        let entry = self.store.insert_journal_entry(&text, score).await?;
        info!(id = entry.id, score, "Journal entry scored");

        Ok(SentimentResponse {
            score: entry.score,
            id: entry.id,
            created_at: entry.created_at,
        })
    }

    /// Generate study flashcards for notes and store them.
    #[instrument(skip(self, request), fields(operation = "flashcards"))]
    pub async fn flashcards(
        &self,
        client: IpAddr,
        request: FlashcardsRequest,
    ) -> Result<FlashcardsResponse> {
        self.admit(GuardedOperation::Flashcards, client)?;
        let notes = validation::notes(request.notes.as_deref())?;
        debug!(chars = notes.chars().count(), "Generating flashcards");

        let cards = fallback::seed_flashcards();
        let pairs: Vec<(String, String)> = cards
            .iter()
            .map(|c| (c.question.clone(), c.answer.clone()))
            .collect();
        let stored = self.store.insert_flashcards(&pairs).await?;
        info!(count = stored.len(), "Flashcards generated");

        Ok(FlashcardsResponse {
            flashcards: stored
                .into_iter()
                .map(|card| FlashcardItem {
                    question: card.question,
                    answer: card.answer,
                })
                .collect(),
        })
    }

    /// Suggest recipes for an ingredient list and store them.
    #[instrument(skip(self, request), fields(operation = "recipes"))]
    pub async fn recipes(&self, client: IpAddr, request: RecipesRequest) -> Result<RecipesResponse> {
        self.admit(GuardedOperation::Recipes, client)?;
        validation::ingredients(&request.ingredients)?;

        let ideas = match &self.chat {
            Some(chat) => match chat.suggest_recipes(&request.ingredients).await {
                Ok(ideas) => Some(ideas),
                Err(e) => {
                    warn!(error = %e, "Chat model failed, using template recipes");
                    None
                }
            },
            None => None,
        };
        let ideas = ideas.unwrap_or_else(|| fallback::recipes(&request.ingredients));

        let joined = request.ingredients.join(",");
        let stored = self
            .store
            .insert_recipes(
                ideas
                    .into_iter()
                    .map(|idea| NewRecipe {
                        title: idea.title,
                        content: idea.content,
                        ingredients: Some(joined.clone()),
                    })
                    .collect(),
            )
            .await?;
        info!(count = stored.len(), "Recipes suggested");

        Ok(RecipesResponse {
            recipes: stored
                .into_iter()
                .map(|recipe| RecipeItem {
                    title: recipe.title,
                    content: recipe.content,
                })
                .collect(),
        })
    }

    /// Open a checkout session with the payment gateway.
    ///
    /// Not rate limited.
    #[instrument(skip(self, request), fields(operation = "create_payment"))]
    pub async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentResponse> {
        let payment = validation::payment(&request)?;

        let gateway = self.payments.as_ref().ok_or_else(|| {
            warn!("Payment requested without a gateway secret");
            LifekitError::NotConfigured("Payment service not configured".to_string())
        })?;

        let session = gateway.initialize(&payment).await?;
        let record = self
            .store
            .insert_payment(NewPayment {
                reference: session.reference.clone(),
                amount_minor: payment.amount_minor(),
                currency: payment.currency.clone(),
                email: payment.email.clone(),
            })
            .await?;
        info!(id = %record.id, reference = %record.reference, "Payment session created");

        Ok(PaymentResponse {
            payment_url: session.authorization_url,
            reference: session.reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{AdmissionScope, ManualClock};
    use crate::upstream::testing::ScriptedTransport;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        service: LifekitService,
        store: Arc<MemoryStore>,
        transport: Arc<ScriptedTransport>,
        limiter: Arc<RateLimiter>,
        clock: Arc<ManualClock>,
    }

    fn harness(config: LifekitConfig, transport: ScriptedTransport) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(transport);
        let clock = Arc::new(ManualClock::new());
        let limiter = Arc::new(RateLimiter::with_clock(clock.clone()));
        let service =
            LifekitService::new(&config, transport.clone(), limiter.clone(), store.clone())
                .unwrap();
        Harness {
            service,
            store,
            transport,
            limiter,
            clock,
        }
    }

    fn client() -> IpAddr {
        "203.0.113.7".parse().unwrap()
    }

    fn text(s: &str) -> SentimentRequest {
        SentimentRequest {
            text: Some(s.to_string()),
        }
    }

    fn ingredients(items: &[&str]) -> RecipesRequest {
        RecipesRequest {
            ingredients: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_health() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());
        assert_eq!(h.service.health().status, "ok");
    }

    #[tokio::test]
    async fn test_sentiment_fallback_without_token() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());

        let response = h.service.sentiment(client(), text("  a calm morning  ")).await.unwrap();

        assert_eq!(response.score, fallback::sentiment_score("a calm morning"));
        assert!(h.transport.requests().is_empty());
        let stored = h.store.journal_entries();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "a calm morning");
        assert_eq!(stored[0].id, response.id);
    }

    #[tokio::test]
    async fn test_sentiment_uses_model_when_configured() {
        let mut config = LifekitConfig::default();
        config.services.sentiment.token = Some("hf_token".to_string());
        let transport =
            ScriptedTransport::new().reply(json!([[{"label": "POSITIVE", "score": 0.93}]]));
        let h = harness(config, transport);

        let response = h.service.sentiment(client(), text("great day")).await.unwrap();
        assert_eq!(response.score, 93);
    }

    #[tokio::test]
    async fn test_sentiment_model_failure_falls_back() {
        let mut config = LifekitConfig::default();
        config.services.sentiment.token = Some("hf_token".to_string());
        let h = harness(config, ScriptedTransport::new().fail("503 Service Unavailable"));

        let response = h.service.sentiment(client(), text("rainy")).await.unwrap();
        assert_eq!(response.score, fallback::sentiment_score("rainy"));
        assert_eq!(h.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_sentiment_unreadable_score_falls_back() {
        let mut config = LifekitConfig::default();
        config.services.sentiment.token = Some("hf_token".to_string());
        let transport =
            ScriptedTransport::new().reply(json!([[{"label": "POSITIVE", "score": "high"}]]));
        let h = harness(config, transport);

        let response = h.service.sentiment(client(), text("mixed")).await.unwrap();
        assert_eq!(response.score, fallback::sentiment_score("mixed"));
    }

    #[tokio::test]
    async fn test_sentiment_validation_error_is_not_stored() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());

        let err = h.service.sentiment(client(), SentimentRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "text is required");
        assert!(h.store.journal_entries().is_empty());
    }

    #[tokio::test]
    async fn test_sentiment_rate_limited_after_five_calls() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());

        for _ in 0..5 {
            h.service.sentiment(client(), text("ok")).await.unwrap();
        }
        let err = h.service.sentiment(client(), text("ok")).await.unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert!(matches!(
            err,
            LifekitError::RateLimited { retry_after } if retry_after == Duration::from_secs(60)
        ));

        // Another caller is unaffected
        let other: IpAddr = "198.51.100.2".parse().unwrap();
        assert_ok!(h.service.sentiment(other, text("ok")).await);

        h.clock.advance(Duration::from_secs(60));
        assert_ok!(h.service.sentiment(client(), text("ok")).await);
    }

    #[tokio::test]
    async fn test_invalid_calls_still_consume_admissions() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());

        // Validation runs after admission, so invalid calls still count
        for _ in 0..3 {
            let err = h.service.flashcards(client(), FlashcardsRequest::default()).await.unwrap_err();
            assert_eq!(err.status_code(), 400);
        }
        let err = h.service.flashcards(client(), FlashcardsRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn test_flashcards_are_stored() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());
        let request = FlashcardsRequest {
            notes: Some("Newton's laws of motion".to_string()),
        };

        let response = h.service.flashcards(client(), request).await.unwrap();
        assert_eq!(response.flashcards, fallback::seed_flashcards());
        assert_eq!(h.store.flashcards().len(), 5);
    }

    #[tokio::test]
    async fn test_recipes_fallback_and_limit() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());

        let response = h
            .service
            .recipes(client(), ingredients(&["rice", "beans", "kale"]))
            .await
            .unwrap();
        assert_eq!(response.recipes.len(), 3);
        assert_eq!(response.recipes[0].title, "Quick Bowl");
        assert_eq!(
            h.store.recipes()[0].ingredients.as_deref(),
            Some("rice,beans,kale")
        );

        assert_ok!(h.service.recipes(client(), ingredients(&["egg"])).await);
        let err = assert_err!(h.service.recipes(client(), ingredients(&["egg"])).await);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_recipes_from_chat_model() {
        let mut config = LifekitConfig::default();
        config.services.chat.api_key = Some("sk-test".to_string());
        let transport = ScriptedTransport::new().reply(json!({
            "choices": [{"message": {"content": "[{\"title\": \"Kale Chips\", \"content\": \"Bake kale.\"}]"}}]
        }));
        let h = harness(config, transport);

        let response = h.service.recipes(client(), ingredients(&["kale"])).await.unwrap();
        assert_eq!(response.recipes.len(), 1);
        assert_eq!(response.recipes[0].title, "Kale Chips");
    }

    #[tokio::test]
    async fn test_recipes_chat_garbage_falls_back() {
        let mut config = LifekitConfig::default();
        config.services.chat.api_key = Some("sk-test".to_string());
        let transport = ScriptedTransport::new().reply(json!({
            "choices": [{"message": {"content": "Sorry, I can't help with that."}}]
        }));
        let h = harness(config, transport);

        let response = h.service.recipes(client(), ingredients(&["kale"])).await.unwrap();
        assert_eq!(response.recipes, fallback::recipes(&["kale".to_string()]));
    }

    #[tokio::test]
    async fn test_per_operation_scope_isolates_operations() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());

        for _ in 0..5 {
            h.service.sentiment(client(), text("fine")).await.unwrap();
        }
        assert_ok!(h.service.recipes(client(), ingredients(&["egg"])).await);
    }

    #[tokio::test]
    async fn test_shared_scope_counts_across_operations() {
        let mut config = LifekitConfig::default();
        config.rate_limiting.scope = AdmissionScope::Shared;
        let h = harness(config, ScriptedTransport::new());

        h.service.sentiment(client(), text("one")).await.unwrap();
        h.service.sentiment(client(), text("two")).await.unwrap();

        // Two admissions already recorded against the 2/min recipe policy
        let err = h.service.recipes(client(), ingredients(&["egg"])).await.unwrap_err();
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn test_shared_scope_honours_longer_windows() {
        let mut config = LifekitConfig::default();
        config.rate_limiting = crate::ratelimit::RateLimitConfig::from_yaml(
            "scope: shared\noperations:\n  recipes:\n    max_calls: 2\n    window_secs: 3600\n",
        )
        .unwrap();
        let h = harness(config, ScriptedTransport::new());

        assert_ok!(h.service.recipes(client(), ingredients(&["egg"])).await);
        h.clock.set_elapsed(Duration::from_secs(1));
        assert_ok!(h.service.recipes(client(), ingredients(&["egg"])).await);

        // The one-minute sentiment check must not forget the hour-old recipes calls
        h.clock.set_elapsed(Duration::from_secs(120));
        assert_ok!(h.service.sentiment(client(), text("fine")).await);

        h.clock.set_elapsed(Duration::from_secs(121));
        let err = h.service.recipes(client(), ingredients(&["egg"])).await.unwrap_err();
        assert!(matches!(
            err,
            LifekitError::RateLimited { retry_after } if retry_after == Duration::from_secs(3480)
        ));
        assert_eq!(h.store.recipes().len(), 6);
    }

    #[tokio::test]
    async fn test_maintenance_sweeps_idle_clients() {
        let mut config = LifekitConfig::default();
        config.maintenance.idle_ttl_secs = 600;
        let h = harness(config, ScriptedTransport::new());

        h.service.sentiment(client(), text("hello")).await.unwrap();
        assert_eq!(h.limiter.key_count(), 1);

        h.clock.advance(Duration::from_secs(601));
        // The first tick fires immediately
        let sweep = h.service.spawn_maintenance();
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweep.abort();

        assert_eq!(h.limiter.key_count(), 0);
        assert_ok!(h.service.sentiment(client(), text("hello again")).await);
    }

    #[tokio::test]
    async fn test_start_runs_maintenance_until_aborted() {
        let (service, sweep) = LifekitService::start(&LifekitConfig::default()).unwrap();
        assert_eq!(service.health().status, "ok");

        tokio::task::yield_now().await;
        assert!(!sweep.is_finished());
        sweep.abort();
    }

    #[tokio::test]
    async fn test_payment_requires_gateway() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());
        let request = PaymentRequest {
            amount: Some(100.0),
            email: Some("donor@example.org".to_string()),
            ..Default::default()
        };

        let err = h.service.create_payment(request).await.unwrap_err();
        assert_eq!(err.to_string(), "Payment service not configured");
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_payment_validation_precedes_configuration() {
        let h = harness(LifekitConfig::default(), ScriptedTransport::new());
        let err = h.service.create_payment(PaymentRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Valid amount is required");
    }

    #[tokio::test]
    async fn test_payment_session_created_and_stored() {
        let mut config = LifekitConfig::default();
        config.services.payments.secret_key = Some("sk_test".to_string());
        let transport = ScriptedTransport::new().reply(json!({
            "status": true,
            "data": {"authorization_url": "https://checkout.example/x", "reference": "ref_x"}
        }));
        let h = harness(config, transport);

        let request = PaymentRequest {
            amount: Some(10.0),
            email: Some("donor@example.org".to_string()),
            currency: Some("USD".to_string()),
            description: None,
        };
        let response = h.service.create_payment(request).await.unwrap();

        assert_eq!(response.payment_url, "https://checkout.example/x");
        assert_eq!(response.reference, "ref_x");
        let payments = h.store.payments();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount_minor, 1000);
        assert_eq!(payments[0].currency, "USD");
    }

    #[test]
    fn test_invalid_policy_config_fails_wiring() {
        let mut config = LifekitConfig::default();
        config.rate_limiting = crate::ratelimit::RateLimitConfig::from_yaml(
            "operations:\n  sentiment:\n    max_calls: 0\n    window_secs: 60\n",
        )
        .unwrap();

        let result = LifekitService::new(
            &config,
            Arc::new(ScriptedTransport::new()),
            Arc::new(RateLimiter::new()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(LifekitError::Config(_))));
    }
}
