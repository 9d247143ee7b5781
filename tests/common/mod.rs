//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedforward_api::config::Config;
use feedforward_api::errors::AppError;
use feedforward_api::handlers::AppState;
use feedforward_api::link_preview::LinkPreviewer;
use feedforward_api::models::{ProjectWithFeedback, SubscriptionRecord};
use feedforward_api::project_storage::ProjectRepository;
use feedforward_api::reconciler::SubscriptionReconciler;
use feedforward_api::route_guard::RouteGuard;
use feedforward_api::session::SessionSigner;
use feedforward_api::signature::WebhookVerifier;
use feedforward_api::stripe_client::StripeClient;
use feedforward_api::subscription_store::FakeSubscriptionStore;
use feedforward_api::uploads::{StorageClient, UploadPolicy};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const SIGNING_KEY: &str = "test-signing-key-test-signing-key";
pub const SESSION_ID: &str = "cs_test_1";
pub const SUBSCRIPTION_ID: &str = "sub_123";
pub const USER_ID: &str = "8f14e45f-ceea-467f-a8f5-2b3c1d2e3f40";
pub const PERIOD_START: i64 = 1_700_000_000;
pub const PERIOD_END: i64 = 1_702_592_000;

/// Helper function to create test config
pub fn test_config(stripe_base: &str, storage_base: &str) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 3000,
        stripe_secret_key: "sk_test_123".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        stripe_api_base: stripe_base.to_string(),
        base_url: "https://feedforward.test".to_string(),
        supabase_url: storage_base.to_string(),
        supabase_service_role_key: "service-role".to_string(),
        session_signing_key: SIGNING_KEY.to_string(),
        webhook_tolerance_secs: 300,
        public_paths: vec!["/".to_string(), "/projects/*".to_string()],
    }
}

pub fn reconciler(server: &MockServer, store: Arc<FakeSubscriptionStore>) -> SubscriptionReconciler {
    let stripe = StripeClient::new(&server.uri(), "sk_test_123".to_string()).unwrap();
    SubscriptionReconciler::new(Arc::new(stripe), store)
}

/// In-memory project reads keyed by project id.
#[derive(Default)]
pub struct FakeProjects {
    pub projects: HashMap<String, ProjectWithFeedback>,
}

#[async_trait]
impl ProjectRepository for FakeProjects {
    async fn load_with_feedback(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectWithFeedback>, AppError> {
        Ok(self.projects.get(project_id).cloned())
    }
}

pub fn build_state(
    stripe: &MockServer,
    storage_base: &str,
    store: Arc<FakeSubscriptionStore>,
    projects: FakeProjects,
) -> Arc<AppState> {
    let config = test_config(&stripe.uri(), storage_base);
    Arc::new(AppState {
        reconciler: reconciler(stripe, store),
        verifier: WebhookVerifier::new(WEBHOOK_SECRET, config.webhook_tolerance_secs),
        projects: Arc::new(projects),
        sessions: SessionSigner::new(SIGNING_KEY),
        route_guard: RouteGuard::new(&config.public_paths),
        storage: StorageClient::new(storage_base, "service-role".to_string()).unwrap(),
        upload_policy: UploadPolicy::default(),
        link_previewer: LinkPreviewer::new().unwrap(),
        config,
    })
}

pub fn checkout_event(event_id: &str, metadata: Value) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": PERIOD_START,
        "livemode": false,
        "data": {
            "object": {
                "id": SESSION_ID,
                "object": "checkout.session",
                "mode": "subscription",
                "customer": "cus_1",
                "subscription": SUBSCRIPTION_ID,
                "metadata": metadata
            }
        }
    })
}

pub fn user_metadata() -> Value {
    json!({ "supabase_user_id": USER_ID })
}

/// Mounts the three Stripe reads a completed checkout needs.
pub async fn mount_checkout_reads(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/checkout/sessions/{}/line_items", SESSION_ID)))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{
                "id": "li_1",
                "price": {
                    "id": "price_pro_monthly",
                    "product": "prod_pro",
                    "unit_amount": 1000,
                    "nickname": "Pro Monthly"
                },
                "quantity": 1
            }],
            "has_more": false
        })))
        .expect(expected_calls)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/products/prod_pro"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "prod_pro", "name": "Pro"})),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{}", SUBSCRIPTION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": SUBSCRIPTION_ID,
            "object": "subscription",
            "status": "active",
            "customer": "cus_1",
            "cancel_at_period_end": false,
            "canceled_at": null,
            "start_date": PERIOD_START,
            "items": {
                "object": "list",
                "data": [{
                    "id": "si_1",
                    "current_period_start": PERIOD_START,
                    "current_period_end": PERIOD_END
                }],
                "has_more": false
            }
        })))
        .mount(server)
        .await;
}

pub fn stored_record(id: &str) -> SubscriptionRecord {
    SubscriptionRecord {
        stripe_subscription_id: id.to_string(),
        supabase_user_id: USER_ID.to_string(),
        stripe_customer_id: Some("cus_1".to_string()),
        status: "active".to_string(),
        price_id: Some("price_pro_monthly".to_string()),
        price: Some(1000),
        product_name: Some("Pro".to_string()),
        current_period_start: Utc.timestamp_opt(PERIOD_START, 0).unwrap(),
        current_period_end: Utc.timestamp_opt(PERIOD_END, 0).unwrap(),
        cancel_at_period_end: false,
        canceled_at: None,
    }
}
