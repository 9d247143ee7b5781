/// Reconciler tests against a mocked Stripe API and the in-memory store
mod common;

use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use feedforward_api::errors::AppError;
use feedforward_api::reconciler::EventOutcome;
use feedforward_api::stripe_models::StripeEvent;
use feedforward_api::subscription_store::FakeSubscriptionStore;

fn event(value: serde_json::Value) -> StripeEvent {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_completed_checkout_inserts_one_record() {
    let server = MockServer::start().await;
    mount_checkout_reads(&server, 1).await;
    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());

    let outcome = reconciler
        .handle_event(&event(checkout_event("evt_1", user_metadata())))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Inserted);
    assert_eq!(store.len().await, 1);

    let record = store.get(SUBSCRIPTION_ID).await.unwrap();
    assert_eq!(record.supabase_user_id, USER_ID);
    assert_eq!(record.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(record.status, "active");
    assert_eq!(record.price_id.as_deref(), Some("price_pro_monthly"));
    assert_eq!(record.price, Some(1000));
    assert_eq!(record.product_name.as_deref(), Some("Pro"));
    assert_eq!(
        record.current_period_start,
        Utc.timestamp_opt(PERIOD_START, 0).unwrap()
    );
    assert_eq!(
        record.current_period_end,
        Utc.timestamp_opt(PERIOD_END, 0).unwrap()
    );
    assert!(!record.cancel_at_period_end);
    assert_eq!(record.canceled_at, None);
}

#[tokio::test]
async fn test_redelivered_checkout_keeps_single_row() {
    let server = MockServer::start().await;
    // The second delivery short-circuits before calling Stripe
    mount_checkout_reads(&server, 1).await;
    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());
    let delivery = event(checkout_event("evt_1", user_metadata()));

    let first = reconciler.handle_event(&delivery).await.unwrap();
    let second = reconciler.handle_event(&delivery).await.unwrap();

    assert_eq!(first, EventOutcome::Inserted);
    assert_eq!(second, EventOutcome::Duplicate);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_missing_user_metadata_is_skipped() {
    let server = MockServer::start().await;
    mount_checkout_reads(&server, 0).await;
    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());

    for metadata in [json!({}), json!(null), json!({"supabase_user_id": "  "})] {
        let outcome = reconciler
            .handle_event(&event(checkout_event("evt_1", metadata)))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Skipped);
    }

    assert_eq!(store.calls(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_checkout_without_subscription_is_skipped() {
    let server = MockServer::start().await;
    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());

    let mut payload = checkout_event("evt_1", user_metadata());
    payload["data"]["object"]["subscription"] = json!(null);
    payload["data"]["object"]["mode"] = json!("payment");

    let outcome = reconciler.handle_event(&event(payload)).await.unwrap();
    assert_eq!(outcome, EventOutcome::Skipped);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_other_event_types_are_ignored() {
    let server = MockServer::start().await;
    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());

    let outcome = reconciler
        .handle_event(&event(json!({
            "id": "evt_2",
            "type": "invoice.paid",
            "data": {"object": {"id": "in_1"}}
        })))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Ignored);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_expanded_product_skips_product_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/checkout/sessions/{}/line_items", SESSION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "li_1",
                "price": {
                    "id": "price_team",
                    "product": {"id": "prod_team", "name": "Team"},
                    "unit_amount": 4900
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/products/prod_team"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    // Older API versions carry the period on the subscription itself
    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{}", SUBSCRIPTION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": SUBSCRIPTION_ID,
            "status": "trialing",
            "current_period_start": PERIOD_START,
            "current_period_end": PERIOD_END
        })))
        .mount(&server)
        .await;

    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());
    let outcome = reconciler
        .handle_event(&event(checkout_event("evt_1", user_metadata())))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Inserted);
    let record = store.get(SUBSCRIPTION_ID).await.unwrap();
    assert_eq!(record.product_name.as_deref(), Some("Team"));
    assert_eq!(record.price, Some(4900));
    assert_eq!(record.status, "trialing");
}

#[tokio::test]
async fn test_stripe_failure_aborts_without_insert() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/checkout/sessions/{}/line_items", SESSION_ID)))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"type": "api_error", "message": "Something went wrong"}
        })))
        .mount(&server)
        .await;

    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());
    let err = reconciler
        .handle_event(&event(checkout_event("evt_1", user_metadata())))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Upstream(_)));
    assert!(err.is_retryable());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_empty_line_items_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/checkout/sessions/{}/line_items", SESSION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());
    let err = reconciler
        .handle_event(&event(checkout_event("evt_1", user_metadata())))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Upstream(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_store_failure_is_reported() {
    let server = MockServer::start().await;
    mount_checkout_reads(&server, 1).await;
    let store = Arc::new(FakeSubscriptionStore::new());
    store.fail_writes(true);
    let reconciler = reconciler(&server, store.clone());

    let err = reconciler
        .handle_event(&event(checkout_event("evt_1", user_metadata())))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Persistence(_)));
}

#[tokio::test]
async fn test_cancellation_updates_flags_and_keeps_period() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/subscriptions/{}", SUBSCRIPTION_ID)))
        .and(body_string_contains("cancel_at_period_end=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": SUBSCRIPTION_ID,
            "status": "active",
            "cancel_at_period_end": true,
            "canceled_at": 1_700_100_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(FakeSubscriptionStore::new());
    store.seed(stored_record(SUBSCRIPTION_ID)).await;
    let reconciler = reconciler(&server, store.clone());

    let cancellation = reconciler.cancel(SUBSCRIPTION_ID).await.unwrap();
    assert!(cancellation.cancel_at_period_end);

    let record = store.get(SUBSCRIPTION_ID).await.unwrap();
    assert!(record.cancel_at_period_end);
    assert_eq!(record.status, "active");
    assert_eq!(
        record.canceled_at,
        Some(Utc.timestamp_opt(1_700_100_000, 0).unwrap())
    );
    assert_eq!(
        record.current_period_end,
        stored_record(SUBSCRIPTION_ID).current_period_end
    );
}

#[tokio::test]
async fn test_cancelling_unknown_subscription_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/subscriptions/sub_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "resource_missing",
                "message": "No such subscription: 'sub_missing'"
            }
        })))
        .mount(&server)
        .await;

    let store = Arc::new(FakeSubscriptionStore::new());
    store.seed(stored_record(SUBSCRIPTION_ID)).await;
    let reconciler = reconciler(&server, store.clone());

    let err = reconciler.cancel("sub_missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(store.calls(), 0);
    assert!(!store.get(SUBSCRIPTION_ID).await.unwrap().cancel_at_period_end);
}

#[tokio::test]
async fn test_cancelling_without_local_row_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/subscriptions/{}", SUBSCRIPTION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": SUBSCRIPTION_ID,
            "status": "active",
            "cancel_at_period_end": true
        })))
        .mount(&server)
        .await;

    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());

    let err = reconciler.cancel(SUBSCRIPTION_ID).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_blank_cancellation_id_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(FakeSubscriptionStore::new());
    let reconciler = reconciler(&server, store.clone());

    let err = reconciler.cancel("   ").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(store.calls(), 0);
}
