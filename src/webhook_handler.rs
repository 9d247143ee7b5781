use crate::errors::AppError;
use crate::handlers::AppState;
use crate::reconciler::EventOutcome;
use crate::signature::SIGNATURE_HEADER;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: EventOutcome,
}

/// Stripe Webhook Handler
///
/// Receives payment events from Stripe. The raw body is verified against the
/// `Stripe-Signature` header before anything is parsed, so an unsigned or
/// tampered request never reaches the subscription store.
///
/// Non-2xx responses make Stripe redeliver the event later; redeliveries of
/// an already reconciled checkout are acknowledged as duplicates.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    // 1. Verify the signature over the exact bytes received
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing Stripe-Signature header".to_string()))?;

    let event = state.verifier.verify(&body, signature)?;
    tracing::info!("Received Stripe event {} ({})", event.id, event.event_type);

    // 2. Reconcile
    let outcome = state.reconciler.handle_event(&event).await.map_err(|e| {
        tracing::error!(
            "Failed to handle Stripe event {} (retryable: {}): {}",
            event.id,
            e.is_retryable(),
            e
        );
        e
    })?;

    tracing::info!("Stripe event {} handled: {:?}", event.id, outcome);

    Ok((
        StatusCode::OK,
        Json(WebhookResponse {
            received: true,
            outcome,
        }),
    ))
}
