use crate::handlers::{self, AppState};
use crate::{session_handler, webhook_handler};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// All `/api/v1` routes. Callers add rate limiting and other layers on top.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Ratings
        .route(
            "/api/v1/projects/:id/ratings",
            get(handlers::project_ratings),
        )
        .route("/api/v1/ratings/aggregate", post(handlers::aggregate_ratings))
        // Subscriptions
        .route(
            "/api/v1/subscriptions/checkout",
            post(handlers::create_checkout),
        )
        .route(
            "/api/v1/subscriptions/retrieve",
            get(handlers::retrieve_subscription),
        )
        .route(
            "/api/v1/subscriptions/cancel",
            post(handlers::cancel_subscription),
        )
        .route(
            "/api/v1/webhooks/stripe",
            post(webhook_handler::stripe_webhook),
        )
        // Navigation and reviewer sessions
        .route(
            "/api/v1/navigation/resolve",
            post(handlers::resolve_navigation),
        )
        .route("/api/v1/session", get(session_handler::current_session))
        .route(
            "/api/v1/feedback-claims/:short_id",
            put(session_handler::put_claim)
                .get(session_handler::get_claim)
                .delete(session_handler::delete_claim),
        )
        // Forms, uploads, previews
        .route(
            "/api/v1/projects/validate",
            post(handlers::validate_create_form),
        )
        .route(
            "/api/v1/projects/validate-update",
            post(handlers::validate_update_form),
        )
        .route("/api/v1/uploads/:bucket", post(handlers::upload_image))
        .route("/api/v1/link-preview", get(handlers::link_preview))
}

/// The application without rate limiting, for tests and local tooling.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes())
        .with_state(state)
}
