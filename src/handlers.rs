use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::forms::{CreateProjectForm, UpdateProjectForm};
use crate::link_preview::{LinkPreview, LinkPreviewer};
use crate::models::{AggregatedRating, ProjectWithFeedback};
use crate::project_storage::ProjectRepository;
use crate::rating::compute_aggregates;
use crate::reconciler::SubscriptionReconciler;
use crate::route_guard::{RouteGuard, ViewerState};
use crate::signature::WebhookVerifier;
use crate::stripe_client::NewCheckout;
use crate::uploads::{StorageClient, UploadPolicy};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
///
/// Every collaborator is built once in `main` and passed in here.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Webhook-driven subscription bookkeeping.
    pub reconciler: SubscriptionReconciler,
    /// Stripe webhook signature verification.
    pub verifier: WebhookVerifier,
    /// Project and feedback reads.
    pub projects: Arc<dyn ProjectRepository>,
    /// Reviewer session tokens and feedback claims.
    pub sessions: crate::session::SessionSigner,
    /// Page navigation decisions.
    pub route_guard: RouteGuard,
    /// Hosted object storage.
    pub storage: StorageClient,
    pub upload_policy: UploadPolicy,
    pub link_previewer: LinkPreviewer,
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "feedforward-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

// ============ Ratings ============

/// GET /api/v1/projects/:id/ratings
///
/// Loads a project with its feedback and returns the per-criterion means.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The project id.
///
/// # Returns
///
/// * `Result<Json<Vec<AggregatedRating>>, AppError>` - One entry per criterion, or 404.
pub async fn project_ratings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AggregatedRating>>, AppError> {
    tracing::info!("GET /projects/{}/ratings", id);

    let project = state
        .projects
        .load_with_feedback(&id)
        .await
        .with_context(|| format!("Loading ratings for project {}", id))?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", id)))?;

    Ok(Json(compute_aggregates(&project)))
}

/// POST /api/v1/ratings/aggregate
///
/// Aggregates a project supplied in the request body. No I/O.
pub async fn aggregate_ratings(
    Json(project): Json<ProjectWithFeedback>,
) -> Json<Vec<AggregatedRating>> {
    Json(compute_aggregates(&project))
}

// ============ Subscriptions ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub price_id: String,
    pub supabase_user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
}

/// POST /api/v1/subscriptions/checkout
///
/// Creates a subscription-mode checkout session for one price.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - JSON body with `priceId` and `supabaseUserId`.
///
/// # Returns
///
/// * `Result<Json<CheckoutResponse>, AppError>` - The checkout session id.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    if request.price_id.trim().is_empty() || request.supabase_user_id.trim().is_empty() {
        return Err(AppError::Validation(
            "priceId and supabaseUserId are required".to_string(),
        ));
    }

    let checkout = NewCheckout {
        price_id: request.price_id,
        user_id: request.supabase_user_id,
        success_url: format!(
            "{}/subscription-success?session_id={{CHECKOUT_SESSION_ID}}",
            state.config.base_url
        ),
        cancel_url: format!("{}/subscription-cancel", state.config.base_url),
    };

    let session = state
        .reconciler
        .provider()
        .create_checkout_session(&checkout)
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveParams {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub plan: Option<String>,
    pub status: Option<String>,
    /// Unix seconds.
    pub start_date: Option<i64>,
}

/// GET /api/v1/subscriptions/retrieve?sessionId=
///
/// Looks up the plan behind a completed checkout session.
pub async fn retrieve_subscription(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RetrieveParams>,
) -> Result<Json<SubscriptionSummary>, AppError> {
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("sessionId is required".to_string()))?;

    let session = state
        .reconciler
        .provider()
        .retrieve_checkout_session(&session_id)
        .await?;

    let subscription = session.subscription.as_ref().and_then(|s| s.as_object());
    Ok(Json(SubscriptionSummary {
        plan: subscription
            .and_then(|s| s.plan.as_ref())
            .and_then(|p| p.nickname.clone()),
        status: subscription.map(|s| s.status.clone()),
        start_date: subscription.and_then(|s| s.start_date),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    pub subscription_id: String,
}

/// POST /api/v1/subscriptions/cancel
///
/// Schedules cancellation at the end of the billing period.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - A confirmation message.
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /subscriptions/cancel - {}", request.subscription_id);

    state.reconciler.cancel(&request.subscription_id).await?;

    Ok(Json(json!({
        "message": "Subscription cancellation scheduled successfully."
    })))
}

// ============ Navigation ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub path: String,
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub redirect: Option<String>,
}

/// POST /api/v1/navigation/resolve
///
/// Returns where a page navigation should be redirected, if anywhere.
pub async fn resolve_navigation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NavigationRequest>,
) -> Json<NavigationResponse> {
    let viewer = ViewerState::from_session(request.authenticated, request.display_name.as_deref());
    let redirect = state.route_guard.resolve(&request.path, viewer);
    tracing::debug!(
        "Navigation to {} as {:?} -> {:?}",
        request.path,
        viewer,
        redirect
    );

    Json(NavigationResponse {
        redirect: redirect.map(str::to_string),
    })
}

// ============ Forms ============

/// POST /api/v1/projects/validate
pub async fn validate_create_form(
    Json(form): Json<CreateProjectForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    form.check()?;
    Ok(Json(json!({ "valid": true })))
}

/// POST /api/v1/projects/validate-update
pub async fn validate_update_form(
    Json(form): Json<UpdateProjectForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    form.check()?;
    Ok(Json(json!({ "valid": true })))
}

// ============ Uploads ============

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub folder: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub path: String,
    pub public_url: String,
}

/// POST /api/v1/uploads/:bucket?folder=
///
/// Stores the raw request body as a new image object.
///
/// # Arguments
///
/// * `bucket` - Must match the configured upload bucket.
/// * `params` - Optional folder, normally the uploader's user id.
/// * `headers` - Must carry the image `Content-Type`.
/// * `body` - The image bytes.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let policy = &state.upload_policy;
    if bucket != policy.bucket {
        return Err(AppError::NotFound(format!("Unknown bucket {}", bucket)));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    policy.check(content_type, body.len())?;

    let path = policy.object_path(params.folder.as_deref(), content_type)?;
    let public_url = state
        .storage
        .upload(&bucket, &path, content_type, body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse { path, public_url }),
    ))
}

// ============ Link preview ============

#[derive(Debug, Deserialize)]
pub struct LinkPreviewParams {
    pub url: Option<String>,
}

/// GET /api/v1/link-preview?url=
pub async fn link_preview(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LinkPreviewParams>,
) -> Result<Json<LinkPreview>, AppError> {
    let url = params.url.unwrap_or_default();
    let preview = state.link_previewer.preview(&url).await?;
    Ok(Json(preview))
}
