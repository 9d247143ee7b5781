use crate::errors::AppError;
use crate::handlers::AppState;
use crate::session::{
    build_cookie, claim_cookie_name, expired_cookie, read_cookie, session_cookie,
    validate_short_id, SESSION_MAX_AGE_SECS,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type SetCookies = AppendHeaders<Vec<(HeaderName, String)>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    /// True when this response started a new session.
    pub issued: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub feedback_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub short_id: String,
    pub feedback_id: String,
}

/// Existing session from the cookie, or a freshly issued one plus its cookie.
fn session_or_issue(state: &AppState, headers: &HeaderMap) -> (String, Option<String>) {
    match state.sessions.session_from(headers) {
        Some(token) => (token, None),
        None => {
            let token = state.sessions.issue_token();
            tracing::debug!("Issued new reviewer session");
            let cookie = session_cookie(&token);
            (token, Some(cookie))
        }
    }
}

/// GET /api/v1/session
///
/// Echoes the reviewer session, starting one when the cookie is absent.
pub async fn current_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (SetCookies, Json<SessionResponse>) {
    let (session_id, cookie) = session_or_issue(&state, &headers);
    let issued = cookie.is_some();
    let cookies = cookie
        .map(|c| vec![(header::SET_COOKIE, c)])
        .unwrap_or_default();

    (
        AppendHeaders(cookies),
        Json(SessionResponse { session_id, issued }),
    )
}

/// PUT /api/v1/feedback-claims/:short_id
///
/// Remembers that this session submitted `feedbackId` for the project.
///
/// # Arguments
///
/// * `short_id` - The project's short share id.
/// * `request` - JSON body with `feedbackId`.
///
/// # Returns
///
/// * `Result<(SetCookies, Json<ClaimResponse>), AppError>` - The stored claim, with cookies.
pub async fn put_claim(
    State(state): State<Arc<AppState>>,
    Path(short_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ClaimRequest>,
) -> Result<(SetCookies, Json<ClaimResponse>), AppError> {
    let (session_id, session_cookie) = session_or_issue(&state, &headers);
    let value = state
        .sessions
        .sign_claim(&session_id, &short_id, &request.feedback_id)?;

    let mut cookies: Vec<(HeaderName, String)> = Vec::with_capacity(2);
    if let Some(cookie) = session_cookie {
        cookies.push((header::SET_COOKIE, cookie));
    }
    cookies.push((
        header::SET_COOKIE,
        build_cookie(&claim_cookie_name(&short_id), &value, SESSION_MAX_AGE_SECS),
    ));

    tracing::info!("Stored feedback claim for project {}", short_id);
    Ok((
        AppendHeaders(cookies),
        Json(ClaimResponse {
            short_id,
            feedback_id: request.feedback_id,
        }),
    ))
}

/// GET /api/v1/feedback-claims/:short_id
///
/// 404 when there is no claim, or when it was not signed for this session.
pub async fn get_claim(
    State(state): State<Arc<AppState>>,
    Path(short_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ClaimResponse>, AppError> {
    validate_short_id(&short_id)?;
    let not_found = || AppError::NotFound(format!("No feedback claim for {}", short_id));

    let session_id = state.sessions.session_from(&headers).ok_or_else(not_found)?;
    let value = read_cookie(&headers, &claim_cookie_name(&short_id)).ok_or_else(not_found)?;

    let feedback_id = state
        .sessions
        .verify_claim(&session_id, &short_id, &value)
        .ok_or_else(|| {
            tracing::warn!("Rejected feedback claim cookie for {}", short_id);
            not_found()
        })?;

    Ok(Json(ClaimResponse {
        short_id,
        feedback_id,
    }))
}

/// DELETE /api/v1/feedback-claims/:short_id
pub async fn delete_claim(Path(short_id): Path<String>) -> Result<impl IntoResponse, AppError> {
    validate_short_id(&short_id)?;
    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders(vec![(
            header::SET_COOKIE,
            expired_cookie(&claim_cookie_name(&short_id)),
        )]),
    ))
}
