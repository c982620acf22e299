//! Session handlers: QR scan, poll and keep-alive.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{ScanRequest, ScanResponse, SessionRequest, SessionResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::SessionStatus;

/// `POST /tenants/{slug}/scan` — Bind a session to the active gig.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/scan",
    tag = "Sessions",
    summary = "Scan the QR code",
    description = "Binds the session to the tenant's active gig. Scanning into a new gig clears the display name, since a new gig is a fresh audience.",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Session bound", body = ScanResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn scan(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let mut session = req.session;
    let gig = state
        .binder
        .bind_on_scan(&mut session, tenant.id, Utc::now())
        .await?;
    if let Some(name) = req.requester.map(|n| n.trim().to_string()) {
        if !name.is_empty() {
            session.requester = Some(name);
        }
    }
    Ok(Json(ScanResponse { session, gig }))
}

/// `POST /tenants/{slug}/session/check` — Poll session validity.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/session/check",
    tag = "Sessions",
    summary = "Check a session",
    description = "Reports whether the session is live and bound to the active gig, and whether the client must re-scan.",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session status", body = SessionStatus),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn check(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let status = state
        .binder
        .check(&req.session, tenant.id, Utc::now())
        .await?;
    Ok(Json(status))
}

/// `POST /tenants/{slug}/session/touch` — Refresh session liveness.
///
/// # Errors
///
/// Returns [`GatewayError::SessionExpired`] when the session already expired.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/session/touch",
    tag = "Sessions",
    summary = "Keep a session alive",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Refreshed session", body = SessionResponse),
        (status = 401, description = "Session expired", body = ErrorResponse),
    )
)]
pub async fn touch(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let _tenant = state.tenant(&slug).await?;
    let now = Utc::now();
    let mut session = req.session;
    if !session.is_live(now, state.binder.window()) {
        return Err(GatewayError::SessionExpired);
    }
    state.binder.touch(&mut session, now);
    Ok(Json(SessionResponse { session }))
}

/// Session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{slug}/scan", post(scan))
        .route("/tenants/{slug}/session/check", post(check))
        .route("/tenants/{slug}/session/touch", post(touch))
}
