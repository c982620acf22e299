//! Gig handlers: start, end, history, announcement and tip toggle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    AnnouncementRequest, EndGigResponse, GigInfoResponse, GigListResponse, StartGigRequest,
    TipToggleRequest,
};
use crate::app_state::AppState;
use crate::domain::{Gig, GigId};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /tenants/{slug}/gig` — Active gig and public payment info.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{slug}/gig",
    tag = "Gigs",
    summary = "Get the active gig",
    description = "Returns the active gig (if any), its announcement and what the client needs to open the payment widget.",
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Active gig info", body = GigInfoResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn active_gig(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let gig = state.registry.get_active_gig(tenant.id).await?;
    let response = GigInfoResponse {
        announcement: gig.as_ref().and_then(|g| g.announcement.clone()),
        tip_enabled: gig.as_ref().is_some_and(|g| g.tip_enabled),
        min_tip: state.config.admission.min_tip,
        currency: state.tips.currency().to_string(),
        payment: state.tips.public_info(&tenant),
        gig,
    };
    Ok(Json(response))
}

/// `GET /tenants/{slug}/gigs` — Gig history.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{slug}/gigs",
    tag = "Gigs",
    summary = "List gigs",
    description = "Returns every gig of the tenant, most recent first, with request counters.",
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Gig history", body = GigListResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn list_gigs(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let data = state.registry.list_gigs(tenant.id).await?;
    Ok(Json(GigListResponse { data }))
}

/// `POST /tenants/{slug}/gig/start` — Start a gig, ending the active one.
///
/// # Errors
///
/// Returns [`GatewayError::GigStartError`] when the store cannot start it.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/gig/start",
    tag = "Gigs",
    summary = "Start a gig",
    description = "Ends the tenant's active gig (if any) and starts a new one atomically.",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = StartGigRequest,
    responses(
        (status = 201, description = "Gig started", body = Gig),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 500, description = "Gig could not be started", body = ErrorResponse),
    )
)]
pub async fn start_gig(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<StartGigRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let gig = state
        .registry
        .start_gig(&tenant, req.name.as_deref(), req.tip_enabled, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(gig)))
}

/// `POST /tenants/{slug}/gig/end` — End the active gig.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/gig/end",
    tag = "Gigs",
    summary = "End the active gig",
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Whether a gig was ended", body = EndGigResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn end_gig(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let ended = state.registry.end_gig(tenant.id, Utc::now()).await?;
    Ok(Json(EndGigResponse { ended }))
}

/// `PUT /gigs/{id}/announcement` — Set or clear the announcement.
///
/// # Errors
///
/// Returns [`GatewayError::GigNotFound`] when the gig is unknown or ended.
#[utoipa::path(
    put,
    path = "/api/v1/gigs/{id}/announcement",
    tag = "Gigs",
    summary = "Set the announcement",
    params(("id" = i64, Path, description = "Gig id")),
    request_body = AnnouncementRequest,
    responses(
        (status = 200, description = "Updated gig", body = Gig),
        (status = 400, description = "Announcement too long", body = ErrorResponse),
        (status = 404, description = "Gig not found or not active", body = ErrorResponse),
    )
)]
pub async fn set_announcement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AnnouncementRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let gig = state
        .registry
        .set_announcement(GigId::new(id), req.announcement.as_deref(), Utc::now())
        .await?;
    Ok(Json(gig))
}

/// `PUT /gigs/{id}/tips` — Enable or disable tips.
///
/// # Errors
///
/// Returns [`GatewayError::GigNotFound`] when the gig is unknown or ended.
#[utoipa::path(
    put,
    path = "/api/v1/gigs/{id}/tips",
    tag = "Gigs",
    summary = "Toggle tips",
    params(("id" = i64, Path, description = "Gig id")),
    request_body = TipToggleRequest,
    responses(
        (status = 200, description = "Updated gig", body = Gig),
        (status = 404, description = "Gig not found or not active", body = ErrorResponse),
    )
)]
pub async fn set_tips(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TipToggleRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let gig = state
        .registry
        .set_tip_enabled(GigId::new(id), req.tip_enabled, Utc::now())
        .await?;
    Ok(Json(gig))
}

/// Gig routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{slug}/gig", get(active_gig))
        .route("/tenants/{slug}/gigs", get(list_gigs))
        .route("/tenants/{slug}/gig/start", post(start_gig))
        .route("/tenants/{slug}/gig/end", post(end_gig))
        .route("/gigs/{id}/announcement", put(set_announcement))
        .route("/gigs/{id}/tips", put(set_tips))
}
