//! Queue handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{MyQueueRequest, QueueResponse, SongIdsResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /tenants/{slug}/queue` — Pending songs, longest-waiting first.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{slug}/queue",
    tag = "Queue",
    summary = "Get the queue",
    description = "Pending requests of the active gig grouped by song, ordered by the earliest request time.",
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Queue", body = QueueResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn queue(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let data = state.queue.list_pending(tenant.id).await?;
    Ok(Json(QueueResponse { data }))
}

/// `POST /tenants/{slug}/queue/mine` — The participant's own queue.
///
/// # Errors
///
/// Returns the session gate errors when the session is no longer bound.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/queue/mine",
    tag = "Queue",
    summary = "Get my requests",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = MyQueueRequest,
    responses(
        (status = 200, description = "Own queue", body = QueueResponse),
        (status = 401, description = "Session expired", body = ErrorResponse),
        (status = 409, description = "Gig changed", body = ErrorResponse),
    )
)]
pub async fn my_queue(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<MyQueueRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (tenant_id, requester) = resolve_requester(&state, &slug, &req).await?;
    let data = state
        .queue
        .list_pending_for_user(tenant_id, &requester)
        .await?;
    Ok(Json(QueueResponse { data }))
}

/// `POST /tenants/{slug}/queue/mine/song-ids` — Songs the participant has pending.
///
/// # Errors
///
/// Returns the session gate errors when the session is no longer bound.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/queue/mine/song-ids",
    tag = "Queue",
    summary = "Get my requested song ids",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = MyQueueRequest,
    responses(
        (status = 200, description = "Song ids", body = SongIdsResponse),
        (status = 401, description = "Session expired", body = ErrorResponse),
        (status = 409, description = "Gig changed", body = ErrorResponse),
    )
)]
pub async fn my_song_ids(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<MyQueueRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (tenant_id, requester) = resolve_requester(&state, &slug, &req).await?;
    let song_ids = state
        .queue
        .requested_song_ids(tenant_id, &requester)
        .await?;
    Ok(Json(SongIdsResponse { song_ids }))
}

async fn resolve_requester(
    state: &AppState,
    slug: &str,
    req: &MyQueueRequest,
) -> Result<(crate::domain::TenantId, String), GatewayError> {
    let tenant = state.tenant(slug).await?;
    state
        .binder
        .require_bound(&req.session, tenant.id, chrono::Utc::now())
        .await?;
    let requester = req
        .requester
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| req.session.display_name())
        .ok_or(GatewayError::IdentityRequired)?;
    Ok((tenant.id, requester.to_string()))
}

/// Queue routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{slug}/queue", get(queue))
        .route("/tenants/{slug}/queue/mine", post(my_queue))
        .route("/tenants/{slug}/queue/mine/song-ids", post(my_song_ids))
}
