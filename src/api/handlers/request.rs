//! Song request handlers: submit, withdraw, played, purge and quota.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    ChangedResponse, CountResponse, MaxRequestsBody, SubmitRequestBody, SubmitRequestResponse,
    WithdrawRequest, parse_amount,
};
use crate::app_state::AppState;
use crate::domain::{RequestId, SongId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /tenants/{slug}/requests` — Submit a song request.
///
/// # Errors
///
/// Returns the admission failure kinds: session and gig gate errors,
/// identity, quota, duplicate, unknown song and tip rule violations.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/requests",
    tag = "Requests",
    summary = "Request a song",
    description = "Queues a song request for the active gig. A pledged tip creates a linked tip intent; if the payment provider is unavailable the request is still queued and `tip_warning` is set.",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = SubmitRequestBody,
    responses(
        (status = 201, description = "Request queued", body = SubmitRequestResponse),
        (status = 400, description = "Missing identity or invalid amount", body = ErrorResponse),
        (status = 401, description = "Session expired", body = ErrorResponse),
        (status = 404, description = "Tenant or song not found", body = ErrorResponse),
        (status = 409, description = "No active gig, gig changed, or duplicate request", body = ErrorResponse),
        (status = 422, description = "Quota exceeded or tip rule violated", body = ErrorResponse),
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<SubmitRequestBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let tip = parse_amount(req.tip_amount)?;
    let mut session = req.session;
    let requester = req
        .requester
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| session.display_name())
        .unwrap_or_default()
        .to_string();

    let now = Utc::now();
    let receipt = state
        .admission
        .submit_request(&tenant, &session, &requester, req.song_id, tip, now)
        .await?;

    session.requester = Some(requester);
    state.binder.touch(&mut session, now);
    Ok((
        StatusCode::CREATED,
        Json(SubmitRequestResponse { receipt, session }),
    ))
}

/// `POST /tenants/{slug}/requests/{id}/withdraw` — Withdraw an own request.
///
/// # Errors
///
/// Returns [`GatewayError::RequestNotFound`] when the request does not
/// belong to the requester.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/requests/{id}/withdraw",
    tag = "Requests",
    summary = "Withdraw a request",
    params(
        ("slug" = String, Path, description = "Tenant slug"),
        ("id" = i64, Path, description = "Request id"),
    ),
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Whether the request was pending", body = ChangedResponse),
        (status = 404, description = "Request not found", body = ErrorResponse),
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i64)>,
    Json(req): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let changed = state
        .admission
        .withdraw(tenant.id, RequestId::new(id), &req.requester, Utc::now())
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// `POST /requests/{id}/played` — Mark one request as played.
///
/// # Errors
///
/// Returns [`GatewayError::RequestNotFound`] for an unknown request.
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/played",
    tag = "Requests",
    summary = "Mark a request as played",
    description = "Idempotent: a request that is no longer pending is left unchanged.",
    params(("id" = i64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Whether the request was pending", body = ChangedResponse),
        (status = 404, description = "Request not found", body = ErrorResponse),
    )
)]
pub async fn mark_played(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let changed = state
        .admission
        .mark_played(RequestId::new(id), Utc::now())
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// `POST /tenants/{slug}/songs/{song_id}/played` — Mark a song as played.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/songs/{song_id}/played",
    tag = "Requests",
    summary = "Mark every request for a song as played",
    params(
        ("slug" = String, Path, description = "Tenant slug"),
        ("song_id" = i64, Path, description = "Song id"),
    ),
    responses(
        (status = 200, description = "Requests fulfilled", body = CountResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn mark_song_played(
    State(state): State<AppState>,
    Path((slug, song_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let count = state
        .admission
        .mark_song_played(tenant.id, SongId::new(song_id), Utc::now())
        .await?;
    Ok(Json(CountResponse { count }))
}

/// `DELETE /tenants/{slug}/requests` — Purge all requests of a tenant.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    delete,
    path = "/api/v1/tenants/{slug}/requests",
    tag = "Requests",
    summary = "Purge requests",
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Requests deleted", body = CountResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn purge(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let count = state.admission.purge_requests(tenant.id, Utc::now()).await?;
    Ok(Json(CountResponse { count }))
}

/// `GET /tenants/{slug}/settings/max-requests` — Effective request quota.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{slug}/settings/max-requests",
    tag = "Requests",
    summary = "Get the request quota",
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Quota", body = MaxRequestsBody),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn get_max_requests(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    Ok(Json(MaxRequestsBody {
        max_requests: state.admission.max_requests(&tenant),
    }))
}

/// `PUT /tenants/{slug}/settings/max-requests` — Set the request quota.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] outside `1..=100`.
#[utoipa::path(
    put,
    path = "/api/v1/tenants/{slug}/settings/max-requests",
    tag = "Requests",
    summary = "Set the request quota",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = MaxRequestsBody,
    responses(
        (status = 200, description = "Quota updated", body = MaxRequestsBody),
        (status = 400, description = "Quota out of range", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
    )
)]
pub async fn set_max_requests(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<MaxRequestsBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let max_requests = state
        .admission
        .set_max_requests(tenant.id, req.max_requests)
        .await?;
    Ok(Json(MaxRequestsBody { max_requests }))
}

/// Song request routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{slug}/requests", post(submit).delete(purge))
        .route("/tenants/{slug}/requests/{id}/withdraw", post(withdraw))
        .route("/requests/{id}/played", post(mark_played))
        .route(
            "/tenants/{slug}/songs/{song_id}/played",
            post(mark_song_played),
        )
        .route(
            "/tenants/{slug}/settings/max-requests",
            get(get_max_requests).put(set_max_requests),
        )
}
