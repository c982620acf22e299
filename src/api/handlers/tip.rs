//! Tip handlers: standalone tips, order creation and capture.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{CaptureRequest, StandaloneTipRequest, parse_amount};
use crate::app_state::AppState;
use crate::domain::{TipIntentId, TipIntentSummary};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{CaptureResult, OrderHandle};

/// `POST /tenants/{slug}/tips` — Tip without a song request.
///
/// # Errors
///
/// Returns the session gate errors, [`GatewayError::TipsDisabled`] or
/// [`GatewayError::TipTooSmall`].
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{slug}/tips",
    tag = "Tips",
    summary = "Create a standalone tip",
    description = "Requires a session bound to an active gig with tips enabled.",
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = StandaloneTipRequest,
    responses(
        (status = 201, description = "Tip intent created", body = TipIntentSummary),
        (status = 409, description = "No active gig or gig changed", body = ErrorResponse),
        (status = 422, description = "Tips disabled or amount too small", body = ErrorResponse),
        (status = 503, description = "Payment provider unavailable", body = ErrorResponse),
    )
)]
pub async fn create_tip(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<StandaloneTipRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let tenant = state.tenant(&slug).await?;
    let amount = parse_amount(Some(req.amount))?;
    let intent = state
        .tips
        .create_standalone(&tenant, &req.session, amount, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(TipIntentSummary::from(&intent))))
}

/// `POST /tips/{id}/order` — Create (or return) the provider order.
///
/// # Errors
///
/// Returns [`GatewayError::TipsTemporarilyUnavailable`] when the provider
/// cannot be reached.
#[utoipa::path(
    post,
    path = "/api/v1/tips/{id}/order",
    tag = "Tips",
    summary = "Create the payment order",
    description = "Idempotent: an intent that already has an order returns it unchanged.",
    params(("id" = i64, Path, description = "Tip intent id")),
    responses(
        (status = 200, description = "Order", body = OrderHandle),
        (status = 404, description = "Tip intent not found", body = ErrorResponse),
        (status = 409, description = "Tip intent not pending", body = ErrorResponse),
        (status = 503, description = "Payment provider unavailable", body = ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let handle = state
        .tips
        .create_order(TipIntentId::new(id), Utc::now())
        .await?;
    Ok(Json(handle))
}

/// `POST /tips/{id}/capture` — Capture an approved order.
///
/// # Errors
///
/// Returns [`GatewayError::OrderMismatch`] or [`GatewayError::NotPending`].
#[utoipa::path(
    post,
    path = "/api/v1/tips/{id}/capture",
    tag = "Tips",
    summary = "Capture the payment",
    params(("id" = i64, Path, description = "Tip intent id")),
    request_body = CaptureRequest,
    responses(
        (status = 200, description = "Terminal intent status", body = CaptureResult),
        (status = 404, description = "Tip intent not found", body = ErrorResponse),
        (status = 409, description = "Tip intent not pending", body = ErrorResponse),
        (status = 422, description = "Order id does not match", body = ErrorResponse),
        (status = 503, description = "Payment provider unavailable", body = ErrorResponse),
    )
)]
pub async fn capture(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CaptureRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let result = state
        .tips
        .capture(TipIntentId::new(id), &req.order_id, Utc::now())
        .await?;
    Ok(Json(result))
}

/// Tip routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{slug}/tips", post(create_tip))
        .route("/tips/{id}/order", post(create_order))
        .route("/tips/{id}/capture", post(capture))
}
