//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Business-rule rejections are expected outcomes that callers render to the
//! audience; store and provider failures are kept distinct from them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{GigId, RequestId, TipIntentId, TipStatus};
use crate::payment::PaymentError;
use crate::persistence::StoreError;

/// `details` value attached to errors that require the client to re-scan
/// the gig QR code.
pub const RESCAN_DETAILS: &str = "rescan";

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "request quota exceeded: at most 3 pending requests",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`GatewayError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details; `"rescan"` asks the client to restart
    /// the QR flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                    |
/// |-----------|-----------------------|--------------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request                |
/// | 2000–2999 | Presence / Not Found  | 401 / 404 / 409                |
/// | 3000–3999 | Server                | 500 / 502 / 503                |
/// | 4000–4999 | Admission / Tip rules | 409 / 422                      |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requester display name is missing.
    #[error("a display name is required before requesting songs")]
    IdentityRequired,

    /// The session's last activity is older than the sliding window.
    #[error("session expired; scan the QR code again")]
    SessionExpired,

    /// The tenant has no active gig.
    #[error("no gig is active right now")]
    NoActiveGig,

    /// The session is bound to a gig that is no longer active.
    #[error("the gig has changed; scan the QR code again")]
    GigChanged,

    /// Tenant slug or id not found.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// Gig not found, or not active when an active gig is required.
    #[error("gig not found or not active: {0}")]
    GigNotFound(GigId),

    /// Song request not found (or not owned by the caller).
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// Tip intent not found.
    #[error("tip intent not found: {0}")]
    TipIntentNotFound(TipIntentId),

    /// The song is not in the tenant's catalog.
    #[error("song not found in this catalog")]
    SongNotFound,

    /// The requester reached the per-gig quota of pending requests.
    #[error("request quota exceeded: at most {limit} pending requests")]
    QuotaExceeded {
        /// Quota that was applied.
        limit: u32,
    },

    /// The requester already has this song pending.
    #[error("you already requested this song")]
    DuplicateRequest,

    /// Tips are switched off for the active gig.
    #[error("tips are disabled for this gig")]
    TipsDisabled,

    /// The tip is below the configured minimum.
    #[error("tip must be at least {minimum}")]
    TipTooSmall {
        /// Minimum accepted amount, in major units.
        minimum: String,
    },

    /// The gig could not be started.
    #[error("could not start gig: {0}")]
    GigStartError(String),

    /// The order id does not belong to the tip intent.
    #[error("order id does not match tip intent")]
    OrderMismatch,

    /// The tip intent already reached a terminal status.
    #[error("tip intent is not pending (status: {0})")]
    NotPending(TipStatus),

    /// The payment provider is unreachable, slow, or not configured.
    #[error("tips are temporarily unavailable: {0}")]
    TipsTemporarilyUnavailable(String),

    /// Persistence layer failure after retries.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::IdentityRequired => 1002,
            Self::SessionExpired => 2001,
            Self::NoActiveGig => 2002,
            Self::GigChanged => 2003,
            Self::TenantNotFound(_) => 2004,
            Self::GigNotFound(_) => 2005,
            Self::RequestNotFound(_) => 2006,
            Self::TipIntentNotFound(_) => 2007,
            Self::SongNotFound => 2008,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::GigStartError(_) => 3002,
            Self::TipsTemporarilyUnavailable(_) => 3003,
            Self::QuotaExceeded { .. } => 4001,
            Self::DuplicateRequest => 4002,
            Self::TipsDisabled => 4003,
            Self::TipTooSmall { .. } => 4004,
            Self::OrderMismatch => 4005,
            Self::NotPending(_) => 4006,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::IdentityRequired => StatusCode::BAD_REQUEST,
            Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::NoActiveGig | Self::GigChanged | Self::DuplicateRequest | Self::NotPending(_) => {
                StatusCode::CONFLICT
            }
            Self::TenantNotFound(_)
            | Self::GigNotFound(_)
            | Self::RequestNotFound(_)
            | Self::TipIntentNotFound(_)
            | Self::SongNotFound => StatusCode::NOT_FOUND,
            Self::QuotaExceeded { .. }
            | Self::TipsDisabled
            | Self::TipTooSmall { .. }
            | Self::OrderMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TipsTemporarilyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceError(_) | Self::GigStartError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` when the client must go back through the QR scan flow.
    #[must_use]
    pub const fn requires_rescan(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired | Self::NoActiveGig | Self::GigChanged
        )
    }

    /// Returns `true` for infrastructure failures the caller may retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PersistenceError(_) | Self::TipsTemporarilyUnavailable(_)
        )
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<PaymentError> for GatewayError {
    fn from(err: PaymentError) -> Self {
        Self::TipsTemporarilyUnavailable(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.requires_rescan().then(|| RESCAN_DETAILS.to_string()),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
