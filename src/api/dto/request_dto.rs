//! Song request DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Session, SongId};
use crate::service::AdmissionReceipt;

/// Request body for `POST /tenants/{slug}/requests`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequestBody {
    /// Session carried by the client.
    pub session: Session,
    /// Requester display name; falls back to the session's name.
    #[serde(default)]
    pub requester: Option<String>,
    /// Requested song.
    pub song_id: SongId,
    /// Optional tip in major units (e.g. `5.00`).
    #[serde(default)]
    pub tip_amount: Option<f64>,
}

/// Request body for `POST /tenants/{slug}/requests/{id}/withdraw`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    /// Name the request was submitted under.
    pub requester: String,
}

/// Request and response body for the max-requests setting.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaxRequestsBody {
    /// Pending requests allowed per requester and gig.
    pub max_requests: u32,
}

/// Response body for `POST /tenants/{slug}/requests`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitRequestResponse {
    /// Admission result.
    #[serde(flatten)]
    pub receipt: AdmissionReceipt,
    /// Session with refreshed liveness and remembered display name.
    pub session: Session,
}
