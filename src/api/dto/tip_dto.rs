//! Tip DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::Session;

/// Request body for `POST /tenants/{slug}/tips`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StandaloneTipRequest {
    /// Session carried by the client.
    pub session: Session,
    /// Tip in major units.
    pub amount: f64,
}

/// Request body for `POST /tips/{id}/capture`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CaptureRequest {
    /// Provider order id the client approved.
    pub order_id: String,
}
