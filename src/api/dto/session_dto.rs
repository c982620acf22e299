//! Session DTOs for scan, check and touch.
//!
//! The core never reads ambient session state; clients send the session
//! value they were handed back on every call.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Gig, Session};

/// Request body for `POST /tenants/{slug}/scan`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Session carried by the client; only `session_id` is required.
    pub session: Session,
    /// Display name to set after binding.
    #[serde(default)]
    pub requester: Option<String>,
}

/// Response body for `POST /tenants/{slug}/scan`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScanResponse {
    /// Updated session value to store client-side.
    pub session: Session,
    /// Gig the session is now bound to, if any.
    pub gig: Option<Gig>,
}

/// Request body carrying just a session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionRequest {
    /// Session carried by the client.
    pub session: Session,
}

/// Response body returning an updated session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Updated session value.
    pub session: Session,
}
