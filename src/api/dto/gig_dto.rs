//! Gig DTOs: start, announcement, tip toggle and public info.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Gig, GigSummary, MinorUnits};
use crate::service::PaymentPublicInfo;

/// Request body for `POST /tenants/{slug}/gig/start`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartGigRequest {
    /// Gig name; a timestamp label is used when omitted.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether tips are enabled; the tenant default is used when omitted.
    #[serde(default)]
    pub tip_enabled: Option<bool>,
}

/// Response body for `POST /tenants/{slug}/gig/end`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndGigResponse {
    /// `false` when no gig was active.
    pub ended: bool,
}

/// Request body for `PUT /gigs/{id}/announcement`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnnouncementRequest {
    /// New text; `null` or blank clears it.
    #[serde(default)]
    pub announcement: Option<String>,
}

/// Request body for `PUT /gigs/{id}/tips`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TipToggleRequest {
    /// New value.
    pub tip_enabled: bool,
}

/// What the audience page needs: the active gig and how to pay tips.
#[derive(Debug, Serialize, ToSchema)]
pub struct GigInfoResponse {
    /// Active gig, if any.
    pub gig: Option<Gig>,
    /// Announcement of the active gig.
    pub announcement: Option<String>,
    /// Whether tips can currently be attached.
    pub tip_enabled: bool,
    /// Smallest accepted tip, in minor units.
    pub min_tip: MinorUnits,
    /// Currency of every tip.
    pub currency: String,
    /// Payment widget configuration.
    pub payment: PaymentPublicInfo,
}

/// Response body for `GET /tenants/{slug}/gigs`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GigListResponse {
    /// Gigs, most recent first.
    pub data: Vec<GigSummary>,
}
