//! Gig aggregate: one bounded live performance of a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{GigId, TenantId};

/// Maximum length of a gig name, in characters.
pub const MAX_GIG_NAME_CHARS: usize = 120;

/// Maximum length of an audience announcement, in characters.
pub const MAX_ANNOUNCEMENT_CHARS: usize = 500;

/// A persisted gig row.
///
/// At most one gig per tenant has `is_active == true`. Gigs are never
/// deleted; ended gigs remain as history for analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Gig {
    /// Store-assigned identifier.
    pub id: GigId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// When the gig was started.
    pub start_time: DateTime<Utc>,
    /// When the gig was ended, if it has been.
    pub end_time: Option<DateTime<Utc>>,
    /// Whether this is the tenant's current gig.
    pub is_active: bool,
    /// Whether tips may be attached to requests during this gig.
    pub tip_enabled: bool,
    /// Short free-text message shown to the audience on their next poll.
    pub announcement: Option<String>,
}

/// Insert payload for a new active gig.
#[derive(Debug, Clone)]
pub struct NewGig {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name (already defaulted and trimmed).
    pub name: String,
    /// Whether tips are enabled from the start.
    pub tip_enabled: bool,
    /// Start timestamp; also used as `end_time` of the gig it replaces.
    pub start_time: DateTime<Utc>,
}

/// Result of atomically replacing a tenant's active gig.
#[derive(Debug, Clone)]
pub struct GigHandover {
    /// The newly active gig.
    pub started: Gig,
    /// The gig that was active before, now ended.
    pub ended: Option<Gig>,
}

/// Gig history row with request counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GigSummary {
    /// The gig itself.
    #[serde(flatten)]
    pub gig: Gig,
    /// Number of requests submitted during the gig, in any status.
    pub request_count: u64,
    /// Number of requests the performer marked as played.
    pub fulfilled_count: u64,
}

/// Builds the label used when a gig is started without a name.
#[must_use]
pub fn default_gig_name(now: DateTime<Utc>) -> String {
    format!("Gig {}", now.format("%Y-%m-%d %H:%M"))
}

/// Normalizes an optional client-supplied name: trims, truncates to
/// [`MAX_GIG_NAME_CHARS`], and falls back to [`default_gig_name`].
#[must_use]
pub fn normalize_gig_name(name: Option<&str>, now: DateTime<Utc>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.chars().take(MAX_GIG_NAME_CHARS).collect(),
        _ => default_gig_name(now),
    }
}
