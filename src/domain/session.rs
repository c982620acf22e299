//! Audience session value.
//!
//! The transport layer (cookies, signed tokens) is outside this crate. The
//! core only ever sees an explicit [`Session`] value, passed into each
//! operation and returned when it changes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{GigId, TenantId};

/// State carried by one audience member's browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Session {
    /// Opaque correlation id, stable for the life of the browser session.
    pub session_id: String,
    /// Tenant the session scanned into.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    /// Display name chosen by the audience member.
    #[serde(default)]
    pub requester: Option<String>,
    /// Gig the session was bound to at scan time.
    #[serde(default)]
    pub gig_id: Option<GigId>,
    /// When the gig binding was last verified.
    #[serde(default)]
    pub gig_verified_at: Option<DateTime<Utc>>,
    /// Liveness timestamp for sliding expiration.
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates an empty, unbound session.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when the last activity lies within `window` of `now`.
    /// A session that never recorded activity is not live.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_activity
            .is_some_and(|last| now.signed_duration_since(last) <= window)
    }

    /// Refreshes the liveness timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    /// Trimmed display name, if one is set and non-empty.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.requester
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Drops the gig binding and display name. A new gig is a fresh
    /// audience, so identity is not carried across.
    pub fn reset_audience(&mut self) {
        self.gig_id = None;
        self.gig_verified_at = None;
        self.requester = None;
    }
}
