//! Session binder: ties a browser session to the gig it scanned into.
//!
//! A session bound to gig G stops being accepted once G is no longer the
//! tenant's active gig. The audience member has to scan again, and their
//! display name is dropped: a new gig is a new audience.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::gig_registry::{ActiveGigLookup, GigRegistry};
use crate::config::GigGating;
use crate::domain::{Gig, Session, TenantId};
use crate::error::GatewayError;

/// How a session relates to the tenant's current gig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The session is bound to the active gig.
    Bound(Gig),
    /// Gating does not apply to this tenant; requests need no gig.
    Legacy,
    /// Gating applies and no gig is active.
    NoActiveGig,
    /// A gig is active but the session is not bound to it.
    Stale {
        /// The gig the session should scan into.
        active: Gig,
    },
}

impl Binding {
    /// `true` for [`Binding::Bound`] and [`Binding::Legacy`].
    #[must_use]
    pub const fn allows_interaction(&self) -> bool {
        matches!(self, Self::Bound(_) | Self::Legacy)
    }
}

/// Answer to a client's session poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionStatus {
    /// Last activity lies within the sliding window.
    pub valid: bool,
    /// The session may interact with the current gig.
    pub bound: bool,
    /// The client must restart the QR flow.
    pub rescan_required: bool,
}

/// Binds sessions at scan time and checks bindings afterwards.
#[derive(Debug)]
pub struct SessionBinder {
    registry: Arc<GigRegistry>,
    gating: GigGating,
    window: chrono::Duration,
}

impl SessionBinder {
    /// Creates a new `SessionBinder`.
    #[must_use]
    pub fn new(registry: Arc<GigRegistry>, gating: GigGating, window: chrono::Duration) -> Self {
        Self {
            registry,
            gating,
            window,
        }
    }

    /// Sliding expiration window.
    #[must_use]
    pub const fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Registry the binder resolves active gigs through.
    #[must_use]
    pub fn registry(&self) -> &Arc<GigRegistry> {
        &self.registry
    }

    /// Handles a QR scan: binds `session` to the tenant's active gig, or
    /// clears a stale binding when none is active. Returns the bound gig.
    ///
    /// Scanning into a different tenant or gig than before resets the
    /// display name.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn bind_on_scan(
        &self,
        session: &mut Session,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Gig>, GatewayError> {
        if session.tenant_id != Some(tenant_id) {
            session.reset_audience();
            session.tenant_id = Some(tenant_id);
        }

        let active = self.registry.get_active_gig(tenant_id).await?;
        match &active {
            Some(gig) => {
                if session.gig_id != Some(gig.id) {
                    session.reset_audience();
                }
                session.gig_id = Some(gig.id);
                session.gig_verified_at = Some(now);
                tracing::debug!(%tenant_id, gig_id = %gig.id, session_id = %session.session_id, "session bound");
            }
            None => {
                session.gig_id = None;
                session.gig_verified_at = None;
                tracing::debug!(%tenant_id, session_id = %session.session_id, "scan without active gig");
            }
        }
        session.touch(now);
        Ok(active)
    }

    /// Classifies the session against the tenant's current gig and the
    /// gating policy.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn resolve(&self, session: &Session, tenant_id: TenantId) -> Result<Binding, GatewayError> {
        let lookup = self.registry.lookup_active(tenant_id).await?;
        Ok(match lookup {
            ActiveGigLookup::Active(gig) => {
                if session.tenant_id == Some(tenant_id) && session.gig_id == Some(gig.id) {
                    Binding::Bound(gig)
                } else {
                    Binding::Stale { active: gig }
                }
            }
            ActiveGigLookup::Idle { ever_started } => match self.gating {
                GigGating::Optional if !ever_started => Binding::Legacy,
                GigGating::Optional | GigGating::Required => Binding::NoActiveGig,
            },
            ActiveGigLookup::Unprovisioned => match self.gating {
                GigGating::Optional => Binding::Legacy,
                GigGating::Required => Binding::NoActiveGig,
            },
        })
    }

    /// `true` iff the session may interact with the tenant right now.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn is_bound_to_active(
        &self,
        session: &Session,
        tenant_id: TenantId,
    ) -> Result<bool, GatewayError> {
        Ok(self.resolve(session, tenant_id).await?.allows_interaction())
    }

    /// Liveness and binding gate shared by every participant-facing write.
    /// Returns the bound gig, or `None` in legacy mode.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::SessionExpired`] when the session is outside the window.
    /// - [`GatewayError::NoActiveGig`] when gating applies and no gig runs.
    /// - [`GatewayError::GigChanged`] when the session is bound elsewhere.
    pub async fn require_bound(
        &self,
        session: &Session,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Gig>, GatewayError> {
        if !session.is_live(now, self.window) {
            tracing::debug!(%tenant_id, session_id = %session.session_id, "session expired");
            return Err(GatewayError::SessionExpired);
        }
        match self.resolve(session, tenant_id).await? {
            Binding::Bound(gig) => Ok(Some(gig)),
            Binding::Legacy => Ok(None),
            Binding::NoActiveGig => Err(GatewayError::NoActiveGig),
            Binding::Stale { active } => {
                tracing::debug!(
                    %tenant_id,
                    session_id = %session.session_id,
                    bound_gig = ?session.gig_id,
                    active_gig = %active.id,
                    "session bound to stale gig"
                );
                Err(GatewayError::GigChanged)
            }
        }
    }

    /// Poll endpoint: reports validity and binding without failing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn check(
        &self,
        session: &Session,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, GatewayError> {
        let valid = session.is_live(now, self.window);
        let bound = self.is_bound_to_active(session, tenant_id).await?;
        Ok(SessionStatus {
            valid,
            bound,
            rescan_required: !(valid && bound),
        })
    }

    /// Refreshes the liveness timestamp.
    pub fn touch(&self, session: &mut Session, now: DateTime<Utc>) {
        session.touch(now);
    }
}
