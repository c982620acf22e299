//! Gig registry: owns the "at most one active gig per tenant" invariant.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::retry::{is_unprovisioned, retry_store};
use crate::domain::gig::{MAX_ANNOUNCEMENT_CHARS, normalize_gig_name};
use crate::domain::{EventBus, Gig, GigEvent, GigId, GigSummary, KeyedLocks, NewGig, Tenant, TenantId};
use crate::error::GatewayError;
use crate::persistence::{Store, StoreError};

/// What the store knows about a tenant's current gig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveGigLookup {
    /// The tenant has an active gig.
    Active(Gig),
    /// No gig is active.
    Idle {
        /// Whether the tenant has ever started a gig.
        ever_started: bool,
    },
    /// The gig table is not provisioned in this deployment.
    Unprovisioned,
}

impl ActiveGigLookup {
    /// The active gig, if any.
    #[must_use]
    pub fn into_active(self) -> Option<Gig> {
        match self {
            Self::Active(gig) => Some(gig),
            Self::Idle { .. } | Self::Unprovisioned => None,
        }
    }
}

/// Starts, ends and queries gigs.
///
/// Every mutation emits a [`GigEvent`]. Gig replacement is serialized per
/// tenant in-process and again inside the store transaction.
#[derive(Debug)]
pub struct GigRegistry {
    store: Arc<dyn Store>,
    event_bus: EventBus,
    retry_attempts: u32,
    start_locks: KeyedLocks<TenantId>,
}

impl GigRegistry {
    /// Creates a new `GigRegistry`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, event_bus: EventBus, retry_attempts: u32) -> Self {
        Self {
            store,
            event_bus,
            retry_attempts,
            start_locks: KeyedLocks::new(),
        }
    }

    /// Ends the tenant's active gig (if any) and starts a new one.
    ///
    /// `name` defaults to a timestamp label; `tip_enabled` defaults to the
    /// tenant's setting.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GigStartError`] when the store fails after
    /// retries, including a missing gig table.
    pub async fn start_gig(
        &self,
        tenant: &Tenant,
        name: Option<&str>,
        tip_enabled: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Gig, GatewayError> {
        let new = NewGig {
            tenant_id: tenant.id,
            name: normalize_gig_name(name, now),
            tip_enabled: tip_enabled.unwrap_or(tenant.tip_enabled_default),
            start_time: now,
        };

        let _guard = self.start_locks.lock(tenant.id).await;
        let handover = retry_store("start_gig", self.retry_attempts, || {
            self.store.start_gig(new.clone())
        })
        .await
        .map_err(|err| {
            tracing::error!(tenant_id = %tenant.id, error = %err, "gig start failed");
            GatewayError::GigStartError(err.to_string())
        })?;

        if let Some(ended) = &handover.ended {
            tracing::info!(tenant_id = %tenant.id, gig_id = %ended.id, "gig ended by replacement");
            let _ = self.event_bus.publish(GigEvent::GigEnded {
                tenant_id: tenant.id,
                gig_id: ended.id,
                timestamp: now,
            });
        }

        let gig = handover.started;
        tracing::info!(
            tenant_id = %tenant.id,
            gig_id = %gig.id,
            name = %gig.name,
            tip_enabled = gig.tip_enabled,
            "gig started"
        );
        let _ = self.event_bus.publish(GigEvent::GigStarted {
            tenant_id: tenant.id,
            gig_id: gig.id,
            name: gig.name.clone(),
            tip_enabled: gig.tip_enabled,
            timestamp: now,
        });
        Ok(gig)
    }

    /// Ends the tenant's active gig. Returns `false` if none was active.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn end_gig(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<bool, GatewayError> {
        let ended = match retry_store("end_gig", self.retry_attempts, || {
            self.store.end_active_gig(tenant_id, now)
        })
        .await
        {
            Ok(ended) => ended,
            Err(err) if is_unprovisioned(&err) => None,
            Err(err) => return Err(err.into()),
        };

        let Some(gig) = ended else {
            tracing::debug!(%tenant_id, "end_gig: no active gig");
            return Ok(false);
        };
        tracing::info!(%tenant_id, gig_id = %gig.id, "gig ended");
        let _ = self.event_bus.publish(GigEvent::GigEnded {
            tenant_id,
            gig_id: gig.id,
            timestamp: now,
        });
        Ok(true)
    }

    /// Returns the tenant's active gig. An unprovisioned gig table reads as
    /// "no active gig".
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn get_active_gig(&self, tenant_id: TenantId) -> Result<Option<Gig>, GatewayError> {
        Ok(self.lookup_active(tenant_id).await?.into_active())
    }

    /// Like [`Self::get_active_gig`] but keeps the reason there is no active
    /// gig, which the gating policy needs.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn lookup_active(&self, tenant_id: TenantId) -> Result<ActiveGigLookup, GatewayError> {
        let active = retry_store("active_gig", self.retry_attempts, || {
            self.store.active_gig(tenant_id)
        })
        .await;
        match active {
            Ok(Some(gig)) => Ok(ActiveGigLookup::Active(gig)),
            Ok(None) => {
                let ever_started = retry_store("has_gig_history", self.retry_attempts, || {
                    self.store.has_gig_history(tenant_id)
                })
                .await?;
                Ok(ActiveGigLookup::Idle { ever_started })
            }
            Err(StoreError::NotProvisioned(detail)) => {
                tracing::debug!(%tenant_id, %detail, "gig table not provisioned");
                Ok(ActiveGigLookup::Unprovisioned)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Loads a gig by id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GigNotFound`] if it does not exist.
    pub async fn get_gig(&self, gig_id: GigId) -> Result<Gig, GatewayError> {
        retry_store("get_gig", self.retry_attempts, || self.store.get_gig(gig_id))
            .await
            .map_err(|err| {
                if is_unprovisioned(&err) {
                    GatewayError::GigNotFound(gig_id)
                } else {
                    err.into()
                }
            })?
            .ok_or(GatewayError::GigNotFound(gig_id))
    }

    /// Lists a tenant's gigs, most recent first, with request counters.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn list_gigs(&self, tenant_id: TenantId) -> Result<Vec<GigSummary>, GatewayError> {
        match retry_store("list_gigs", self.retry_attempts, || {
            self.store.list_gigs(tenant_id)
        })
        .await
        {
            Ok(gigs) => Ok(gigs),
            Err(err) if is_unprovisioned(&err) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Sets or clears the announcement shown to the audience of an active
    /// gig. Blank text clears it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the text is too long and
    /// [`GatewayError::GigNotFound`] if the gig is not active.
    pub async fn set_announcement(
        &self,
        gig_id: GigId,
        text: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Gig, GatewayError> {
        let announcement = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if announcement
            .as_ref()
            .is_some_and(|t| t.chars().count() > MAX_ANNOUNCEMENT_CHARS)
        {
            return Err(GatewayError::InvalidRequest(format!(
                "announcement exceeds {MAX_ANNOUNCEMENT_CHARS} characters"
            )));
        }

        let gig = retry_store("set_announcement", self.retry_attempts, || {
            self.store.set_announcement(gig_id, announcement.clone())
        })
        .await?
        .ok_or(GatewayError::GigNotFound(gig_id))?;

        tracing::info!(tenant_id = %gig.tenant_id, %gig_id, cleared = gig.announcement.is_none(), "announcement updated");
        let _ = self.event_bus.publish(GigEvent::AnnouncementChanged {
            tenant_id: gig.tenant_id,
            gig_id,
            announcement: gig.announcement.clone(),
            timestamp: now,
        });
        Ok(gig)
    }

    /// Switches tips on or off for an active gig.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GigNotFound`] if the gig is not active.
    pub async fn set_tip_enabled(
        &self,
        gig_id: GigId,
        tip_enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Gig, GatewayError> {
        let gig = retry_store("set_tip_enabled", self.retry_attempts, || {
            self.store.set_tip_enabled(gig_id, tip_enabled)
        })
        .await?
        .ok_or(GatewayError::GigNotFound(gig_id))?;

        tracing::info!(tenant_id = %gig.tenant_id, %gig_id, tip_enabled, "gig tips toggled");
        let _ = self.event_bus.publish(GigEvent::TipsToggled {
            tenant_id: gig.tenant_id,
            gig_id,
            tip_enabled,
            timestamp: now,
        });
        Ok(gig)
    }
}
