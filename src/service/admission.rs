//! Song request admission and request lifecycle.
//!
//! [`AdmissionController::submit_request`] runs the session gate, identity
//! and tip rules in-process, then hands quota, existence and duplicate
//! checks to [`Store::admit_request`], which performs them together with the
//! insert in one transaction. Submissions for the same
//! `(tenant, gig, requester)` are additionally serialized in-process so a
//! burst from one browser never races itself against the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::retry::retry_store;
use super::session_binder::SessionBinder;
use super::tip_intents::TipIntentManager;
use crate::config::AdmissionSettings;
use crate::domain::{
    EventBus, GigEvent, GigId, KeyedLocks, MinorUnits, RequestAction, RequestId, Session, SongId,
    SongRequest, Tenant, TenantId, TipIntentSummary,
};
use crate::error::GatewayError;
use crate::persistence::{AdmissionRecord, AdmitOutcome, Store};

/// Upper bound accepted by [`AdmissionController::set_max_requests`].
pub const MAX_REQUESTS_CEILING: u32 = 100;

type AdmissionKey = (TenantId, Option<GigId>, String);

/// Successful admission.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdmissionReceipt {
    /// The queued request.
    pub request: SongRequest,
    /// One-based position among pending requests at insert time.
    pub queue_position: u32,
    /// Linked tip intent, when a tip was pledged and set up successfully.
    pub tip_intent: Option<TipIntentSummary>,
    /// Why the tip could not be set up; the request is queued regardless.
    pub tip_warning: Option<String>,
}

/// Decides whether song requests may be queued and applies request
/// transitions.
#[derive(Debug)]
pub struct AdmissionController {
    store: Arc<dyn Store>,
    binder: Arc<SessionBinder>,
    tips: Arc<TipIntentManager>,
    event_bus: EventBus,
    settings: AdmissionSettings,
    locks: KeyedLocks<AdmissionKey>,
}

impl AdmissionController {
    /// Creates a new `AdmissionController`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        binder: Arc<SessionBinder>,
        tips: Arc<TipIntentManager>,
        event_bus: EventBus,
        settings: AdmissionSettings,
    ) -> Self {
        Self {
            store,
            binder,
            tips,
            event_bus,
            settings,
            locks: KeyedLocks::new(),
        }
    }

    /// Effective per-requester quota for `tenant`.
    #[must_use]
    pub fn max_requests(&self, tenant: &Tenant) -> u32 {
        tenant
            .max_requests_per_user
            .unwrap_or(self.settings.default_max_requests)
    }

    /// Queues a song request.
    ///
    /// Checks run in this order: session liveness, gig binding, identity,
    /// tip rules, then song existence, duplicates and quota inside the
    /// store transaction, so a repeated pending song always reports
    /// [`GatewayError::DuplicateRequest`]. A tip that passes the rules but cannot be set up
    /// with the payment provider does not fail the request; the receipt
    /// carries a `tip_warning` instead.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::SessionExpired`], [`GatewayError::NoActiveGig`],
    ///   [`GatewayError::GigChanged`] from the session gate.
    /// - [`GatewayError::IdentityRequired`] for a blank requester.
    /// - [`GatewayError::InvalidRequest`] for a negative tip.
    /// - [`GatewayError::TipsDisabled`], [`GatewayError::TipTooSmall`].
    /// - [`GatewayError::QuotaExceeded`], [`GatewayError::SongNotFound`],
    ///   [`GatewayError::DuplicateRequest`].
    /// - [`GatewayError::PersistenceError`] once store retries are exhausted.
    pub async fn submit_request(
        &self,
        tenant: &Tenant,
        session: &Session,
        requester: &str,
        song_id: SongId,
        tip: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<AdmissionReceipt, GatewayError> {
        let gig = self.binder.require_bound(session, tenant.id, now).await?;

        let requester = requester.trim();
        if requester.is_empty() {
            return Err(GatewayError::IdentityRequired);
        }
        if tip.get() < 0 {
            return Err(GatewayError::InvalidRequest("tip amount cannot be negative".into()));
        }
        let tips_enabled = gig
            .as_ref()
            .map_or(tenant.tip_enabled_default, |gig| gig.tip_enabled);
        self.tips.check_tip_allowed(tips_enabled, tip)?;

        let gig_id = gig.as_ref().map(|gig| gig.id);
        let record = AdmissionRecord {
            tenant_id: tenant.id,
            gig_id,
            song_id,
            requester: requester.to_string(),
            session_id: session.session_id.clone(),
            tip_amount: tip,
            max_requests: self.max_requests(tenant),
            request_time: now,
        };

        let outcome = {
            let _guard = self
                .locks
                .lock((tenant.id, gig_id, requester.to_string()))
                .await;
            retry_store("admit_request", self.settings.store_retry_attempts, || {
                self.store.admit_request(record.clone())
            })
            .await?
        };

        let (request, queue_position) = match outcome {
            AdmitOutcome::Admitted {
                request,
                queue_position,
            } => (request, queue_position),
            AdmitOutcome::QuotaExceeded { limit } => {
                tracing::debug!(tenant_id = %tenant.id, requester, limit, "request quota exceeded");
                return Err(GatewayError::QuotaExceeded { limit });
            }
            AdmitOutcome::SongNotFound => {
                tracing::debug!(tenant_id = %tenant.id, %song_id, "requested song not in catalog");
                return Err(GatewayError::SongNotFound);
            }
            AdmitOutcome::Duplicate => {
                tracing::debug!(tenant_id = %tenant.id, %song_id, requester, "duplicate request");
                return Err(GatewayError::DuplicateRequest);
            }
        };

        tracing::info!(
            tenant_id = %tenant.id,
            gig_id = ?gig_id,
            request_id = %request.id,
            %song_id,
            queue_position,
            "request admitted"
        );
        let _ = self.event_bus.publish(GigEvent::RequestAdmitted {
            tenant_id: tenant.id,
            gig_id,
            request_id: request.id,
            song_id,
            requester: request.requester.clone(),
            queue_position,
            timestamp: now,
        });

        let (tip_intent, tip_warning) = if tip.is_positive() {
            match self
                .tips
                .create_intent(tenant, &session.session_id, tip, Some(request.id), now)
                .await
            {
                Ok(intent) => (Some(TipIntentSummary::from(&intent)), None),
                Err(err) => {
                    tracing::warn!(
                        tenant_id = %tenant.id,
                        request_id = %request.id,
                        error = %err,
                        "tip setup failed; request kept"
                    );
                    (None, Some(err.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Ok(AdmissionReceipt {
            request,
            queue_position,
            tip_intent,
            tip_warning,
        })
    }

    /// Sets the tenant's per-requester quota.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] when `max` is outside
    /// `1..=100`, and [`GatewayError::TenantNotFound`] for an unknown tenant.
    pub async fn set_max_requests(&self, tenant_id: TenantId, max: u32) -> Result<u32, GatewayError> {
        if !(1..=MAX_REQUESTS_CEILING).contains(&max) {
            return Err(GatewayError::InvalidRequest(format!(
                "max requests must be between 1 and {MAX_REQUESTS_CEILING}"
            )));
        }
        let updated = retry_store("set_max_requests", self.settings.store_retry_attempts, || {
            self.store.set_max_requests(tenant_id, Some(max))
        })
        .await?;
        if !updated {
            return Err(GatewayError::TenantNotFound(tenant_id.to_string()));
        }
        tracing::info!(%tenant_id, max, "request quota updated");
        Ok(max)
    }

    /// Withdraws a pending request on behalf of its requester. Returns
    /// `false` when the request was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RequestNotFound`] when the request does not
    /// exist or belongs to another tenant or requester.
    pub async fn withdraw(
        &self,
        tenant_id: TenantId,
        request_id: RequestId,
        requester: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let request = self.load_request(request_id).await?;
        if request.tenant_id != tenant_id || request.requester != requester.trim() {
            return Err(GatewayError::RequestNotFound(request_id));
        }
        let changed = self
            .transition(&request, RequestAction::Withdraw, now)
            .await?;
        if changed {
            tracing::info!(%tenant_id, %request_id, "request withdrawn");
            let _ = self.event_bus.publish(GigEvent::RequestCancelled {
                tenant_id,
                request_id,
                timestamp: now,
            });
        }
        Ok(changed)
    }

    /// Marks one request as played. Replaying a terminal request is a no-op
    /// and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RequestNotFound`] for an unknown request.
    pub async fn mark_played(
        &self,
        request_id: RequestId,
        now: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let request = self.load_request(request_id).await?;
        let changed = self
            .transition(&request, RequestAction::MarkPlayed, now)
            .await?;
        if changed {
            tracing::info!(tenant_id = %request.tenant_id, %request_id, "request played");
            let _ = self.event_bus.publish(GigEvent::RequestFulfilled {
                tenant_id: request.tenant_id,
                request_id,
                song_id: request.song_id,
                timestamp: now,
            });
        }
        Ok(changed)
    }

    /// Marks every pending request for a song as played. Scoped to the
    /// active gig when there is one. Returns the number of requests changed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn mark_song_played(
        &self,
        tenant_id: TenantId,
        song_id: SongId,
        now: DateTime<Utc>,
    ) -> Result<u64, GatewayError> {
        let gig_id = self
            .binder
            .registry()
            .get_active_gig(tenant_id)
            .await?
            .map(|gig| gig.id);
        let fulfilled = retry_store("fulfill_song", self.settings.store_retry_attempts, || {
            self.store.fulfill_song(tenant_id, gig_id, song_id, now)
        })
        .await?;
        if fulfilled > 0 {
            tracing::info!(%tenant_id, %song_id, fulfilled, "song played");
            let _ = self.event_bus.publish(GigEvent::SongPlayed {
                tenant_id,
                song_id,
                fulfilled,
                timestamp: now,
            });
        }
        Ok(fulfilled)
    }

    /// Deletes every request of a tenant. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn purge_requests(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<u64, GatewayError> {
        let deleted = retry_store("purge_requests", self.settings.store_retry_attempts, || {
            self.store.purge_requests(tenant_id)
        })
        .await?;
        tracing::warn!(%tenant_id, deleted, "requests purged");
        let _ = self.event_bus.publish(GigEvent::RequestsPurged {
            tenant_id,
            deleted,
            timestamp: now,
        });
        Ok(deleted)
    }

    async fn load_request(&self, request_id: RequestId) -> Result<SongRequest, GatewayError> {
        retry_store("get_request", self.settings.store_retry_attempts, || {
            self.store.get_request(request_id)
        })
        .await?
        .ok_or(GatewayError::RequestNotFound(request_id))
    }

    async fn transition(
        &self,
        request: &SongRequest,
        action: RequestAction,
        now: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let Some(next) = request.status.apply(action) else {
            tracing::debug!(request_id = %request.id, status = %request.status, ?action, "transition ignored");
            return Ok(false);
        };
        Ok(
            retry_store("finish_request", self.settings.store_retry_attempts, || {
                self.store.finish_request(request.id, next, now)
            })
            .await?,
        )
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::config::{GigGating, PaymentSettings};
    use crate::domain::{RequestStatus, Song};
    use crate::payment::PaymentGateway;
    use crate::persistence::InMemoryStore;
    use crate::service::gig_registry::GigRegistry;
    use crate::service::test_support::{FakeGateway, credentials};

    struct Fixture {
        store: Arc<InMemoryStore>,
        gateway: Arc<FakeGateway>,
        registry: Arc<GigRegistry>,
        binder: Arc<SessionBinder>,
        admission: AdmissionController,
        tenant: Tenant,
        song_a: Song,
        song_b: Song,
    }

    async fn fixture(gating: GigGating) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let mut tenant = store.insert_tenant("roberto", "Roberto").await;
        tenant.payment_credentials = Some(credentials());
        store.update_tenant(tenant.clone()).await;
        let song_a = store.insert_song(tenant.id, "Wonderwall", "Oasis").await;
        let song_b = store.insert_song(tenant.id, "Zombie", "The Cranberries").await;

        let gateway = FakeGateway::shared();
        let bus = EventBus::new(64);
        let dyn_store = Arc::clone(&store) as Arc<dyn Store>;
        let settings = AdmissionSettings {
            gig_gating: gating,
            store_retry_attempts: 2,
            ..AdmissionSettings::default()
        };
        let registry = Arc::new(GigRegistry::new(Arc::clone(&dyn_store), bus.clone(), 2));
        let binder = Arc::new(SessionBinder::new(
            Arc::clone(&registry),
            gating,
            settings.session_window,
        ));
        let tips = Arc::new(TipIntentManager::new(
            Arc::clone(&dyn_store),
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            Arc::clone(&binder),
            bus.clone(),
            PaymentSettings::default(),
            &settings,
        ));
        let admission = AdmissionController::new(
            dyn_store,
            Arc::clone(&binder),
            tips,
            bus,
            settings,
        );
        Fixture {
            store,
            gateway,
            registry,
            binder,
            admission,
            tenant,
            song_a,
            song_b,
        }
    }

    async fn start_and_scan(f: &Fixture, tip_enabled: bool) -> Session {
        let Ok(_) = f
            .registry
            .start_gig(&f.tenant, Some("Friday"), Some(tip_enabled), Utc::now())
            .await
        else {
            panic!("gig should start");
        };
        let mut session = Session::new("session-1");
        let Ok(_) = f.binder.bind_on_scan(&mut session, f.tenant.id, Utc::now()).await else {
            panic!("scan should bind");
        };
        session
    }

    #[tokio::test]
    async fn quota_duplicate_and_fulfilment_flow() {
        let f = fixture(GigGating::Required).await;
        let Ok(1) = f.admission.set_max_requests(f.tenant.id, 1).await else {
            panic!("quota should update");
        };
        let Some(tenant) = f.store.get_tenant(f.tenant.id).await.ok().flatten() else {
            panic!("tenant should exist");
        };
        let session = start_and_scan(&f, true).await;
        let now = Utc::now();

        let Ok(first) = f
            .admission
            .submit_request(&tenant, &session, "Alice", f.song_a.id, MinorUnits::ZERO, now)
            .await
        else {
            panic!("first request should be admitted");
        };
        assert_eq!(first.queue_position, 1);

        assert!(matches!(
            f.admission
                .submit_request(&tenant, &session, "Alice", f.song_a.id, MinorUnits::ZERO, now)
                .await,
            Err(GatewayError::DuplicateRequest)
        ));
        assert!(matches!(
            f.admission
                .submit_request(&tenant, &session, "Alice", f.song_b.id, MinorUnits::ZERO, now)
                .await,
            Err(GatewayError::QuotaExceeded { limit: 1 })
        ));

        let Ok(true) = f.admission.mark_played(first.request.id, now).await else {
            panic!("request should be marked played");
        };
        let Ok(false) = f.admission.mark_played(first.request.id, now).await else {
            panic!("replaying a played request should be a no-op");
        };

        assert!(
            f.admission
                .submit_request(&tenant, &session, "Alice", f.song_b.id, MinorUnits::ZERO, now)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn popularity_counter_increments() {
        let f = fixture(GigGating::Required).await;
        let session = start_and_scan(&f, true).await;
        for name in ["Alice", "Bob"] {
            let Ok(_) = f
                .admission
                .submit_request(&f.tenant, &session, name, f.song_a.id, MinorUnits::ZERO, Utc::now())
                .await
            else {
                panic!("request should be admitted");
            };
        }
        let Some(song) = f.store.song(f.song_a.id).await else {
            panic!("song should exist");
        };
        assert_eq!(song.requests, 2);
    }

    #[tokio::test]
    async fn gate_errors_come_first() {
        let f = fixture(GigGating::Required).await;
        let mut session = Session::new("s");
        session.touch(Utc::now());
        assert!(matches!(
            f.admission
                .submit_request(&f.tenant, &session, "", f.song_a.id, MinorUnits::ZERO, Utc::now())
                .await,
            Err(GatewayError::NoActiveGig)
        ));

        let session = start_and_scan(&f, true).await;
        assert!(matches!(
            f.admission
                .submit_request(&f.tenant, &session, "   ", f.song_a.id, MinorUnits::ZERO, Utc::now())
                .await,
            Err(GatewayError::IdentityRequired)
        ));
        assert!(matches!(
            f.admission
                .submit_request(
                    &f.tenant,
                    &session,
                    "Alice",
                    f.song_a.id,
                    MinorUnits::ZERO,
                    Utc::now() + chrono::Duration::hours(13)
                )
                .await,
            Err(GatewayError::SessionExpired)
        ));
        assert!(matches!(
            f.admission
                .submit_request(&f.tenant, &session, "Alice", SongId::new(9_999), MinorUnits::ZERO, Utc::now())
                .await,
            Err(GatewayError::SongNotFound)
        ));
    }

    #[tokio::test]
    async fn tip_rules_and_summary() {
        let f = fixture(GigGating::Required).await;
        let session = start_and_scan(&f, false).await;
        assert!(matches!(
            f.admission
                .submit_request(&f.tenant, &session, "Alice", f.song_a.id, MinorUnits::new(500), Utc::now())
                .await,
            Err(GatewayError::TipsDisabled)
        ));

        let Some(gig_id) = session.gig_id else {
            panic!("session should be bound");
        };
        let Ok(_) = f.registry.set_tip_enabled(gig_id, true, Utc::now()).await else {
            panic!("tips should toggle");
        };
        assert!(matches!(
            f.admission
                .submit_request(&f.tenant, &session, "Alice", f.song_a.id, MinorUnits::new(50), Utc::now())
                .await,
            Err(GatewayError::TipTooSmall { .. })
        ));

        let Ok(receipt) = f
            .admission
            .submit_request(&f.tenant, &session, "Alice", f.song_a.id, MinorUnits::new(500), Utc::now())
            .await
        else {
            panic!("tipped request should be admitted");
        };
        let Some(tip) = receipt.tip_intent else {
            panic!("tip summary expected");
        };
        assert_eq!(tip.amount_minor, MinorUnits::new(500));
        assert!(tip.provider_payment_id.is_some());
        assert!(receipt.tip_warning.is_none());
    }

    #[tokio::test]
    async fn payment_outage_keeps_request() {
        let f = fixture(GigGating::Required).await;
        let session = start_and_scan(&f, true).await;
        f.gateway.token_fails.store(true, Ordering::SeqCst);

        let Ok(receipt) = f
            .admission
            .submit_request(&f.tenant, &session, "Alice", f.song_a.id, MinorUnits::new(500), Utc::now())
            .await
        else {
            panic!("request should be admitted despite payment failure");
        };
        assert!(receipt.tip_intent.is_none());
        assert!(receipt.tip_warning.is_some());
        assert_eq!(receipt.request.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_submissions_respect_quota() {
        let f = fixture(GigGating::Required).await;
        let Ok(_) = f.admission.set_max_requests(f.tenant.id, 2).await else {
            panic!("quota should update");
        };
        let Some(tenant) = f.store.get_tenant(f.tenant.id).await.ok().flatten() else {
            panic!("tenant should exist");
        };
        let session = start_and_scan(&f, true).await;
        let song_c = f.store.insert_song(tenant.id, "Creep", "Radiohead").await;

        let (a, b, c) = tokio::join!(
            f.admission.submit_request(&tenant, &session, "Alice", f.song_a.id, MinorUnits::ZERO, Utc::now()),
            f.admission.submit_request(&tenant, &session, "Alice", f.song_b.id, MinorUnits::ZERO, Utc::now()),
            f.admission.submit_request(&tenant, &session, "Alice", song_c.id, MinorUnits::ZERO, Utc::now()),
        );
        let results = [a, b, c];
        let admitted = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(GatewayError::QuotaExceeded { .. })))
            .count();
        assert_eq!(admitted, 2);
        assert_eq!(rejected, 1);
    }

    #[tokio::test]
    async fn withdraw_checks_ownership() {
        let f = fixture(GigGating::Required).await;
        let session = start_and_scan(&f, true).await;
        let Ok(receipt) = f
            .admission
            .submit_request(&f.tenant, &session, "Alice", f.song_a.id, MinorUnits::ZERO, Utc::now())
            .await
        else {
            panic!("request should be admitted");
        };
        let id = receipt.request.id;

        assert!(matches!(
            f.admission.withdraw(f.tenant.id, id, "Mallory", Utc::now()).await,
            Err(GatewayError::RequestNotFound(_))
        ));
        let Ok(true) = f.admission.withdraw(f.tenant.id, id, "Alice", Utc::now()).await else {
            panic!("owner should withdraw");
        };
        let Ok(false) = f.admission.mark_played(id, Utc::now()).await else {
            panic!("cancelled request should not be played");
        };
    }

    #[tokio::test]
    async fn legacy_mode_admits_without_gig() {
        let f = fixture(GigGating::Optional).await;
        let mut session = Session::new("legacy");
        session.touch(Utc::now());
        let Ok(receipt) = f
            .admission
            .submit_request(&f.tenant, &session, "Alice", f.song_a.id, MinorUnits::ZERO, Utc::now())
            .await
        else {
            panic!("legacy tenant should be admitted");
        };
        assert!(receipt.request.gig_id.is_none());
    }

    #[tokio::test]
    async fn bulk_played_and_purge() {
        let f = fixture(GigGating::Required).await;
        let session = start_and_scan(&f, true).await;
        for name in ["Alice", "Bob"] {
            let Ok(_) = f
                .admission
                .submit_request(&f.tenant, &session, name, f.song_a.id, MinorUnits::ZERO, Utc::now())
                .await
            else {
                panic!("request should be admitted");
            };
        }
        let Ok(2) = f.admission.mark_song_played(f.tenant.id, f.song_a.id, Utc::now()).await else {
            panic!("both requests should be fulfilled");
        };
        let Ok(0) = f.admission.mark_song_played(f.tenant.id, f.song_a.id, Utc::now()).await else {
            panic!("nothing left to fulfil");
        };
        let Ok(2) = f.admission.purge_requests(f.tenant.id, Utc::now()).await else {
            panic!("purge should delete both rows");
        };
    }

    #[tokio::test]
    async fn quota_bounds_are_validated() {
        let f = fixture(GigGating::Required).await;
        assert!(matches!(
            f.admission.set_max_requests(f.tenant.id, 0).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            f.admission.set_max_requests(f.tenant.id, 101).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            f.admission.set_max_requests(TenantId::new(404), 5).await,
            Err(GatewayError::TenantNotFound(_))
        ));
        assert_eq!(f.admission.max_requests(&f.tenant), 3);
    }
}
