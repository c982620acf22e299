//! In-memory implementation of the store.
//!
//! All state lives in one [`MemoryState`] behind a single `tokio::sync::Mutex`,
//! so every trait method is trivially atomic. Not durable: state is lost on
//! restart. Used by tests and by `STORE_BACKEND=memory` for local runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

use super::{
    AdmissionRecord, AdmitOutcome, AuditEntry, PendingFilter, Store, StoreError, StoreResult,
};
use crate::domain::{
    Gig, GigHandover, GigId, GigSummary, NewGig, NewTipIntent, PendingRequestRow, RequestId,
    RequestStatus, Song, SongId, SongRequest, Tenant, TenantId, TipIntent, TipIntentId, TipStatus,
};

#[derive(Debug)]
struct MemoryState {
    next_id: i64,
    tenants: BTreeMap<TenantId, Tenant>,
    songs: BTreeMap<SongId, Song>,
    gigs: BTreeMap<GigId, Gig>,
    requests: BTreeMap<RequestId, SongRequest>,
    tips: BTreeMap<TipIntentId, TipIntent>,
    audit: Vec<AuditEntry>,
    gigs_provisioned: bool,
    injected_failures: u32,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn gigs_table(&self) -> StoreResult<()> {
        if self.gigs_provisioned {
            Ok(())
        } else {
            Err(StoreError::NotProvisioned("relation \"gigs\" does not exist".into()))
        }
    }

    fn pending_in_scope<'a>(
        &'a self,
        tenant_id: TenantId,
        gig_id: Option<GigId>,
    ) -> impl Iterator<Item = &'a SongRequest> + 'a {
        self.requests.values().filter(move |r| {
            r.tenant_id == tenant_id && r.gig_id == gig_id && r.status == RequestStatus::Pending
        })
    }

    fn end_active(&mut self, tenant_id: TenantId, at: DateTime<Utc>) -> Option<Gig> {
        let gig = self
            .gigs
            .values_mut()
            .find(|g| g.tenant_id == tenant_id && g.is_active)?;
        gig.is_active = false;
        gig.end_time = Some(at);
        Some(gig.clone())
    }

    fn active_gig_mut(&mut self, gig_id: GigId) -> Option<&mut Gig> {
        self.gigs.get_mut(&gig_id).filter(|g| g.is_active)
    }
}

/// Process-local [`Store`].
#[derive(Debug)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_id: 0,
                tenants: BTreeMap::new(),
                songs: BTreeMap::new(),
                gigs: BTreeMap::new(),
                requests: BTreeMap::new(),
                tips: BTreeMap::new(),
                audit: Vec::new(),
                gigs_provisioned: true,
                injected_failures: 0,
            }),
        }
    }

    async fn state(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.state.lock().await;
        if state.injected_failures > 0 {
            state.injected_failures -= 1;
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(state)
    }

    /// Adds a tenant with default settings and returns it.
    pub async fn insert_tenant(&self, slug: &str, name: &str) -> Tenant {
        let mut state = self.state.lock().await;
        let tenant = Tenant {
            id: TenantId::new(state.next_id()),
            slug: slug.to_string(),
            name: name.to_string(),
            max_requests_per_user: None,
            tip_enabled_default: true,
            payment_credentials: None,
        };
        state.tenants.insert(tenant.id, tenant.clone());
        tenant
    }

    /// Replaces a tenant row, e.g. to configure payment credentials.
    pub async fn update_tenant(&self, tenant: Tenant) {
        self.state.lock().await.tenants.insert(tenant.id, tenant);
    }

    /// Adds a song to a tenant's catalog and returns it.
    pub async fn insert_song(&self, tenant_id: TenantId, title: &str, author: &str) -> Song {
        let mut state = self.state.lock().await;
        let song = Song {
            id: SongId::new(state.next_id()),
            tenant_id,
            title: title.to_string(),
            author: author.to_string(),
            image: None,
            requests: 0,
        };
        state.songs.insert(song.id, song.clone());
        song
    }

    /// Returns a song, including its popularity counter.
    pub async fn song(&self, song_id: SongId) -> Option<Song> {
        self.state.lock().await.songs.get(&song_id).cloned()
    }

    /// Simulates a deployment where the gigs table has not been migrated.
    pub async fn set_gigs_provisioned(&self, provisioned: bool) {
        self.state.lock().await.gigs_provisioned = provisioned;
    }

    /// Makes the next `count` store calls fail with [`StoreError::Unavailable`].
    pub async fn inject_failures(&self, count: u32) {
        self.state.lock().await.injected_failures = count;
    }

    /// Audit rows written so far.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_tenant(&self, tenant_id: TenantId) -> StoreResult<Option<Tenant>> {
        Ok(self.state().await?.tenants.get(&tenant_id).cloned())
    }

    async fn get_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let state = self.state().await?;
        Ok(state.tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn set_max_requests(&self, tenant_id: TenantId, max: Option<u32>) -> StoreResult<bool> {
        let mut state = self.state().await?;
        Ok(match state.tenants.get_mut(&tenant_id) {
            Some(tenant) => {
                tenant.max_requests_per_user = max;
                true
            }
            None => false,
        })
    }

    async fn start_gig(&self, new: NewGig) -> StoreResult<GigHandover> {
        let mut state = self.state().await?;
        state.gigs_table()?;
        let ended = state.end_active(new.tenant_id, new.start_time);
        let started = Gig {
            id: GigId::new(state.next_id()),
            tenant_id: new.tenant_id,
            name: new.name,
            start_time: new.start_time,
            end_time: None,
            is_active: true,
            tip_enabled: new.tip_enabled,
            announcement: None,
        };
        state.gigs.insert(started.id, started.clone());
        Ok(GigHandover { started, ended })
    }

    async fn end_active_gig(
        &self,
        tenant_id: TenantId,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<Option<Gig>> {
        let mut state = self.state().await?;
        state.gigs_table()?;
        Ok(state.end_active(tenant_id, ended_at))
    }

    async fn active_gig(&self, tenant_id: TenantId) -> StoreResult<Option<Gig>> {
        let state = self.state().await?;
        state.gigs_table()?;
        Ok(state
            .gigs
            .values()
            .find(|g| g.tenant_id == tenant_id && g.is_active)
            .cloned())
    }

    async fn get_gig(&self, gig_id: GigId) -> StoreResult<Option<Gig>> {
        let state = self.state().await?;
        state.gigs_table()?;
        Ok(state.gigs.get(&gig_id).cloned())
    }

    async fn list_gigs(&self, tenant_id: TenantId) -> StoreResult<Vec<GigSummary>> {
        let state = self.state().await?;
        state.gigs_table()?;
        let mut summaries: Vec<GigSummary> = state
            .gigs
            .values()
            .filter(|g| g.tenant_id == tenant_id)
            .map(|gig| {
                let in_gig = state.requests.values().filter(|r| r.gig_id == Some(gig.id));
                let (total, fulfilled) = in_gig.fold((0u64, 0u64), |(t, f), r| {
                    (t + 1, f + u64::from(r.status == RequestStatus::Fulfilled))
                });
                GigSummary {
                    gig: gig.clone(),
                    request_count: total,
                    fulfilled_count: fulfilled,
                }
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.gig
                .start_time
                .cmp(&a.gig.start_time)
                .then(b.gig.id.cmp(&a.gig.id))
        });
        Ok(summaries)
    }

    async fn has_gig_history(&self, tenant_id: TenantId) -> StoreResult<bool> {
        let state = self.state().await?;
        state.gigs_table()?;
        Ok(state.gigs.values().any(|g| g.tenant_id == tenant_id))
    }

    async fn set_announcement(
        &self,
        gig_id: GigId,
        announcement: Option<String>,
    ) -> StoreResult<Option<Gig>> {
        let mut state = self.state().await?;
        state.gigs_table()?;
        Ok(state.active_gig_mut(gig_id).map(|gig| {
            gig.announcement = announcement;
            gig.clone()
        }))
    }

    async fn set_tip_enabled(&self, gig_id: GigId, tip_enabled: bool) -> StoreResult<Option<Gig>> {
        let mut state = self.state().await?;
        state.gigs_table()?;
        Ok(state.active_gig_mut(gig_id).map(|gig| {
            gig.tip_enabled = tip_enabled;
            gig.clone()
        }))
    }

    async fn admit_request(&self, record: AdmissionRecord) -> StoreResult<AdmitOutcome> {
        let mut state = self.state().await?;

        let mine: Vec<SongId> = state
            .pending_in_scope(record.tenant_id, record.gig_id)
            .filter(|r| r.requester == record.requester)
            .map(|r| r.song_id)
            .collect();
        let Some(song) = state
            .songs
            .get_mut(&record.song_id)
            .filter(|s| s.tenant_id == record.tenant_id)
        else {
            return Ok(AdmitOutcome::SongNotFound);
        };
        if mine.contains(&record.song_id) {
            return Ok(AdmitOutcome::Duplicate);
        }
        if mine.len() >= usize::try_from(record.max_requests).unwrap_or(usize::MAX) {
            return Ok(AdmitOutcome::QuotaExceeded {
                limit: record.max_requests,
            });
        }
        song.requests += 1;

        let ahead = state
            .pending_in_scope(record.tenant_id, record.gig_id)
            .count();
        let request = SongRequest {
            id: RequestId::new(state.next_id()),
            song_id: record.song_id,
            tenant_id: record.tenant_id,
            gig_id: record.gig_id,
            requester: record.requester,
            session_id: record.session_id,
            status: RequestStatus::Pending,
            tip_amount: record.tip_amount,
            request_time: record.request_time,
            played_at: None,
        };
        state.requests.insert(request.id, request.clone());

        Ok(AdmitOutcome::Admitted {
            request,
            queue_position: u32::try_from(ahead + 1).unwrap_or(u32::MAX),
        })
    }

    async fn get_request(&self, request_id: RequestId) -> StoreResult<Option<SongRequest>> {
        Ok(self.state().await?.requests.get(&request_id).cloned())
    }

    async fn finish_request(
        &self,
        request_id: RequestId,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state().await?;
        let Some(request) = state
            .requests
            .get_mut(&request_id)
            .filter(|r| r.status == RequestStatus::Pending)
        else {
            return Ok(false);
        };
        request.status = status;
        if status == RequestStatus::Fulfilled {
            request.played_at = Some(at);
        }
        Ok(true)
    }

    async fn fulfill_song(
        &self,
        tenant_id: TenantId,
        gig_id: Option<GigId>,
        song_id: SongId,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state().await?;
        let mut changed = 0;
        for request in state.requests.values_mut().filter(|r| {
            r.tenant_id == tenant_id
                && r.song_id == song_id
                && r.status == RequestStatus::Pending
                && gig_id.is_none_or(|g| r.gig_id == Some(g))
        }) {
            request.status = RequestStatus::Fulfilled;
            request.played_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn purge_requests(&self, tenant_id: TenantId) -> StoreResult<u64> {
        let mut state = self.state().await?;
        let before = state.requests.len();
        state.requests.retain(|_, r| r.tenant_id != tenant_id);
        let deleted = before - state.requests.len();
        for tip in state.tips.values_mut() {
            if tip.tenant_id == tenant_id {
                tip.request_id = None;
            }
        }
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }

    async fn pending_requests(
        &self,
        tenant_id: TenantId,
        filter: PendingFilter,
    ) -> StoreResult<Vec<PendingRequestRow>> {
        let state = self.state().await?;
        let mut rows: Vec<PendingRequestRow> = state
            .requests
            .values()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.status == RequestStatus::Pending
                    && filter.gig_id.is_none_or(|g| r.gig_id == Some(g))
                    && filter.requester.as_deref().is_none_or(|n| r.requester == n)
            })
            .filter_map(|r| {
                let song = state.songs.get(&r.song_id)?;
                Some(PendingRequestRow {
                    request_id: r.id,
                    song_id: r.song_id,
                    title: song.title.clone(),
                    author: song.author.clone(),
                    image: song.image.clone(),
                    requester: r.requester.clone(),
                    request_time: r.request_time,
                    tip_amount: r.tip_amount,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.request_time
                .cmp(&b.request_time)
                .then(a.request_id.cmp(&b.request_id))
        });
        Ok(rows)
    }

    async fn insert_tip_intent(&self, new: NewTipIntent) -> StoreResult<TipIntent> {
        let mut state = self.state().await?;
        let intent = TipIntent {
            id: TipIntentId::new(state.next_id()),
            musician_id: new.tenant_id,
            tenant_id: new.tenant_id,
            user_session_id: new.user_session_id,
            request_id: new.request_id,
            amount: new.amount,
            currency: new.currency,
            provider: new.provider,
            provider_payment_id: None,
            status: TipStatus::Pending,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        state.tips.insert(intent.id, intent.clone());
        Ok(intent)
    }

    async fn get_tip_intent(&self, intent_id: TipIntentId) -> StoreResult<Option<TipIntent>> {
        Ok(self.state().await?.tips.get(&intent_id).cloned())
    }

    async fn pending_tip_for_request(
        &self,
        request_id: RequestId,
    ) -> StoreResult<Option<TipIntent>> {
        let state = self.state().await?;
        Ok(state
            .tips
            .values()
            .filter(|t| t.request_id == Some(request_id) && t.status == TipStatus::Pending)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn attach_provider_payment_id(
        &self,
        intent_id: TipIntentId,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<TipIntent> {
        let mut state = self.state().await?;
        let taken = state.tips.values().any(|t| {
            t.id != intent_id && t.provider_payment_id.as_deref() == Some(order_id)
        });
        let intent = state
            .tips
            .get_mut(&intent_id)
            .ok_or_else(|| StoreError::NotFound(format!("tip intent {intent_id}")))?;
        if intent.provider_payment_id.is_none() {
            if taken {
                return Err(StoreError::Conflict(format!(
                    "order {order_id} already attached to another intent"
                )));
            }
            intent.provider_payment_id = Some(order_id.to_string());
            intent.updated_at = at;
        }
        Ok(intent.clone())
    }

    async fn finish_tip_intent(
        &self,
        intent_id: TipIntentId,
        status: TipStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state().await?;
        let Some(intent) = state
            .tips
            .get_mut(&intent_id)
            .filter(|t| t.status == TipStatus::Pending)
        else {
            return Ok(false);
        };
        intent.status = status;
        intent.updated_at = at;
        Ok(true)
    }

    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        self.state().await?.audit.push(entry);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.state().await.map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
