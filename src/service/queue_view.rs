//! Read-side aggregation of the pending queue.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::gig_registry::GigRegistry;
use super::retry::retry_store;
use crate::domain::{MinorUnits, PendingRequestRow, RequestId, SongId, TenantId};
use crate::error::GatewayError;
use crate::persistence::{PendingFilter, Store};

/// One song in the queue with everyone waiting for it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QueueEntry {
    /// Song.
    pub song_id: SongId,
    /// Song title.
    pub title: String,
    /// Song author.
    pub author: String,
    /// Cover image URL.
    pub image: Option<String>,
    /// Requester names in request order.
    pub requesters: Vec<String>,
    /// Pending request ids in request order.
    pub request_ids: Vec<RequestId>,
    /// Time of the longest-waiting request for this song.
    pub earliest_request_time: DateTime<Utc>,
    /// Number of pending requests.
    pub request_count: u32,
    /// Sum of pledged tips.
    pub tip_total: MinorUnits,
}

impl QueueEntry {
    fn start(row: PendingRequestRow) -> Self {
        Self {
            song_id: row.song_id,
            title: row.title,
            author: row.author,
            image: row.image,
            requesters: vec![row.requester],
            request_ids: vec![row.request_id],
            earliest_request_time: row.request_time,
            request_count: 1,
            tip_total: row.tip_amount,
        }
    }

    fn push(&mut self, row: PendingRequestRow) {
        if !self.requesters.contains(&row.requester) {
            self.requesters.push(row.requester);
        }
        self.request_ids.push(row.request_id);
        self.request_count = self.request_count.saturating_add(1);
        self.tip_total = self.tip_total.saturating_add(row.tip_amount);
    }
}

/// Groups pending rows by song. `rows` must be sorted by
/// `(request_time, id)`; the first row seen for a song fixes its position,
/// so the longest-waiting song comes first.
#[must_use]
pub fn group_by_song(rows: Vec<PendingRequestRow>) -> Vec<QueueEntry> {
    let mut index: HashMap<SongId, usize> = HashMap::new();
    let mut entries: Vec<QueueEntry> = Vec::new();
    for row in rows {
        match index.get(&row.song_id).and_then(|&i| entries.get_mut(i)) {
            Some(entry) => entry.push(row),
            None => {
                index.insert(row.song_id, entries.len());
                entries.push(QueueEntry::start(row));
            }
        }
    }
    entries
}

/// Read-only queue queries, scoped to the active gig when there is one.
#[derive(Debug)]
pub struct QueueView {
    store: Arc<dyn Store>,
    registry: Arc<GigRegistry>,
    retry_attempts: u32,
}

impl QueueView {
    /// Creates a new `QueueView`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, registry: Arc<GigRegistry>, retry_attempts: u32) -> Self {
        Self {
            store,
            registry,
            retry_attempts,
        }
    }

    /// The tenant's whole queue, longest-waiting song first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn list_pending(&self, tenant_id: TenantId) -> Result<Vec<QueueEntry>, GatewayError> {
        let rows = self.rows(tenant_id, None).await?;
        Ok(group_by_song(rows))
    }

    /// Same shape as [`Self::list_pending`], limited to one requester.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn list_pending_for_user(
        &self,
        tenant_id: TenantId,
        requester: &str,
    ) -> Result<Vec<QueueEntry>, GatewayError> {
        let rows = self.rows(tenant_id, Some(requester.trim())).await?;
        Ok(group_by_song(rows))
    }

    /// Song ids the requester currently has pending.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on store failure.
    pub async fn requested_song_ids(
        &self,
        tenant_id: TenantId,
        requester: &str,
    ) -> Result<Vec<SongId>, GatewayError> {
        let entries = self.list_pending_for_user(tenant_id, requester).await?;
        Ok(entries.into_iter().map(|entry| entry.song_id).collect())
    }

    async fn rows(
        &self,
        tenant_id: TenantId,
        requester: Option<&str>,
    ) -> Result<Vec<PendingRequestRow>, GatewayError> {
        let gig_id = self
            .registry
            .get_active_gig(tenant_id)
            .await?
            .map(|gig| gig.id);
        let filter = PendingFilter {
            gig_id,
            requester: requester.map(str::to_string),
        };
        Ok(
            retry_store("pending_requests", self.retry_attempts, || {
                self.store.pending_requests(tenant_id, filter.clone())
            })
            .await?,
        )
    }
}
