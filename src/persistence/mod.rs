//! Persistence layer: the transactional store behind the gig core.
//!
//! [`Store`] is the single shared mutable resource. Every method is one
//! short-lived transaction; none is held across a payment-provider call.
//! Two implementations exist:
//!
//! - [`postgres::PostgresStore`]: production backend over `sqlx::PgPool`.
//!   Invariants are backed by partial unique indexes and advisory locks.
//! - [`memory::InMemoryStore`]: single-process backend for tests and local
//!   development, atomic under one mutex.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Gig, GigHandover, GigId, GigSummary, MinorUnits, NewGig, NewTipIntent, PendingRequestRow,
    RequestId, RequestStatus, SongId, SongRequest, TenantId, Tenant, TipIntent, TipIntentId,
    TipStatus,
};

pub use memory::InMemoryStore;
pub use models::AuditEntry;
pub use postgres::PostgresStore;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by store backends regardless of the underlying engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or the statement failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A required table does not exist yet.
    #[error("schema not provisioned: {0}")]
    NotProvisioned(String),
    /// A uniqueness or serialization conflict; safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A row referenced by the operation does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A stored value could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns `true` for transient failures that a bounded retry may fix.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

/// Everything the store needs to run the admission transaction.
#[derive(Debug, Clone)]
pub struct AdmissionRecord {
    /// Tenant receiving the request.
    pub tenant_id: TenantId,
    /// Active gig, or `None` in legacy (ungated) mode.
    pub gig_id: Option<GigId>,
    /// Requested song.
    pub song_id: SongId,
    /// Trimmed requester display name.
    pub requester: String,
    /// Session correlation id.
    pub session_id: String,
    /// Tip pledged with the request.
    pub tip_amount: MinorUnits,
    /// Quota of pending requests per requester in this gig.
    pub max_requests: u32,
    /// Submission timestamp.
    pub request_time: DateTime<Utc>,
}

/// Outcome of the admission transaction.
#[derive(Debug, Clone)]
pub enum AdmitOutcome {
    /// The request was inserted and the song's popularity incremented.
    Admitted {
        /// The new row.
        request: SongRequest,
        /// One-based position among the tenant's pending requests.
        queue_position: u32,
    },
    /// The requester already has `limit` pending requests.
    QuotaExceeded {
        /// Quota that was applied.
        limit: u32,
    },
    /// The song does not exist in the tenant's catalog.
    SongNotFound,
    /// The requester already has this song pending.
    Duplicate,
}

/// Filter for pending-request reads.
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    /// Restrict to one gig.
    pub gig_id: Option<GigId>,
    /// Restrict to one requester.
    pub requester: Option<String>,
}

/// Transactional persistence for gigs, requests and tip intents.
///
/// Implementations must make each method atomic and uphold:
/// - at most one active gig per tenant ([`Store::start_gig`]);
/// - at most one pending request per `(tenant, gig, song, requester)` and
///   the per-requester quota ([`Store::admit_request`]);
/// - `provider_payment_id` written at most once per intent
///   ([`Store::attach_provider_payment_id`]).
///
/// # Errors
///
/// Every method returns [`StoreError::Unavailable`] on connectivity or
/// driver failure and [`StoreError::NotProvisioned`] when a required table
/// is missing. Lookups report absent rows as `None`; writes that race
/// another writer return [`StoreError::Conflict`].
#[allow(clippy::missing_errors_doc)]
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    // ── Tenants ────────────────────────────────────────────────────────

    /// Loads a tenant by id.
    async fn get_tenant(&self, tenant_id: TenantId) -> StoreResult<Option<Tenant>>;

    /// Loads an active tenant by URL slug.
    async fn get_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>>;

    /// Sets or clears the per-tenant request quota. Returns `false` if the
    /// tenant does not exist.
    async fn set_max_requests(&self, tenant_id: TenantId, max: Option<u32>) -> StoreResult<bool>;

    // ── Gigs ───────────────────────────────────────────────────────────

    /// Ends the tenant's active gig (if any) and inserts `new` as the active
    /// gig, in one serialized transaction.
    async fn start_gig(&self, new: NewGig) -> StoreResult<GigHandover>;

    /// Ends the tenant's active gig. Returns the ended gig, or `None` when
    /// nothing was active.
    async fn end_active_gig(
        &self,
        tenant_id: TenantId,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<Option<Gig>>;

    /// Returns the tenant's active gig.
    async fn active_gig(&self, tenant_id: TenantId) -> StoreResult<Option<Gig>>;

    /// Loads a gig by id.
    async fn get_gig(&self, gig_id: GigId) -> StoreResult<Option<Gig>>;

    /// Lists a tenant's gigs, most recent first, with request counters.
    async fn list_gigs(&self, tenant_id: TenantId) -> StoreResult<Vec<GigSummary>>;

    /// Returns `true` if the tenant has ever started a gig.
    async fn has_gig_history(&self, tenant_id: TenantId) -> StoreResult<bool>;

    /// Updates the announcement of an active gig. Returns the updated gig,
    /// or `None` if the gig does not exist or is not active.
    async fn set_announcement(
        &self,
        gig_id: GigId,
        announcement: Option<String>,
    ) -> StoreResult<Option<Gig>>;

    /// Updates the tip flag of an active gig. Returns the updated gig, or
    /// `None` if the gig does not exist or is not active.
    async fn set_tip_enabled(&self, gig_id: GigId, tip_enabled: bool) -> StoreResult<Option<Gig>>;

    // ── Song requests ──────────────────────────────────────────────────

    /// Runs song-existence, duplicate and quota checks, then increments the
    /// song's popularity and inserts the request, all in one transaction
    /// serialized per `(tenant, gig, requester)`.
    async fn admit_request(&self, record: AdmissionRecord) -> StoreResult<AdmitOutcome>;

    /// Loads a request by id.
    async fn get_request(&self, request_id: RequestId) -> StoreResult<Option<SongRequest>>;

    /// Moves a pending request to `status`. Returns `false` (and changes
    /// nothing) when the request is not pending.
    async fn finish_request(
        &self,
        request_id: RequestId,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Marks every pending request for a song as fulfilled, optionally
    /// restricted to one gig. Returns the number of rows changed.
    async fn fulfill_song(
        &self,
        tenant_id: TenantId,
        gig_id: Option<GigId>,
        song_id: SongId,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Deletes every request of a tenant. Returns the number of rows deleted.
    async fn purge_requests(&self, tenant_id: TenantId) -> StoreResult<u64>;

    /// Pending requests joined with their songs, ordered by
    /// `(request_time, id)` ascending.
    async fn pending_requests(
        &self,
        tenant_id: TenantId,
        filter: PendingFilter,
    ) -> StoreResult<Vec<PendingRequestRow>>;

    // ── Tip intents ────────────────────────────────────────────────────

    /// Inserts a pending tip intent.
    async fn insert_tip_intent(&self, new: NewTipIntent) -> StoreResult<TipIntent>;

    /// Loads a tip intent by id.
    async fn get_tip_intent(&self, intent_id: TipIntentId) -> StoreResult<Option<TipIntent>>;

    /// Returns the most recent pending intent linked to a request.
    async fn pending_tip_for_request(
        &self,
        request_id: RequestId,
    ) -> StoreResult<Option<TipIntent>>;

    /// Sets `provider_payment_id` if it is still unset and returns the
    /// intent as stored afterwards. A concurrent winner's id is kept.
    async fn attach_provider_payment_id(
        &self,
        intent_id: TipIntentId,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<TipIntent>;

    /// Moves a pending intent to `status`. Returns `false` (and changes
    /// nothing) when the intent is not pending.
    async fn finish_tip_intent(
        &self,
        intent_id: TipIntentId,
        status: TipStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // ── Audit / health ─────────────────────────────────────────────────

    /// Appends an audit log row.
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()>;

    /// Round-trips to the backend.
    async fn health_check(&self) -> StoreResult<()>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
