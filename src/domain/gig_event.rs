//! Domain events reflecting gig, request and tip mutations.
//!
//! Every lifecycle change emits a [`GigEvent`] through the
//! [`super::EventBus`]. The audit recorder persists them; nothing on the
//! request path waits for a subscriber.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{GigId, RequestId, SongId, TenantId, TipIntentId, TipStatus};

/// Domain event emitted after every committed mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GigEvent {
    /// A gig became active.
    GigStarted {
        /// Owning tenant.
        tenant_id: TenantId,
        /// New gig.
        gig_id: GigId,
        /// Gig name.
        name: String,
        /// Whether tips are enabled.
        tip_enabled: bool,
        /// Start time.
        timestamp: DateTime<Utc>,
    },

    /// A gig stopped being active, explicitly or because another started.
    GigEnded {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Ended gig.
        gig_id: GigId,
        /// End time.
        timestamp: DateTime<Utc>,
    },

    /// The audience announcement changed.
    AnnouncementChanged {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Gig.
        gig_id: GigId,
        /// New text, `None` when cleared.
        announcement: Option<String>,
        /// Change time.
        timestamp: DateTime<Utc>,
    },

    /// Tips were switched on or off for a gig.
    TipsToggled {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Gig.
        gig_id: GigId,
        /// New value.
        tip_enabled: bool,
        /// Change time.
        timestamp: DateTime<Utc>,
    },

    /// A song request was queued.
    RequestAdmitted {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Gig the request belongs to.
        gig_id: Option<GigId>,
        /// New request.
        request_id: RequestId,
        /// Requested song.
        song_id: SongId,
        /// Requester display name.
        requester: String,
        /// Informational queue position.
        queue_position: u32,
        /// Submission time.
        timestamp: DateTime<Utc>,
    },

    /// The performer marked a request as played.
    RequestFulfilled {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Request.
        request_id: RequestId,
        /// Song.
        song_id: SongId,
        /// Play time.
        timestamp: DateTime<Utc>,
    },

    /// The requester withdrew a request.
    RequestCancelled {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Request.
        request_id: RequestId,
        /// Withdrawal time.
        timestamp: DateTime<Utc>,
    },

    /// All pending requests for a song were marked as played.
    SongPlayed {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Song.
        song_id: SongId,
        /// Number of requests fulfilled.
        fulfilled: u64,
        /// Play time.
        timestamp: DateTime<Utc>,
    },

    /// All requests of a tenant were purged.
    RequestsPurged {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Rows deleted.
        deleted: u64,
        /// Purge time.
        timestamp: DateTime<Utc>,
    },

    /// A tip intent was recorded.
    TipIntentCreated {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Intent.
        intent_id: TipIntentId,
        /// Linked request, if any.
        request_id: Option<RequestId>,
        /// Amount in minor units.
        amount_minor: i64,
        /// Currency code.
        currency: String,
        /// Creation time.
        timestamp: DateTime<Utc>,
    },

    /// An external order was attached to a tip intent.
    TipOrderCreated {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Intent.
        intent_id: TipIntentId,
        /// Provider order id.
        order_id: String,
        /// Creation time.
        timestamp: DateTime<Utc>,
    },

    /// A capture attempt reached a terminal status.
    TipCaptureFinished {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Intent.
        intent_id: TipIntentId,
        /// Terminal status.
        status: TipStatus,
        /// Completion time.
        timestamp: DateTime<Utc>,
    },
}

impl GigEvent {
    /// Returns the tenant the event belongs to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        match self {
            Self::GigStarted { tenant_id, .. }
            | Self::GigEnded { tenant_id, .. }
            | Self::AnnouncementChanged { tenant_id, .. }
            | Self::TipsToggled { tenant_id, .. }
            | Self::RequestAdmitted { tenant_id, .. }
            | Self::RequestFulfilled { tenant_id, .. }
            | Self::RequestCancelled { tenant_id, .. }
            | Self::SongPlayed { tenant_id, .. }
            | Self::RequestsPurged { tenant_id, .. }
            | Self::TipIntentCreated { tenant_id, .. }
            | Self::TipOrderCreated { tenant_id, .. }
            | Self::TipCaptureFinished { tenant_id, .. } => *tenant_id,
        }
    }

    /// Returns the event type as a static string.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::GigStarted { .. } => "gig_started",
            Self::GigEnded { .. } => "gig_ended",
            Self::AnnouncementChanged { .. } => "announcement_changed",
            Self::TipsToggled { .. } => "tips_toggled",
            Self::RequestAdmitted { .. } => "request_admitted",
            Self::RequestFulfilled { .. } => "request_fulfilled",
            Self::RequestCancelled { .. } => "request_cancelled",
            Self::SongPlayed { .. } => "song_played",
            Self::RequestsPurged { .. } => "requests_purged",
            Self::TipIntentCreated { .. } => "tip_intent_created",
            Self::TipOrderCreated { .. } => "tip_order_created",
            Self::TipCaptureFinished { .. } => "tip_capture_finished",
        }
    }

    /// Returns the audited entity as `(entity_type, entity_id)`.
    #[must_use]
    pub const fn entity(&self) -> (&'static str, Option<i64>) {
        match self {
            Self::GigStarted { gig_id, .. }
            | Self::GigEnded { gig_id, .. }
            | Self::AnnouncementChanged { gig_id, .. }
            | Self::TipsToggled { gig_id, .. } => ("gig", Some(gig_id.get())),
            Self::RequestAdmitted { request_id, .. }
            | Self::RequestFulfilled { request_id, .. }
            | Self::RequestCancelled { request_id, .. } => ("request", Some(request_id.get())),
            Self::SongPlayed { song_id, .. } => ("song", Some(song_id.get())),
            Self::RequestsPurged { .. } => ("request", None),
            Self::TipIntentCreated { intent_id, .. }
            | Self::TipOrderCreated { intent_id, .. }
            | Self::TipCaptureFinished { intent_id, .. } => ("tip_intent", Some(intent_id.get())),
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::GigStarted { timestamp, .. }
            | Self::GigEnded { timestamp, .. }
            | Self::AnnouncementChanged { timestamp, .. }
            | Self::TipsToggled { timestamp, .. }
            | Self::RequestAdmitted { timestamp, .. }
            | Self::RequestFulfilled { timestamp, .. }
            | Self::RequestCancelled { timestamp, .. }
            | Self::SongPlayed { timestamp, .. }
            | Self::RequestsPurged { timestamp, .. }
            | Self::TipIntentCreated { timestamp, .. }
            | Self::TipOrderCreated { timestamp, .. }
            | Self::TipCaptureFinished { timestamp, .. } => *timestamp,
        }
    }
}
