//! Song requests and their status machine.
//!
//! ```text
//! pending --(performer marks played)--> fulfilled
//! pending --(requester withdraws)-----> cancelled
//! ```
//!
//! Both targets are terminal. Applying an action to a non-pending request is
//! a no-op rather than an error, so retried or duplicated client calls are
//! harmless.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{GigId, MinorUnits, RequestId, SongId, TenantId};

/// Lifecycle status of a [`SongRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting in the queue.
    Pending,
    /// Played by the performer.
    Fulfilled,
    /// Withdrawn by the requester.
    Cancelled,
}

/// Mutation applied to a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// The performer played the song.
    MarkPlayed,
    /// The requester withdrew the request.
    Withdraw,
}

/// Error returned when a status string read from storage is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request status: {0}")]
pub struct UnknownStatus(pub String);

impl RequestStatus {
    /// Column value stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` once no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns the status reached by applying `action`, or `None` when the
    /// action does not apply to the current status.
    #[must_use]
    pub const fn apply(self, action: RequestAction) -> Option<Self> {
        match (self, action) {
            (Self::Pending, RequestAction::MarkPlayed) => Some(Self::Fulfilled),
            (Self::Pending, RequestAction::Withdraw) => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "fulfilled" => Ok(Self::Fulfilled),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A persisted song request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SongRequest {
    /// Store-assigned identifier.
    pub id: RequestId,
    /// Requested song.
    pub song_id: SongId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Gig the request was made in; `None` for legacy rows.
    pub gig_id: Option<GigId>,
    /// Free-text display name of the requester.
    pub requester: String,
    /// Opaque session correlation id.
    pub session_id: String,
    /// Current status.
    pub status: RequestStatus,
    /// Tip pledged with the request, in minor units.
    pub tip_amount: MinorUnits,
    /// Submission time; primary queue ordering key.
    pub request_time: DateTime<Utc>,
    /// When the performer marked the request as played.
    pub played_at: Option<DateTime<Utc>>,
}

/// Pending request joined with its song, as read by the queue view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequestRow {
    /// Request identifier.
    pub request_id: RequestId,
    /// Song identifier.
    pub song_id: SongId,
    /// Song title.
    pub title: String,
    /// Song author or artist.
    pub author: String,
    /// Artist image URL or filename, if enriched.
    pub image: Option<String>,
    /// Requester display name.
    pub requester: String,
    /// Submission time.
    pub request_time: DateTime<Utc>,
    /// Tip pledged with the request.
    pub tip_amount: MinorUnits,
}
