//! Queue DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Session, SongId};
use crate::service::QueueEntry;

/// Response body for queue listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueResponse {
    /// Songs, longest-waiting first.
    pub data: Vec<QueueEntry>,
}

/// Request body for the participant's own queue views.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MyQueueRequest {
    /// Session carried by the client.
    pub session: Session,
    /// Requester name; falls back to the session's name.
    #[serde(default)]
    pub requester: Option<String>,
}

/// Response body for `POST /tenants/{slug}/queue/mine/song-ids`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SongIdsResponse {
    /// Songs the requester has pending.
    pub song_ids: Vec<SongId>,
}
