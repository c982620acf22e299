//! Tenant and song reference rows.
//!
//! Both are owned by collaborators outside this crate (account management,
//! catalog import, artist enrichment). The core reads them and only ever
//! writes two columns: `tenants.max_requests` and `songs.requests`.

use serde::Serialize;
use utoipa::ToSchema;

use super::{SongId, TenantId};
use crate::payment::PaymentCredentials;

/// A performer or venue account.
#[derive(Debug, Clone)]
pub struct Tenant {
    /// Store-assigned identifier.
    pub id: TenantId,
    /// URL slug used in QR codes.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Per-tenant request quota; `None` falls back to the global default.
    pub max_requests_per_user: Option<u32>,
    /// Whether new gigs start with tips enabled.
    pub tip_enabled_default: bool,
    /// Tenant-specific payment credentials, overriding the global ones.
    pub payment_credentials: Option<PaymentCredentials>,
}

/// A song in a tenant's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Song {
    /// Store-assigned identifier.
    pub id: SongId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Title.
    pub title: String,
    /// Author or artist.
    pub author: String,
    /// Artist image, filled in by the enrichment job.
    pub image: Option<String>,
    /// Cumulative popularity counter.
    pub requests: i64,
}
