//! Database row models and their conversions into domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::StoreError;
use crate::domain::song_request::UnknownStatus;
use crate::domain::{
    Gig, GigId, GigSummary, MinorUnits, PendingRequestRow, RequestId, SongId, SongRequest, Tenant,
    TenantId, TipIntent, TipIntentId,
};
use crate::payment::{PaymentCredentials, PaymentMode};

/// A row of the `audit_logs` table.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Action name (the event type).
    pub action: String,
    /// Kind of entity affected (`gig`, `request`, ...).
    pub entity_type: String,
    /// Affected row id, if a single row.
    pub entity_id: Option<i64>,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Full event payload.
    pub details: serde_json::Value,
    /// Event time.
    pub created_at: DateTime<Utc>,
}

/// `tenants` row.
#[derive(Debug, sqlx::FromRow)]
pub struct TenantRow {
    pub(crate) id: i64,
    pub(crate) slug: String,
    pub(crate) name: String,
    pub(crate) max_requests: Option<i32>,
    pub(crate) tip_enabled_default: bool,
    pub(crate) paypal_client_id: Option<String>,
    pub(crate) paypal_client_secret: Option<String>,
    pub(crate) paypal_mode: Option<String>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        let mode = row
            .paypal_mode
            .as_deref()
            .and_then(|m| m.parse::<PaymentMode>().ok())
            .unwrap_or_default();
        Self {
            id: TenantId::new(row.id),
            slug: row.slug,
            name: row.name,
            max_requests_per_user: row.max_requests.and_then(|m| u32::try_from(m).ok()),
            tip_enabled_default: row.tip_enabled_default,
            payment_credentials: PaymentCredentials::from_parts(
                row.paypal_client_id,
                row.paypal_client_secret,
                mode,
            ),
        }
    }
}

/// `gigs` row.
#[derive(Debug, sqlx::FromRow)]
pub struct GigRow {
    pub(crate) id: i64,
    pub(crate) tenant_id: i64,
    pub(crate) name: String,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) is_active: bool,
    pub(crate) tip_enabled: bool,
    pub(crate) announcement: Option<String>,
}

impl From<GigRow> for Gig {
    fn from(row: GigRow) -> Self {
        Self {
            id: GigId::new(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            name: row.name,
            start_time: row.start_time,
            end_time: row.end_time,
            is_active: row.is_active,
            tip_enabled: row.tip_enabled,
            announcement: row.announcement,
        }
    }
}

/// `gigs` row with aggregated request counters.
#[derive(Debug, sqlx::FromRow)]
pub struct GigSummaryRow {
    #[sqlx(flatten)]
    pub(crate) gig: GigRow,
    pub(crate) request_count: i64,
    pub(crate) fulfilled_count: i64,
}

impl From<GigSummaryRow> for GigSummary {
    fn from(row: GigSummaryRow) -> Self {
        Self {
            gig: row.gig.into(),
            request_count: u64::try_from(row.request_count).unwrap_or(0),
            fulfilled_count: u64::try_from(row.fulfilled_count).unwrap_or(0),
        }
    }
}

/// `song_requests` row.
#[derive(Debug, sqlx::FromRow)]
pub struct RequestRow {
    pub(crate) id: i64,
    pub(crate) song_id: i64,
    pub(crate) tenant_id: i64,
    pub(crate) gig_id: Option<i64>,
    pub(crate) requester: String,
    pub(crate) session_id: String,
    pub(crate) status: String,
    pub(crate) tip_amount_minor: i64,
    pub(crate) request_time: DateTime<Utc>,
    pub(crate) played_at: Option<DateTime<Utc>>,
}

impl TryFrom<RequestRow> for SongRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: RequestId::new(row.id),
            song_id: SongId::new(row.song_id),
            tenant_id: TenantId::new(row.tenant_id),
            gig_id: row.gig_id.map(GigId::new),
            requester: row.requester,
            session_id: row.session_id,
            status: row
                .status
                .parse()
                .map_err(|e: UnknownStatus| StoreError::Corrupt(e.to_string()))?,
            tip_amount: MinorUnits::new(row.tip_amount_minor),
            request_time: row.request_time,
            played_at: row.played_at,
        })
    }
}

/// Pending request joined with its song.
#[derive(Debug, sqlx::FromRow)]
pub struct PendingRow {
    pub(crate) request_id: i64,
    pub(crate) song_id: i64,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) image: Option<String>,
    pub(crate) requester: String,
    pub(crate) request_time: DateTime<Utc>,
    pub(crate) tip_amount_minor: i64,
}

impl From<PendingRow> for PendingRequestRow {
    fn from(row: PendingRow) -> Self {
        Self {
            request_id: RequestId::new(row.request_id),
            song_id: SongId::new(row.song_id),
            title: row.title,
            author: row.author,
            image: row.image,
            requester: row.requester,
            request_time: row.request_time,
            tip_amount: MinorUnits::new(row.tip_amount_minor),
        }
    }
}

/// `tip_intents` row.
#[derive(Debug, sqlx::FromRow)]
pub struct TipIntentRow {
    pub(crate) id: i64,
    pub(crate) musician_id: i64,
    pub(crate) tenant_id: i64,
    pub(crate) user_session_id: String,
    pub(crate) request_id: Option<i64>,
    pub(crate) amount_minor: i64,
    pub(crate) currency: String,
    pub(crate) provider: String,
    pub(crate) provider_payment_id: Option<String>,
    pub(crate) status: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl TryFrom<TipIntentRow> for TipIntent {
    type Error = StoreError;

    fn try_from(row: TipIntentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TipIntentId::new(row.id),
            musician_id: TenantId::new(row.musician_id),
            tenant_id: TenantId::new(row.tenant_id),
            user_session_id: row.user_session_id,
            request_id: row.request_id.map(RequestId::new),
            amount: MinorUnits::new(row.amount_minor),
            currency: row.currency,
            provider: row.provider,
            provider_payment_id: row.provider_payment_id,
            status: row
                .status
                .parse()
                .map_err(|e: UnknownStatus| StoreError::Corrupt(e.to_string()))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RequestStatus, TipStatus};

    fn request_row(status: &str) -> RequestRow {
        RequestRow {
            id: 1,
            song_id: 2,
            tenant_id: 3,
            gig_id: Some(4),
            requester: "Alice".to_string(),
            session_id: "s".to_string(),
            status: status.to_string(),
            tip_amount_minor: 500,
            request_time: Utc::now(),
            played_at: None,
        }
    }

    #[test]
    fn request_row_converts() {
        let converted = SongRequest::try_from(request_row("pending"));
        assert!(matches!(
            converted,
            Ok(SongRequest {
                status: RequestStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn unknown_request_status_is_corrupt() {
        let converted = SongRequest::try_from(request_row("played"));
        assert!(matches!(converted, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn tip_row_converts() {
        let now = Utc::now();
        let row = TipIntentRow {
            id: 1,
            musician_id: 2,
            tenant_id: 2,
            user_session_id: "s".to_string(),
            request_id: None,
            amount_minor: 100,
            currency: "EUR".to_string(),
            provider: "paypal".to_string(),
            provider_payment_id: Some("ORDER".to_string()),
            status: "completed".to_string(),
            created_at: now,
            updated_at: now,
        };
        let converted = TipIntent::try_from(row);
        assert!(matches!(
            converted,
            Ok(TipIntent {
                status: TipStatus::Completed,
                ..
            })
        ));
    }

    #[test]
    fn tenant_without_secret_has_no_credentials() {
        let row = TenantRow {
            id: 1,
            slug: "roberto".to_string(),
            name: "Roberto".to_string(),
            max_requests: Some(2),
            tip_enabled_default: true,
            paypal_client_id: Some("id".to_string()),
            paypal_client_secret: None,
            paypal_mode: Some("live".to_string()),
        };
        let tenant = Tenant::from(row);
        assert_eq!(tenant.max_requests_per_user, Some(2));
        assert!(tenant.payment_credentials.is_none());
    }
}
