//! Tip intents and their payment status machine.
//!
//! ```text
//! pending --(order created)--> pending        (only provider_payment_id set)
//!         --(capture ok)-----> completed
//!         --(capture fails)--> failed
//! pending --(administrative)-> cancelled
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::song_request::UnknownStatus;
use super::{MinorUnits, RequestId, TenantId, TipIntentId};

/// Payment status of a [`TipIntent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TipStatus {
    /// Awaiting capture.
    Pending,
    /// Funds captured by the provider.
    Completed,
    /// Capture failed or was declined.
    Failed,
    /// Withdrawn administratively.
    Cancelled,
}

/// Outcome of a capture attempt, as seen by the status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Provider reported the order as completed.
    Completed,
    /// Provider reported any other status, or the call failed.
    NotCompleted,
}

impl TipStatus {
    /// Column value stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` once no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Status reached after a capture attempt, or `None` when the intent is
    /// no longer capturable.
    #[must_use]
    pub const fn after_capture(self, outcome: CaptureOutcome) -> Option<Self> {
        match (self, outcome) {
            (Self::Pending, CaptureOutcome::Completed) => Some(Self::Completed),
            (Self::Pending, CaptureOutcome::NotCompleted) => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TipStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A persisted tip intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TipIntent {
    /// Store-assigned identifier.
    pub id: TipIntentId,
    /// Performer receiving the tip (same as `tenant_id`).
    pub musician_id: TenantId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Session that created the intent.
    pub user_session_id: String,
    /// Linked song request; `None` for a standalone tip.
    pub request_id: Option<RequestId>,
    /// Amount in minor units.
    pub amount: MinorUnits,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Payment provider name.
    pub provider: String,
    /// External order id; stable once set.
    pub provider_payment_id: Option<String>,
    /// Payment status.
    pub status: TipStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a tip intent.
#[derive(Debug, Clone)]
pub struct NewTipIntent {
    /// Owning tenant (and musician).
    pub tenant_id: TenantId,
    /// Creating session.
    pub user_session_id: String,
    /// Linked request, if any.
    pub request_id: Option<RequestId>,
    /// Amount in minor units.
    pub amount: MinorUnits,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Payment provider name.
    pub provider: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Client-facing view of a tip intent: what the browser needs to open the
/// payment widget.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TipIntentSummary {
    /// Intent identifier.
    pub id: TipIntentId,
    /// Amount in minor units.
    pub amount_minor: MinorUnits,
    /// Amount in major units, for display.
    pub amount_major: f64,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Payment provider name.
    pub provider: String,
    /// External order id, once created.
    pub provider_payment_id: Option<String>,
    /// Payment status.
    pub status: TipStatus,
}

impl From<&TipIntent> for TipIntentSummary {
    fn from(intent: &TipIntent) -> Self {
        Self {
            id: intent.id,
            amount_minor: intent.amount,
            amount_major: intent.amount.as_major(),
            currency: intent.currency.clone(),
            provider: intent.provider.clone(),
            provider_payment_id: intent.provider_payment_id.clone(),
            status: intent.status,
        }
    }
}
