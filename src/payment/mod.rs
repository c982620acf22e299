//! Payment provider seam.
//!
//! [`PaymentGateway`] is the only contract the tip flow needs from an
//! external provider: obtain an access token, create an order, capture an
//! order. [`paypal::PayPalGateway`] is the production implementation.

pub mod paypal;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::MinorUnits;

pub use paypal::PayPalGateway;

/// Provider environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Test environment; no real money moves.
    #[default]
    Sandbox,
    /// Production environment.
    Live,
}

impl PaymentMode {
    /// Stored / configured string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Live => "live",
        }
    }
}

impl FromStr for PaymentMode {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "live" => Ok(Self::Live),
            other => Err(PaymentError::Malformed(format!(
                "unknown payment mode: {other}"
            ))),
        }
    }
}

/// Client credentials for one provider account.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentCredentials {
    /// Public client id (also handed to the browser widget).
    pub client_id: String,
    /// Client secret. Never logged.
    pub client_secret: String,
    /// Environment the credentials belong to.
    pub mode: PaymentMode,
}

impl PaymentCredentials {
    /// Builds credentials when both halves are present and non-empty.
    #[must_use]
    pub fn from_parts(
        client_id: Option<String>,
        client_secret: Option<String>,
        mode: PaymentMode,
    ) -> Option<Self> {
        let client_id = client_id.filter(|v| !v.trim().is_empty())?;
        let client_secret = client_secret.filter(|v| !v.trim().is_empty())?;
        Some(Self {
            client_id,
            client_secret,
            mode,
        })
    }
}

impl fmt::Debug for PaymentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("mode", &self.mode)
            .finish()
    }
}

/// Bearer token issued by the provider.
#[derive(Clone)]
pub struct AccessToken {
    /// Raw token value.
    pub token: String,
    /// Environment the token is valid for.
    pub mode: PaymentMode,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("mode", &self.mode)
            .finish()
    }
}

/// Order creation parameters.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Amount to charge.
    pub amount: MinorUnits,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Human-readable description shown on the payer's statement.
    pub description: String,
}

/// An order accepted by the provider.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    /// Provider order id.
    pub order_id: String,
    /// Full provider response.
    pub raw: serde_json::Value,
}

/// Errors raised by a [`PaymentGateway`].
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Credentials were rejected.
    #[error("payment provider rejected credentials: {0}")]
    Unauthorized(String),
    /// The provider did not answer within the configured timeout.
    #[error("payment provider timed out")]
    Timeout,
    /// Transport-level failure.
    #[error("payment provider unreachable: {0}")]
    Http(String),
    /// The provider answered with a non-success status.
    #[error("payment provider returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// The provider response could not be interpreted.
    #[error("malformed payment provider response: {0}")]
    Malformed(String),
}

/// External payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync + fmt::Debug {
    /// Provider name stored on tip intents (e.g. `"paypal"`).
    fn provider_name(&self) -> &'static str;

    /// Exchanges client credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] when the provider is unreachable or rejects
    /// the credentials.
    async fn get_access_token(
        &self,
        credentials: &PaymentCredentials,
    ) -> Result<AccessToken, PaymentError>;

    /// Creates a capture-intent order.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] when the provider refuses or cannot be reached.
    async fn create_order(
        &self,
        token: &AccessToken,
        order: &OrderRequest,
    ) -> Result<CreatedOrder, PaymentError>;

    /// Captures a previously approved order and returns the raw provider
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] when the provider refuses or cannot be reached.
    async fn capture_order(
        &self,
        token: &AccessToken,
        order_id: &str,
    ) -> Result<serde_json::Value, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("LIVE".parse::<PaymentMode>().ok(), Some(PaymentMode::Live));
        assert_eq!(
            " sandbox ".parse::<PaymentMode>().ok(),
            Some(PaymentMode::Sandbox)
        );
        assert!("prod".parse::<PaymentMode>().is_err());
    }

    #[test]
    fn credentials_require_both_parts() {
        assert!(
            PaymentCredentials::from_parts(Some("id".into()), None, PaymentMode::Sandbox).is_none()
        );
        assert!(
            PaymentCredentials::from_parts(Some("id".into()), Some(" ".into()), PaymentMode::Live)
                .is_none()
        );
        assert!(
            PaymentCredentials::from_parts(Some("id".into()), Some("s".into()), PaymentMode::Live)
                .is_some()
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let Some(creds) =
            PaymentCredentials::from_parts(Some("id".into()), Some("hunter2".into()), PaymentMode::Live)
        else {
            return;
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
