//! PayPal REST implementation of [`PaymentGateway`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;

use super::{
    AccessToken, CreatedOrder, OrderRequest, PaymentCredentials, PaymentError, PaymentGateway,
    PaymentMode,
};

/// Response bodies longer than this are truncated in error messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// PayPal Orders v2 client.
///
/// Holds one pooled `reqwest::Client` with a request timeout, so a slow
/// provider fails fast instead of stalling the admission path.
#[derive(Debug, Clone)]
pub struct PayPalGateway {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

impl PayPalGateway {
    /// Creates a gateway whose every call is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Http`] if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    /// REST API root for the given environment.
    #[must_use]
    pub const fn base_url(mode: PaymentMode) -> &'static str {
        match mode {
            PaymentMode::Sandbox => "https://api-m.sandbox.paypal.com",
            PaymentMode::Live => "https://api-m.paypal.com",
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, PaymentError> {
        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PaymentError::Unauthorized(truncate(&body)));
        }
        if !status.is_success() {
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| PaymentError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    fn provider_name(&self) -> &'static str {
        "paypal"
    }

    async fn get_access_token(
        &self,
        credentials: &PaymentCredentials,
    ) -> Result<AccessToken, PaymentError> {
        let url = format!("{}/v1/oauth2/token", Self::base_url(credentials.mode));
        let response = self
            .client
            .post(url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(map_transport)?;

        let raw = Self::read_json(response).await?;
        let parsed: TokenResponse =
            serde_json::from_value(raw).map_err(|e| PaymentError::Malformed(e.to_string()))?;
        Ok(AccessToken {
            token: parsed.access_token,
            mode: credentials.mode,
        })
    }

    async fn create_order(
        &self,
        token: &AccessToken,
        order: &OrderRequest,
    ) -> Result<CreatedOrder, PaymentError> {
        let url = format!("{}/v2/checkout/orders", Self::base_url(token.mode));
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": order.currency,
                    "value": order.amount.to_string(),
                },
                "description": order.description,
            }],
        });
        let response = self
            .client
            .post(url)
            .bearer_auth(&token.token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let raw = Self::read_json(response).await?;
        let parsed: OrderResponse = serde_json::from_value(raw.clone())
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;
        Ok(CreatedOrder {
            order_id: parsed.id,
            raw,
        })
    }

    async fn capture_order(
        &self,
        token: &AccessToken,
        order_id: &str,
    ) -> Result<serde_json::Value, PaymentError> {
        let url = format!(
            "{}/v2/checkout/orders/{order_id}/capture",
            Self::base_url(token.mode)
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&token.token)
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(map_transport)?;

        Self::read_json(response).await
    }
}

fn map_transport(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::Timeout
    } else {
        PaymentError::Http(err.to_string())
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
