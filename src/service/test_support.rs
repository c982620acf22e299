//! Shared fixtures for service tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::payment::{
    AccessToken, CreatedOrder, OrderRequest, PaymentCredentials, PaymentError, PaymentGateway,
};

/// Scripted payment provider.
#[derive(Debug, Default)]
pub struct FakeGateway {
    pub token_fails: AtomicBool,
    pub create_fails: AtomicBool,
    pub capture_errors: AtomicBool,
    pub capture_declines: AtomicBool,
    /// First capture answers `COMPLETED` after a pause; later ones are
    /// rejected at once, the way the provider treats a repeated capture.
    pub slow_first_capture: AtomicBool,
    pub delay_ms: AtomicU64,
    pub orders_created: AtomicU32,
    pub captures: AtomicU32,
}

impl FakeGateway {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn maybe_delay(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider_name(&self) -> &'static str {
        "paypal"
    }

    async fn get_access_token(
        &self,
        credentials: &PaymentCredentials,
    ) -> Result<AccessToken, PaymentError> {
        self.maybe_delay().await;
        if self.token_fails.load(Ordering::SeqCst) {
            return Err(PaymentError::Unauthorized("bad credentials".into()));
        }
        Ok(AccessToken {
            token: "token".into(),
            mode: credentials.mode,
        })
    }

    async fn create_order(
        &self,
        _token: &AccessToken,
        order: &OrderRequest,
    ) -> Result<CreatedOrder, PaymentError> {
        self.maybe_delay().await;
        if self.create_fails.load(Ordering::SeqCst) {
            return Err(PaymentError::Http("connection refused".into()));
        }
        let n = self.orders_created.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("ORDER-{n}");
        Ok(CreatedOrder {
            raw: json!({ "id": order_id, "status": "CREATED", "amount": order.amount.to_string() }),
            order_id,
        })
    }

    async fn capture_order(
        &self,
        _token: &AccessToken,
        order_id: &str,
    ) -> Result<serde_json::Value, PaymentError> {
        self.maybe_delay().await;
        let previous = self.captures.fetch_add(1, Ordering::SeqCst);
        if self.slow_first_capture.load(Ordering::SeqCst) {
            if previous > 0 {
                return Err(PaymentError::Rejected {
                    status: 422,
                    body: "ORDER_ALREADY_CAPTURED".into(),
                });
            }
            tokio::time::sleep(Duration::from_millis(80)).await;
            return Ok(json!({ "id": order_id, "status": "COMPLETED" }));
        }
        if self.capture_errors.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                status: 422,
                body: "UNPROCESSABLE_ENTITY".into(),
            });
        }
        let status = if self.capture_declines.load(Ordering::SeqCst) {
            "DECLINED"
        } else {
            "COMPLETED"
        };
        Ok(json!({ "id": order_id, "status": status }))
    }
}

pub fn credentials() -> PaymentCredentials {
    PaymentCredentials {
        client_id: "client".into(),
        client_secret: "secret".into(),
        mode: crate::payment::PaymentMode::Sandbox,
    }
}
