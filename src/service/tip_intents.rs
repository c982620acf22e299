//! Tip intents: creation, idempotent order creation and capture.
//!
//! Store transactions are never held across a provider call. Order creation
//! is serialized per intent in-process, and the store only writes the order
//! id when none is set, so concurrent callers converge on one order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::retry::retry_store;
use super::session_binder::SessionBinder;
use crate::config::{AdmissionSettings, PaymentSettings};
use crate::domain::{
    CaptureOutcome, EventBus, GigEvent, KeyedLocks, MinorUnits, NewTipIntent, RequestId, Session,
    Tenant, TipIntent, TipIntentId, TipIntentSummary, TipStatus,
};
use crate::error::GatewayError;
use crate::payment::{OrderRequest, PaymentCredentials, PaymentError, PaymentGateway, PaymentMode};
use crate::persistence::Store;

/// Provider status string that marks a successful capture.
const COMPLETED_STATUS: &str = "COMPLETED";

/// Result of [`TipIntentManager::create_order`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderHandle {
    /// Provider order id stored on the intent.
    pub order_id: String,
    /// Raw provider response; absent when an existing order was returned.
    #[schema(value_type = Option<Object>)]
    pub raw: Option<serde_json::Value>,
    /// Whether this call created the order.
    pub created: bool,
}

/// Result of [`TipIntentManager::capture`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CaptureResult {
    /// Intent after the capture attempt.
    pub intent: TipIntentSummary,
    /// Status reported by the provider, if it answered.
    pub provider_status: Option<String>,
}

/// Client-side payment widget configuration for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentPublicInfo {
    /// Provider name.
    pub provider: String,
    /// Public client id, when credentials are configured.
    pub client_id: Option<String>,
    /// Provider environment.
    pub mode: PaymentMode,
}

/// Creates tip intents and drives them through the payment provider.
#[derive(Debug)]
pub struct TipIntentManager {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    binder: Arc<SessionBinder>,
    event_bus: EventBus,
    payment: PaymentSettings,
    min_tip: MinorUnits,
    currency: String,
    retry_attempts: u32,
    intent_locks: KeyedLocks<TipIntentId>,
}

impl TipIntentManager {
    /// Creates a new `TipIntentManager`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        binder: Arc<SessionBinder>,
        event_bus: EventBus,
        payment: PaymentSettings,
        admission: &AdmissionSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            binder,
            event_bus,
            payment,
            min_tip: admission.min_tip,
            currency: admission.currency.clone(),
            retry_attempts: admission.store_retry_attempts,
            intent_locks: KeyedLocks::new(),
        }
    }

    /// Currency every tip is charged in.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Checks a tip against the gig's tip flag and the minimum amount.
    /// A zero amount always passes.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TipsDisabled`] or [`GatewayError::TipTooSmall`].
    pub fn check_tip_allowed(&self, tips_enabled: bool, amount: MinorUnits) -> Result<(), GatewayError> {
        if !amount.is_positive() {
            return Ok(());
        }
        if !tips_enabled {
            return Err(GatewayError::TipsDisabled);
        }
        if amount < self.min_tip {
            return Err(GatewayError::TipTooSmall {
                minimum: self.min_tip.to_string(),
            });
        }
        Ok(())
    }

    /// Credentials for `tenant`: its own, else the global ones.
    #[must_use]
    pub fn credentials_for(&self, tenant: &Tenant) -> Option<PaymentCredentials> {
        tenant
            .payment_credentials
            .clone()
            .or_else(|| self.payment.credentials.clone())
    }

    /// What the client needs to open the payment widget for `tenant`.
    #[must_use]
    pub fn public_info(&self, tenant: &Tenant) -> PaymentPublicInfo {
        let credentials = self.credentials_for(tenant);
        PaymentPublicInfo {
            provider: self.gateway.provider_name().to_string(),
            mode: credentials.as_ref().map_or(self.payment.mode, |c| c.mode),
            client_id: credentials.map(|c| c.client_id),
        }
    }

    /// Inserts a pending intent and, when credentials are configured,
    /// creates the provider order right away.
    ///
    /// An existing pending intent for the same request and amount is reused,
    /// so retried submissions never produce a second order.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for a non-positive amount.
    /// - [`GatewayError::TipsTemporarilyUnavailable`] when order creation
    ///   fails; the intent stays pending without an order.
    /// - [`GatewayError::PersistenceError`] on store failure.
    pub async fn create_intent(
        &self,
        tenant: &Tenant,
        session_id: &str,
        amount: MinorUnits,
        request_id: Option<RequestId>,
        now: DateTime<Utc>,
    ) -> Result<TipIntent, GatewayError> {
        if !amount.is_positive() {
            return Err(GatewayError::InvalidRequest("tip amount must be positive".into()));
        }

        let existing = match request_id {
            Some(request_id) => retry_store("pending_tip_for_request", self.retry_attempts, || {
                self.store.pending_tip_for_request(request_id)
            })
            .await?
            .filter(|intent| intent.amount == amount),
            None => None,
        };

        let intent = match existing {
            Some(intent) => {
                tracing::debug!(intent_id = %intent.id, "reusing pending tip intent");
                intent
            }
            None => {
                let new = NewTipIntent {
                    tenant_id: tenant.id,
                    user_session_id: session_id.to_string(),
                    request_id,
                    amount,
                    currency: self.currency.clone(),
                    provider: self.gateway.provider_name().to_string(),
                    created_at: now,
                };
                let intent = self.store.insert_tip_intent(new).await?;
                tracing::info!(
                    tenant_id = %tenant.id,
                    intent_id = %intent.id,
                    request_id = ?request_id,
                    amount = %amount,
                    currency = %intent.currency,
                    "tip intent created"
                );
                let _ = self.event_bus.publish(GigEvent::TipIntentCreated {
                    tenant_id: tenant.id,
                    intent_id: intent.id,
                    request_id,
                    amount_minor: amount.get(),
                    currency: intent.currency.clone(),
                    timestamp: now,
                });
                intent
            }
        };

        if intent.provider_payment_id.is_some() || self.credentials_for(tenant).is_none() {
            if intent.provider_payment_id.is_none() {
                tracing::debug!(intent_id = %intent.id, "no payment credentials; order deferred");
            }
            return Ok(intent);
        }

        self.create_order(intent.id, now).await?;
        self.get_intent(intent.id).await
    }

    /// Creates a tip that is not tied to a song request. The session must
    /// be bound to an active gig with tips enabled.
    ///
    /// # Errors
    ///
    /// Returns the session gate errors, [`GatewayError::NoActiveGig`] in
    /// legacy mode, [`GatewayError::TipsDisabled`],
    /// [`GatewayError::TipTooSmall`], or the errors of
    /// [`Self::create_intent`].
    pub async fn create_standalone(
        &self,
        tenant: &Tenant,
        session: &Session,
        amount: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<TipIntent, GatewayError> {
        let gig = self
            .binder
            .require_bound(session, tenant.id, now)
            .await?
            .ok_or(GatewayError::NoActiveGig)?;
        if !amount.is_positive() {
            return Err(GatewayError::TipTooSmall {
                minimum: self.min_tip.to_string(),
            });
        }
        self.check_tip_allowed(gig.tip_enabled, amount)?;
        self.create_intent(tenant, &session.session_id, amount, None, now)
            .await
    }

    /// Loads an intent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TipIntentNotFound`] if it does not exist.
    pub async fn get_intent(&self, intent_id: TipIntentId) -> Result<TipIntent, GatewayError> {
        retry_store("get_tip_intent", self.retry_attempts, || {
            self.store.get_tip_intent(intent_id)
        })
        .await?
        .ok_or(GatewayError::TipIntentNotFound(intent_id))
    }

    /// Creates the provider order for an intent. Idempotent: an intent that
    /// already has an order id returns it unchanged.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::TipIntentNotFound`] for an unknown intent.
    /// - [`GatewayError::NotPending`] for a terminal intent without an order.
    /// - [`GatewayError::TipsTemporarilyUnavailable`] when credentials are
    ///   missing or the provider fails or times out.
    pub async fn create_order(
        &self,
        intent_id: TipIntentId,
        now: DateTime<Utc>,
    ) -> Result<OrderHandle, GatewayError> {
        let _guard = self.intent_locks.lock(intent_id).await;

        let intent = self.get_intent(intent_id).await?;
        if let Some(order_id) = intent.provider_payment_id {
            return Ok(OrderHandle {
                order_id,
                raw: None,
                created: false,
            });
        }
        if intent.status != TipStatus::Pending {
            return Err(GatewayError::NotPending(intent.status));
        }

        let tenant = retry_store("get_tenant", self.retry_attempts, || {
            self.store.get_tenant(intent.tenant_id)
        })
        .await?
        .ok_or_else(|| GatewayError::TenantNotFound(intent.tenant_id.to_string()))?;
        let credentials = self.credentials_for(&tenant).ok_or_else(|| {
            GatewayError::TipsTemporarilyUnavailable("payment provider not configured".into())
        })?;

        let order = OrderRequest {
            amount: intent.amount,
            currency: intent.currency.clone(),
            description: format!("Tip for {}", tenant.name),
        };
        let created = self
            .bounded(async {
                let token = self.gateway.get_access_token(&credentials).await?;
                self.gateway.create_order(&token, &order).await
            })
            .await
            .map_err(|err| {
                tracing::warn!(%intent_id, error = %err, "tip order creation failed");
                GatewayError::from(err)
            })?;

        let stored = retry_store("attach_provider_payment_id", self.retry_attempts, || {
            self.store
                .attach_provider_payment_id(intent_id, &created.order_id, now)
        })
        .await?;
        let Some(order_id) = stored.provider_payment_id else {
            return Err(GatewayError::Internal(format!(
                "order id not persisted for tip intent {intent_id}"
            )));
        };
        if order_id != created.order_id {
            tracing::warn!(%intent_id, kept = %order_id, discarded = %created.order_id, "concurrent order creation; keeping stored order");
            return Ok(OrderHandle {
                order_id,
                raw: None,
                created: false,
            });
        }

        tracing::info!(tenant_id = %intent.tenant_id, %intent_id, %order_id, "tip order created");
        let _ = self.event_bus.publish(GigEvent::TipOrderCreated {
            tenant_id: intent.tenant_id,
            intent_id,
            order_id: order_id.clone(),
            timestamp: now,
        });
        Ok(OrderHandle {
            order_id,
            raw: Some(created.raw),
            created: true,
        })
    }

    /// Captures the order of a pending intent and records the terminal
    /// status: `completed` when the provider reports completion, `failed`
    /// for any other status or a capture error. Captures of one intent are
    /// serialized; a capture that waited on another sees its terminal status
    /// and never reaches the provider.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::OrderMismatch`] when `order_id` is not the intent's order.
    /// - [`GatewayError::NotPending`] when the intent is already terminal.
    /// - [`GatewayError::TipsTemporarilyUnavailable`] when credentials are
    ///   missing or no access token can be obtained; nothing changes then.
    pub async fn capture(
        &self,
        intent_id: TipIntentId,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CaptureResult, GatewayError> {
        let _guard = self.intent_locks.lock(intent_id).await;

        let intent = self.get_intent(intent_id).await?;
        if intent.provider_payment_id.as_deref() != Some(order_id) {
            tracing::debug!(%intent_id, "capture with mismatched order id");
            return Err(GatewayError::OrderMismatch);
        }
        if intent.status != TipStatus::Pending {
            return Err(GatewayError::NotPending(intent.status));
        }

        let tenant = retry_store("get_tenant", self.retry_attempts, || {
            self.store.get_tenant(intent.tenant_id)
        })
        .await?
        .ok_or_else(|| GatewayError::TenantNotFound(intent.tenant_id.to_string()))?;
        let credentials = self.credentials_for(&tenant).ok_or_else(|| {
            GatewayError::TipsTemporarilyUnavailable("payment provider not configured".into())
        })?;
        let token = self
            .bounded(self.gateway.get_access_token(&credentials))
            .await?;

        let captured = self
            .bounded(self.gateway.capture_order(&token, order_id))
            .await;
        let provider_status = match &captured {
            Ok(raw) => raw
                .get("status")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            Err(err) => {
                tracing::warn!(%intent_id, error = %err, "tip capture failed");
                None
            }
        };
        let outcome = if provider_status.as_deref() == Some(COMPLETED_STATUS) {
            CaptureOutcome::Completed
        } else {
            CaptureOutcome::NotCompleted
        };
        let next = intent
            .status
            .after_capture(outcome)
            .ok_or(GatewayError::NotPending(intent.status))?;

        let moved = retry_store("finish_tip_intent", self.retry_attempts, || {
            self.store.finish_tip_intent(intent_id, next, now)
        })
        .await?;
        if !moved {
            let current = self.get_intent(intent_id).await?;
            return Err(GatewayError::NotPending(current.status));
        }

        tracing::info!(
            tenant_id = %intent.tenant_id,
            %intent_id,
            status = %next,
            provider_status = provider_status.as_deref().unwrap_or("-"),
            "tip capture finished"
        );
        let _ = self.event_bus.publish(GigEvent::TipCaptureFinished {
            tenant_id: intent.tenant_id,
            intent_id,
            status: next,
            timestamp: now,
        });

        let intent = self.get_intent(intent_id).await?;
        Ok(CaptureResult {
            intent: TipIntentSummary::from(&intent),
            provider_status,
        })
    }

    /// Runs a provider call under the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, PaymentError>>,
    ) -> Result<T, PaymentError> {
        with_timeout(self.payment.timeout, call).await
    }
}

async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, PaymentError>>,
) -> Result<T, PaymentError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(PaymentError::Timeout))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::config::GigGating;
    use crate::domain::Gig;
    use crate::persistence::InMemoryStore;
    use crate::service::gig_registry::GigRegistry;
    use crate::service::test_support::{FakeGateway, credentials};

    struct Fixture {
        store: Arc<InMemoryStore>,
        gateway: Arc<FakeGateway>,
        registry: Arc<GigRegistry>,
        binder: Arc<SessionBinder>,
        tips: TipIntentManager,
        tenant: Tenant,
    }

    async fn fixture(with_credentials: bool) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let mut tenant = store.insert_tenant("roberto", "Roberto").await;
        if with_credentials {
            tenant.payment_credentials = Some(credentials());
            store.update_tenant(tenant.clone()).await;
        }
        let gateway = FakeGateway::shared();
        let bus = EventBus::new(64);
        let dyn_store = Arc::clone(&store) as Arc<dyn Store>;
        let registry = Arc::new(GigRegistry::new(Arc::clone(&dyn_store), bus.clone(), 1));
        let binder = Arc::new(SessionBinder::new(
            Arc::clone(&registry),
            GigGating::Required,
            chrono::Duration::hours(12),
        ));
        let payment = PaymentSettings {
            timeout: Duration::from_millis(200),
            ..PaymentSettings::default()
        };
        let tips = TipIntentManager::new(
            dyn_store,
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            Arc::clone(&binder),
            bus,
            payment,
            &AdmissionSettings::default(),
        );
        Fixture {
            store,
            gateway,
            registry,
            binder,
            tips,
            tenant,
        }
    }

    async fn bound_session(f: &Fixture, tip_enabled: bool) -> (Session, Gig) {
        let Ok(gig) = f
            .registry
            .start_gig(&f.tenant, None, Some(tip_enabled), Utc::now())
            .await
        else {
            panic!("gig should start");
        };
        let mut session = Session::new("s1");
        let Ok(_) = f.binder.bind_on_scan(&mut session, f.tenant.id, Utc::now()).await else {
            panic!("scan should bind");
        };
        (session, gig)
    }

    #[test]
    fn tip_rules() {
        let tips = TipIntentManager {
            store: Arc::new(InMemoryStore::new()),
            gateway: FakeGateway::shared(),
            binder: Arc::new(SessionBinder::new(
                Arc::new(GigRegistry::new(Arc::new(InMemoryStore::new()), EventBus::new(1), 1)),
                GigGating::Required,
                chrono::Duration::hours(12),
            )),
            event_bus: EventBus::new(1),
            payment: PaymentSettings::default(),
            min_tip: MinorUnits::new(100),
            currency: "EUR".into(),
            retry_attempts: 1,
            intent_locks: KeyedLocks::new(),
        };
        assert!(tips.check_tip_allowed(false, MinorUnits::ZERO).is_ok());
        assert!(matches!(
            tips.check_tip_allowed(true, MinorUnits::new(50)),
            Err(GatewayError::TipTooSmall { .. })
        ));
        assert!(matches!(
            tips.check_tip_allowed(false, MinorUnits::new(500)),
            Err(GatewayError::TipsDisabled)
        ));
        assert!(tips.check_tip_allowed(true, MinorUnits::new(100)).is_ok());
    }

    #[tokio::test]
    async fn intent_without_credentials_defers_order() {
        let f = fixture(false).await;
        let Ok(intent) = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), None, Utc::now())
            .await
        else {
            panic!("intent should be created");
        };
        assert_eq!(intent.status, TipStatus::Pending);
        assert!(intent.provider_payment_id.is_none());
        assert_eq!(f.gateway.orders_created.load(Ordering::SeqCst), 0);

        assert!(matches!(
            f.tips.create_order(intent.id, Utc::now()).await,
            Err(GatewayError::TipsTemporarilyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn intent_with_credentials_creates_order_once() {
        let f = fixture(true).await;
        let Ok(intent) = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), None, Utc::now())
            .await
        else {
            panic!("intent should be created");
        };
        let Some(order_id) = intent.provider_payment_id.clone() else {
            panic!("order should have been created");
        };

        let Ok(again) = f.tips.create_order(intent.id, Utc::now()).await else {
            panic!("create_order should be idempotent");
        };
        assert_eq!(again.order_id, order_id);
        assert!(!again.created);
        assert_eq!(f.gateway.orders_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_order_creation_yields_one_order() {
        let f = fixture(false).await;
        let Ok(intent) = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), None, Utc::now())
            .await
        else {
            panic!("intent should be created");
        };
        let mut tenant = f.tenant.clone();
        tenant.payment_credentials = Some(credentials());
        f.store.update_tenant(tenant).await;
        f.gateway.delay_ms.store(20, Ordering::SeqCst);

        let (a, b) = tokio::join!(
            f.tips.create_order(intent.id, Utc::now()),
            f.tips.create_order(intent.id, Utc::now())
        );
        let (Ok(a), Ok(b)) = (a, b) else {
            panic!("both calls should succeed");
        };
        assert_eq!(a.order_id, b.order_id);
        assert_eq!(f.gateway.orders_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_intent_for_same_request_reuses_order() {
        let f = fixture(true).await;
        let request_id = Some(RequestId::new(999));
        let Ok(first) = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), request_id, Utc::now())
            .await
        else {
            panic!("first intent should be created");
        };
        let Ok(second) = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), request_id, Utc::now())
            .await
        else {
            panic!("second intent should be reused");
        };
        assert_eq!(first.id, second.id);
        assert_eq!(first.provider_payment_id, second.provider_payment_id);
        assert_eq!(f.gateway.orders_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let f = fixture(true).await;
        f.gateway.delay_ms.store(1_000, Ordering::SeqCst);
        let result = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), None, Utc::now())
            .await;
        assert!(matches!(
            result,
            Err(GatewayError::TipsTemporarilyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn capture_completes_pending_intent() {
        let f = fixture(true).await;
        let Ok(intent) = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), None, Utc::now())
            .await
        else {
            panic!("intent should be created");
        };
        let Some(order_id) = intent.provider_payment_id else {
            panic!("order should exist");
        };

        assert!(matches!(
            f.tips.capture(intent.id, "WRONG", Utc::now()).await,
            Err(GatewayError::OrderMismatch)
        ));

        let Ok(result) = f.tips.capture(intent.id, &order_id, Utc::now()).await else {
            panic!("capture should succeed");
        };
        assert_eq!(result.intent.status, TipStatus::Completed);
        assert_eq!(result.provider_status.as_deref(), Some("COMPLETED"));

        assert!(matches!(
            f.tips.capture(intent.id, &order_id, Utc::now()).await,
            Err(GatewayError::NotPending(TipStatus::Completed))
        ));
        assert_eq!(f.gateway.captures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overlapping_captures_reach_the_provider_once() {
        let f = fixture(true).await;
        f.gateway.slow_first_capture.store(true, Ordering::SeqCst);
        let Ok(intent) = f
            .tips
            .create_intent(&f.tenant, "s1", MinorUnits::new(500), None, Utc::now())
            .await
        else {
            panic!("intent should be created");
        };
        let Some(order_id) = intent.provider_payment_id else {
            panic!("order should exist");
        };

        let (first, second) = tokio::join!(
            f.tips.capture(intent.id, &order_id, Utc::now()),
            f.tips.capture(intent.id, &order_id, Utc::now()),
        );
        let results = [first, second];
        let completed = results
            .iter()
            .filter(|r| matches!(r, Ok(c) if c.intent.status == TipStatus::Completed))
            .count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(GatewayError::NotPending(TipStatus::Completed))))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(rejected, 1);
        assert_eq!(f.gateway.captures.load(Ordering::SeqCst), 1);

        let Ok(stored) = f.tips.get_intent(intent.id).await else {
            panic!("intent should exist");
        };
        assert_eq!(stored.status, TipStatus::Completed);
    }

    #[tokio::test]
    async fn declined_or_failed_capture_marks_failed() {
        let f = fixture(true).await;
        for (decline, error) in [(true, false), (false, true)] {
            f.gateway.capture_declines.store(decline, Ordering::SeqCst);
            f.gateway.capture_errors.store(error, Ordering::SeqCst);
            let Ok(intent) = f
                .tips
                .create_intent(&f.tenant, "s1", MinorUnits::new(300), None, Utc::now())
                .await
            else {
                panic!("intent should be created");
            };
            let Some(order_id) = intent.provider_payment_id else {
                panic!("order should exist");
            };
            let Ok(result) = f.tips.capture(intent.id, &order_id, Utc::now()).await else {
                panic!("capture should report a result");
            };
            assert_eq!(result.intent.status, TipStatus::Failed);
        }
    }

    #[tokio::test]
    async fn standalone_tip_requires_enabled_bound_gig() {
        let f = fixture(false).await;
        let mut stray = Session::new("stray");
        stray.touch(Utc::now());
        assert!(matches!(
            f.tips
                .create_standalone(&f.tenant, &stray, MinorUnits::new(500), Utc::now())
                .await,
            Err(GatewayError::NoActiveGig)
        ));

        let (session, gig) = bound_session(&f, false).await;
        assert!(matches!(
            f.tips
                .create_standalone(&f.tenant, &session, MinorUnits::new(500), Utc::now())
                .await,
            Err(GatewayError::TipsDisabled)
        ));

        let Ok(_) = f.registry.set_tip_enabled(gig.id, true, Utc::now()).await else {
            panic!("tips should be enabled");
        };
        let Ok(intent) = f
            .tips
            .create_standalone(&f.tenant, &session, MinorUnits::new(500), Utc::now())
            .await
        else {
            panic!("standalone tip should be created");
        };
        assert!(intent.request_id.is_none());
    }

    #[tokio::test]
    async fn public_info_prefers_tenant_credentials() {
        let f = fixture(false).await;
        let info = f.tips.public_info(&f.tenant);
        assert_eq!(info.provider, "paypal");
        assert!(info.client_id.is_none());
        assert_eq!(info.mode, PaymentMode::Sandbox);

        let mut tenant = f.tenant.clone();
        tenant.payment_credentials = Some(PaymentCredentials {
            client_id: "tenant-client".into(),
            client_secret: "tenant-secret".into(),
            mode: PaymentMode::Live,
        });
        let info = f.tips.public_info(&tenant);
        assert_eq!(info.client_id.as_deref(), Some("tenant-client"));
        assert_eq!(info.mode, PaymentMode::Live);
    }
}
