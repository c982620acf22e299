//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::{EventBus, Tenant};
use crate::error::GatewayError;
use crate::payment::PaymentGateway;
use crate::persistence::Store;
use crate::service::{
    AdmissionController, GigRegistry, QueueView, SessionBinder, TipIntentManager,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Persistence backend.
    pub store: Arc<dyn Store>,
    /// Event bus feeding the audit recorder.
    pub event_bus: EventBus,
    /// Gig lifecycle.
    pub registry: Arc<GigRegistry>,
    /// Session gate.
    pub binder: Arc<SessionBinder>,
    /// Request admission and transitions.
    pub admission: Arc<AdmissionController>,
    /// Tip intents and payment capture.
    pub tips: Arc<TipIntentManager>,
    /// Queue reads.
    pub queue: Arc<QueueView>,
    /// Loaded configuration.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Wires the service layer on top of `store` and `gateway`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        config: GatewayConfig,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let admission_settings = config.admission.clone();
        let retry_attempts = admission_settings.store_retry_attempts;

        let registry = Arc::new(GigRegistry::new(
            Arc::clone(&store),
            event_bus.clone(),
            retry_attempts,
        ));
        let binder = Arc::new(SessionBinder::new(
            Arc::clone(&registry),
            admission_settings.gig_gating,
            admission_settings.session_window,
        ));
        let tips = Arc::new(TipIntentManager::new(
            Arc::clone(&store),
            gateway,
            Arc::clone(&binder),
            event_bus.clone(),
            config.payment.clone(),
            &admission_settings,
        ));
        let admission = Arc::new(AdmissionController::new(
            Arc::clone(&store),
            Arc::clone(&binder),
            Arc::clone(&tips),
            event_bus.clone(),
            admission_settings,
        ));
        let queue = Arc::new(QueueView::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            retry_attempts,
        ));

        Self {
            store,
            event_bus,
            registry,
            binder,
            admission,
            tips,
            queue,
            config: Arc::new(config),
        }
    }

    /// Resolves an active tenant by URL slug.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TenantNotFound`] for an unknown slug.
    pub async fn tenant(&self, slug: &str) -> Result<Tenant, GatewayError> {
        self.store
            .get_tenant_by_slug(slug)
            .await?
            .ok_or_else(|| GatewayError::TenantNotFound(slug.to_string()))
    }
}
