//! Shared harness for integration tests: an in-memory store, a scripted
//! payment provider and a fully wired [`AppState`].

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use setlist_gateway::app_state::AppState;
use setlist_gateway::config::{GatewayConfig, StoreBackend};
use setlist_gateway::domain::{Session, Song, Tenant};
use setlist_gateway::payment::{
    AccessToken, CreatedOrder, OrderRequest, PaymentCredentials, PaymentError, PaymentGateway,
    PaymentMode,
};
use setlist_gateway::persistence::{InMemoryStore, Store};

/// Payment provider whose behavior is switched by flags.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    pub token_fails: AtomicBool,
    pub capture_declines: AtomicBool,
    /// First capture completes after 100ms; every later capture is
    /// rejected immediately.
    pub slow_first_capture: AtomicBool,
    pub delay_ms: AtomicU64,
    pub orders_created: AtomicU32,
    pub captures: AtomicU32,
}

impl ScriptedGateway {
    async fn pause(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn provider_name(&self) -> &'static str {
        "paypal"
    }

    async fn get_access_token(
        &self,
        credentials: &PaymentCredentials,
    ) -> Result<AccessToken, PaymentError> {
        self.pause().await;
        if self.token_fails.load(Ordering::SeqCst) {
            return Err(PaymentError::Http("provider unreachable".into()));
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
        self.pause().await;
        let n = self.orders_created.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("ORDER-{n}");
        Ok(CreatedOrder {
            raw: json!({ "id": order_id, "status": "CREATED", "value": order.amount.to_string() }),
            order_id,
        })
    }

    async fn capture_order(
        &self,
        _token: &AccessToken,
        order_id: &str,
    ) -> Result<serde_json::Value, PaymentError> {
        self.pause().await;
        let previous = self.captures.fetch_add(1, Ordering::SeqCst);
        if self.slow_first_capture.load(Ordering::SeqCst) {
            if previous > 0 {
                return Err(PaymentError::Rejected {
                    status: 422,
                    body: "ORDER_ALREADY_CAPTURED".into(),
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(json!({ "id": order_id, "status": "COMPLETED" }));
        }
        let status = if self.capture_declines.load(Ordering::SeqCst) {
            "DECLINED"
        } else {
            "COMPLETED"
        };
        Ok(json!({ "id": order_id, "status": status }))
    }
}

/// Everything a scenario needs.
#[derive(Debug)]
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub state: AppState,
    pub tenant: Tenant,
    pub songs: Vec<Song>,
}

/// Default test configuration: memory backend, short payment timeout.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig {
        store_backend: StoreBackend::Memory,
        audit_log_enabled: false,
        ..GatewayConfig::default()
    };
    config.payment.timeout = Duration::from_millis(500);
    config
}

/// Builds a harness with tenant `roberto`, payment credentials and three songs.
pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

/// Same as [`harness`] with a custom configuration.
pub async fn harness_with(config: GatewayConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let mut tenant = store.insert_tenant("roberto", "Roberto").await;
    tenant.payment_credentials = Some(PaymentCredentials {
        client_id: "client".into(),
        client_secret: "secret".into(),
        mode: PaymentMode::Sandbox,
    });
    store.update_tenant(tenant.clone()).await;

    let mut songs = Vec::new();
    for (title, author) in [
        ("Wonderwall", "Oasis"),
        ("Zombie", "The Cranberries"),
        ("Creep", "Radiohead"),
    ] {
        songs.push(store.insert_song(tenant.id, title, author).await);
    }

    let gateway = Arc::new(ScriptedGateway::default());
    let state = AppState::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        config,
    );
    Harness {
        store,
        gateway,
        state,
        tenant,
        songs,
    }
}

impl Harness {
    /// The n-th seeded song.
    pub fn song(&self, n: usize) -> &Song {
        match self.songs.get(n) {
            Some(song) => song,
            None => panic!("harness seeds only {} songs", self.songs.len()),
        }
    }

    /// Reloads the tenant, picking up settings changes.
    pub async fn reload_tenant(&self) -> Tenant {
        match self.store.get_tenant(self.tenant.id).await {
            Ok(Some(tenant)) => tenant,
            other => panic!("tenant should load: {other:?}"),
        }
    }

    /// Starts a gig with the given tip flag.
    pub async fn start_gig(&self, tip_enabled: bool) -> setlist_gateway::domain::Gig {
        match self
            .state
            .registry
            .start_gig(&self.tenant, None, Some(tip_enabled), Utc::now())
            .await
        {
            Ok(gig) => gig,
            Err(err) => panic!("gig should start: {err}"),
        }
    }

    /// Scans a fresh session into the tenant.
    pub async fn scan(&self, session_id: &str) -> Session {
        let mut session = Session::new(session_id);
        self.rescan(&mut session).await;
        session
    }

    /// Scans an existing session again.
    pub async fn rescan(&self, session: &mut Session) {
        if let Err(err) = self
            .state
            .binder
            .bind_on_scan(session, self.tenant.id, Utc::now())
            .await
        {
            panic!("scan should succeed: {err}");
        }
    }
}
