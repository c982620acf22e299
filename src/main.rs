//! setlist-gateway server entry point.
//!
//! Starts the Axum HTTP server with the REST endpoints and, when enabled,
//! the background audit recorder.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use setlist_gateway::api;
use setlist_gateway::app_state::AppState;
use setlist_gateway::config::{GatewayConfig, StoreBackend};
use setlist_gateway::payment::{PayPalGateway, PaymentGateway};
use setlist_gateway::persistence::{InMemoryStore, PostgresStore, Store};
use setlist_gateway::service::AuditRecorder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting setlist-gateway");

    // Build persistence layer
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => Arc::new(
            PostgresStore::connect(&config)
                .await
                .context("connecting to PostgreSQL")?,
        ),
        StoreBackend::Memory => {
            let store = InMemoryStore::new();
            let tenant = store.insert_tenant("demo", "Demo Performer").await;
            store.insert_song(tenant.id, "Wonderwall", "Oasis").await;
            store.insert_song(tenant.id, "Zombie", "The Cranberries").await;
            tracing::warn!(tenant = %tenant.slug, "using in-memory store; data is lost on restart");
            Arc::new(store)
        }
    };
    tracing::info!(backend = store.backend_name(), "store ready");

    // Build payment client
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        PayPalGateway::new(config.payment.timeout).context("building payment client")?,
    );
    if config.payment.credentials.is_none() {
        tracing::warn!("no global payment credentials; tips need per-tenant credentials");
    }

    // Build application state
    let listen_addr = config.listen_addr;
    let audit_enabled = config.audit_log_enabled;
    let app_state = AppState::new(Arc::clone(&store), gateway, config);

    if audit_enabled {
        let _recorder = AuditRecorder::spawn(Arc::clone(&store), &app_state.event_bus);
    }

    // Build router
    let app = Router::new().merge(api::build_router());
    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        app.merge(
            SwaggerUi::new("/docs").url("/api-doc/openapi.json", api::docs::ApiDoc::openapi()),
        )
    };
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
