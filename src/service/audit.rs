//! Background task persisting domain events to the audit log.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::domain::{EventBus, GigEvent};
use crate::persistence::{AuditEntry, Store};

/// Subscribes to the [`EventBus`] and appends every event to the store.
///
/// Runs off the request path: a slow or failing audit write never delays
/// a mutation, it only logs a warning.
#[derive(Debug)]
pub struct AuditRecorder;

impl AuditRecorder {
    /// Spawns the recorder. The task ends when every [`EventBus`] clone has
    /// been dropped.
    #[must_use]
    pub fn spawn(store: Arc<dyn Store>, event_bus: &EventBus) -> JoinHandle<()> {
        let mut rx = event_bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => record(store.as_ref(), &event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "audit recorder lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("audit recorder stopped");
        })
    }
}

/// Builds the audit row for `event`.
#[must_use]
pub fn audit_entry(event: &GigEvent) -> AuditEntry {
    let (entity_type, entity_id) = event.entity();
    AuditEntry {
        action: event.event_type_str().to_string(),
        entity_type: entity_type.to_string(),
        entity_id,
        tenant_id: event.tenant_id(),
        details: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        created_at: event.timestamp(),
    }
}

async fn record(store: &dyn Store, event: &GigEvent) {
    if let Err(err) = store.append_audit(audit_entry(event)).await {
        tracing::warn!(
            action = event.event_type_str(),
            tenant_id = %event.tenant_id(),
            error = %err,
            "audit write failed"
        );
    }
}
