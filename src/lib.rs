//! # setlist-gateway
//!
//! REST gateway for live-gig song requests: gig lifecycle, request
//! admission control and tip intents captured through a payment provider.
//!
//! The core is transport-agnostic. Sessions are explicit values passed into
//! every operation, invariants that span concurrent callers (one active gig
//! per tenant, one pending request per song and requester, the request
//! quota) are enforced by the store inside a single transaction, and the
//! payment provider is never called while a transaction is open.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── GigRegistry · SessionBinder (service/)
//!     ├── AdmissionController · TipIntentManager · QueueView (service/)
//!     ├── EventBus ──► AuditRecorder (domain/, service/)
//!     │
//!     ├── PaymentGateway ──► PayPal (payment/)
//!     └── Store ──► PostgreSQL | in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod payment;
pub mod persistence;
pub mod service;
