//! Service layer: gig lifecycle, admission, tips and queue reads.
//!
//! Every service holds an `Arc<dyn Store>` and publishes a
//! [`super::domain::GigEvent`] through the [`super::domain::EventBus`] after
//! each committed mutation. Store calls go through [`retry::retry_store`].

pub mod admission;
pub mod audit;
pub mod gig_registry;
pub mod queue_view;
pub mod retry;
pub mod session_binder;
pub mod tip_intents;

#[cfg(test)]
pub(crate) mod test_support;

pub use admission::{AdmissionController, AdmissionReceipt};
pub use audit::AuditRecorder;
pub use gig_registry::{ActiveGigLookup, GigRegistry};
pub use queue_view::{QueueEntry, QueueView};
pub use session_binder::{Binding, SessionBinder, SessionStatus};
pub use tip_intents::{CaptureResult, OrderHandle, PaymentPublicInfo, TipIntentManager};
