//! Domain layer: identifiers, aggregates, status machines and events.
//!
//! Pure data and transition rules. Nothing here touches the store or the
//! payment provider; the service layer composes these types.

pub mod event_bus;
pub mod gig;
pub mod gig_event;
pub mod ids;
pub mod keyed_lock;
pub mod money;
pub mod session;
pub mod song_request;
pub mod tenant;
pub mod tip_intent;

pub use event_bus::EventBus;
pub use gig::{Gig, GigHandover, GigSummary, NewGig};
pub use gig_event::GigEvent;
pub use ids::{GigId, RequestId, SongId, TenantId, TipIntentId};
pub use keyed_lock::KeyedLocks;
pub use money::{MinorUnits, MoneyError};
pub use session::Session;
pub use song_request::{PendingRequestRow, RequestAction, RequestStatus, SongRequest};
pub use tenant::{Song, Tenant};
pub use tip_intent::{CaptureOutcome, NewTipIntent, TipIntent, TipIntentSummary, TipStatus};
