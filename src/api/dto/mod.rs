//! Data Transfer Objects for REST request/response serialization.
//!
//! Tip amounts cross the wire as decimal major units (`5.00`) and are
//! converted to [`crate::domain::MinorUnits`] at this boundary.

pub mod common_dto;
pub mod gig_dto;
pub mod queue_dto;
pub mod request_dto;
pub mod session_dto;
pub mod tip_dto;

pub use common_dto::*;
pub use gig_dto::*;
pub use queue_dto::*;
pub use request_dto::*;
pub use session_dto::*;
pub use tip_dto::*;
