//! REST endpoint handlers organized by resource.

pub mod gig;
pub mod queue;
pub mod request;
pub mod session;
pub mod system;
pub mod tip;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(session::routes())
        .merge(gig::routes())
        .merge(request::routes())
        .merge(queue::routes())
        .merge(tip::routes())
}
