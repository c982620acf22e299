//! OpenAPI document for every REST endpoint.

use utoipa::OpenApi;

/// Aggregated OpenAPI specification for the gateway.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::session::scan,
        crate::api::handlers::session::check,
        crate::api::handlers::session::touch,
        crate::api::handlers::gig::active_gig,
        crate::api::handlers::gig::list_gigs,
        crate::api::handlers::gig::start_gig,
        crate::api::handlers::gig::end_gig,
        crate::api::handlers::gig::set_announcement,
        crate::api::handlers::gig::set_tips,
        crate::api::handlers::request::submit,
        crate::api::handlers::request::withdraw,
        crate::api::handlers::request::mark_played,
        crate::api::handlers::request::mark_song_played,
        crate::api::handlers::request::purge,
        crate::api::handlers::request::get_max_requests,
        crate::api::handlers::request::set_max_requests,
        crate::api::handlers::queue::queue,
        crate::api::handlers::queue::my_queue,
        crate::api::handlers::queue::my_song_ids,
        crate::api::handlers::tip::create_tip,
        crate::api::handlers::tip::create_order,
        crate::api::handlers::tip::capture,
        crate::api::handlers::system::health_handler,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::domain::Session,
        crate::domain::Gig,
        crate::domain::GigSummary,
        crate::domain::SongRequest,
        crate::domain::RequestStatus,
        crate::domain::TipIntentSummary,
        crate::domain::TipStatus,
        crate::payment::PaymentMode,
        crate::service::SessionStatus,
        crate::service::AdmissionReceipt,
        crate::service::QueueEntry,
        crate::service::OrderHandle,
        crate::service::CaptureResult,
        crate::service::PaymentPublicInfo,
        crate::api::dto::ScanRequest,
        crate::api::dto::ScanResponse,
        crate::api::dto::SessionRequest,
        crate::api::dto::SessionResponse,
        crate::api::dto::StartGigRequest,
        crate::api::dto::EndGigResponse,
        crate::api::dto::AnnouncementRequest,
        crate::api::dto::TipToggleRequest,
        crate::api::dto::GigInfoResponse,
        crate::api::dto::GigListResponse,
        crate::api::dto::SubmitRequestBody,
        crate::api::dto::SubmitRequestResponse,
        crate::api::dto::WithdrawRequest,
        crate::api::dto::MaxRequestsBody,
        crate::api::dto::ChangedResponse,
        crate::api::dto::CountResponse,
        crate::api::dto::QueueResponse,
        crate::api::dto::MyQueueRequest,
        crate::api::dto::SongIdsResponse,
        crate::api::dto::StandaloneTipRequest,
        crate::api::dto::CaptureRequest,
        crate::api::handlers::system::HealthResponse,
    )),
    tags(
        (name = "Sessions", description = "QR scan and session liveness"),
        (name = "Gigs", description = "Gig lifecycle"),
        (name = "Requests", description = "Song request admission and lifecycle"),
        (name = "Queue", description = "Pending queue views"),
        (name = "Tips", description = "Tip intents and payment capture"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/tenants/{slug}/scan",
            "/api/v1/tenants/{slug}/requests",
            "/api/v1/tips/{id}/capture",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
