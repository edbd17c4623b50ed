//! Route definitions for `/projects/{project_id}/regeneration-requests`.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::regeneration;
use crate::state::AppState;

/// Routes mounted at `/projects/{project_id}/regeneration-requests`.
///
/// ```text
/// GET    /                       -> list_requests (?status=)
/// POST   /                       -> create_request
/// GET    /{id}                   -> get_request
/// DELETE /{id}                   -> cancel_request
/// GET    /{id}/approval-quote    -> approval_quote (?max_attempts=)
/// POST   /{id}/approve           -> approve_request
/// POST   /{id}/reject            -> reject_request
/// POST   /{id}/select            -> select_candidate
/// POST   /{id}/final-approve     -> final_approve
/// POST   /{id}/final-reject      -> final_reject
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(regeneration::list_requests).post(regeneration::create_request),
        )
        .route(
            "/{id}",
            get(regeneration::get_request).delete(regeneration::cancel_request),
        )
        .route("/{id}/approval-quote", get(regeneration::approval_quote))
        .route("/{id}/approve", post(regeneration::approve_request))
        .route("/{id}/reject", post(regeneration::reject_request))
        .route("/{id}/select", post(regeneration::select_candidate))
        .route("/{id}/final-approve", post(regeneration::final_approve))
        .route("/{id}/final-reject", post(regeneration::final_reject))
}

/// The attempt endpoint, mounted under `/api/v1` on its own so it can carry
/// a timeout long enough for video polling.
///
/// ```text
/// POST   /projects/{project_id}/regeneration-requests/{id}/attempts -> run_attempt
/// ```
pub fn attempt_router() -> Router<AppState> {
    Router::new().route(
        "/projects/{project_id}/regeneration-requests/{id}/attempts",
        post(regeneration::run_attempt),
    )
}
