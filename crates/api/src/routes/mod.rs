pub mod health;
pub mod notification;
pub mod regeneration;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree, except generation attempts (see
/// [`regeneration::attempt_router`]).
///
/// Route hierarchy:
///
/// ```text
/// /projects/{project_id}/regeneration-requests                         list, create
/// /projects/{project_id}/regeneration-requests/{id}                    get, cancel (DELETE)
/// /projects/{project_id}/regeneration-requests/{id}/approval-quote     approval cost (GET)
/// /projects/{project_id}/regeneration-requests/{id}/approve            approve (POST)
/// /projects/{project_id}/regeneration-requests/{id}/reject             reject (POST)
/// /projects/{project_id}/regeneration-requests/{id}/select             select candidate (POST)
/// /projects/{project_id}/regeneration-requests/{id}/final-approve      sign off (POST)
/// /projects/{project_id}/regeneration-requests/{id}/final-reject       turn down (POST)
///
/// /notifications                                   list (?unread_only, limit, offset)
/// /notifications/unread-count                      unread count (GET)
/// /notifications/{id}/read                         mark read (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/projects/{project_id}/regeneration-requests",
            regeneration::router(),
        )
        .nest("/notifications", notification::router())
}
