//! Handlers for `/projects/{project_id}/regeneration-requests`.
//!
//! Every handler is a thin shell over [`RegenerationEngine`]: permission
//! checks, transitions, and credit handling all live in the engine.
//!
//! [`RegenerationEngine`]: filmgen_regeneration::RegenerationEngine

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use filmgen_core::regeneration::RequestStatus;
use filmgen_core::types::DbId;
use filmgen_regeneration::{
    ApprovalQuote, ApproveInput, AttemptOutcome, CreateRequestInput, RegenerationDetail,
    RegenerationRequest,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query / body types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /regeneration-requests`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Status name, e.g. `pending` or `selecting`.
    pub status: Option<String>,
}

/// Query parameters for `GET /{id}/approval-quote`.
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub max_attempts: Option<i32>,
}

/// Optional reviewer note for reject and sign-off actions.
#[derive(Debug, Default, Deserialize)]
pub struct NoteBody {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectBody {
    pub url: String,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{project_id}/regeneration-requests
pub async fn list_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<DataResponse<Vec<RegenerationRequest>>>> {
    let status = params
        .status
        .as_deref()
        .map(RequestStatus::from_name)
        .transpose()?;

    let requests = state.engine.list(project_id, auth.user_id, status).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/projects/{project_id}/regeneration-requests/{id}
pub async fn get_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<RegenerationDetail>>> {
    let detail = state.engine.get(project_id, id, auth.user_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// GET /api/v1/projects/{project_id}/regeneration-requests/{id}/approval-quote
///
/// What approving would charge the caller, and whether they can afford it.
pub async fn approval_quote(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
    Query(params): Query<QuoteQuery>,
) -> AppResult<Json<DataResponse<ApprovalQuote>>> {
    let quote = state
        .engine
        .approval_quote(project_id, id, auth.user_id, params.max_attempts)
        .await?;
    Ok(Json(DataResponse { data: quote }))
}

// ---------------------------------------------------------------------------
// Requester actions
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/regeneration-requests
///
/// Returns 201 with the new `pending` request.
pub async fn create_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateRequestInput>,
) -> AppResult<impl IntoResponse> {
    let request = state.engine.create(project_id, auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// DELETE /api/v1/projects/{project_id}/regeneration-requests/{id}
///
/// Withdraws a `pending` request (it is deleted). Returns 204 No Content.
pub async fn cancel_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    state.engine.cancel(project_id, id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/projects/{project_id}/regeneration-requests/{id}/attempts
///
/// Runs one generation attempt and waits for it. If the client disconnects
/// the attempt is cancelled and does not count against the budget.
pub async fn run_attempt(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<AttemptOutcome>>> {
    let outcome = state.engine.attempt(project_id, id, auth.user_id).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/projects/{project_id}/regeneration-requests/{id}/select
pub async fn select_candidate(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
    Json(body): Json<SelectBody>,
) -> AppResult<Json<DataResponse<RegenerationRequest>>> {
    if body.url.trim().is_empty() {
        return Err(AppError::BadRequest("url must not be empty".into()));
    }
    let request = state
        .engine
        .select(project_id, id, auth.user_id, &body.url)
        .await?;
    Ok(Json(DataResponse { data: request }))
}

// ---------------------------------------------------------------------------
// Approver actions
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/regeneration-requests/{id}/approve
///
/// Body: `{ "note"?: string, "max_attempts"?: int }`. Charges the caller for
/// the whole attempt budget.
pub async fn approve_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
    Json(input): Json<ApproveInput>,
) -> AppResult<Json<DataResponse<RegenerationRequest>>> {
    let request = state
        .engine
        .approve(project_id, id, auth.user_id, input)
        .await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/projects/{project_id}/regeneration-requests/{id}/reject
pub async fn reject_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
    Json(body): Json<NoteBody>,
) -> AppResult<Json<DataResponse<RegenerationRequest>>> {
    let request = state
        .engine
        .reject(project_id, id, auth.user_id, body.note)
        .await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/projects/{project_id}/regeneration-requests/{id}/final-approve
///
/// Applies the selected candidate to the scene.
pub async fn final_approve(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
    Json(body): Json<NoteBody>,
) -> AppResult<Json<DataResponse<RegenerationRequest>>> {
    let request = state
        .engine
        .final_approve(project_id, id, auth.user_id, body.note)
        .await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/projects/{project_id}/regeneration-requests/{id}/final-reject
pub async fn final_reject(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
    Json(body): Json<NoteBody>,
) -> AppResult<Json<DataResponse<RegenerationRequest>>> {
    let request = state
        .engine
        .final_reject(project_id, id, auth.user_id, body.note)
        .await?;
    Ok(Json(DataResponse { data: request }))
}
