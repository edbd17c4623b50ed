//! Repository for `regeneration_requests` and its child tables.
//!
//! All status changes go through [`RegenerationRequestRepo::transition`], a
//! single compare-and-swap that refuses the write unless the row is still in
//! one of the expected statuses.

use sqlx::{PgConnection, PgPool};
use filmgen_core::regeneration::{LogEntry, RequestStatus, StatusId, TargetType};
use filmgen_core::types::{DbId, Timestamp};

use crate::models::regeneration::{
    CreateRegenerationRequest, FinalizeOutcome, RegenerationCandidate, RegenerationLogRow,
    RegenerationRequestRow, RequestUpdate,
};

/// Column list for `regeneration_requests` queries.
const COLUMNS: &str = "id, project_id, requester_id, target_type, target_id, target_name, \
    status_id, max_attempts, attempts_used, credits_paid, selected_url, \
    reviewed_by, reviewed_at, review_note, \
    final_review_by, final_review_at, final_review_note, \
    error_message, generating_since, created_at, updated_at";

const CANDIDATE_COLUMNS: &str = "request_id, position, url, created_at";

const LOG_COLUMNS: &str = "id, request_id, kind, message, details, logged_at";

pub struct RegenerationRequestRepo;

impl RegenerationRequestRepo {
    /// Insert a new request in `pending`.
    ///
    /// Fails with a unique violation on `uq_regeneration_requests_active_target`
    /// when the target already has an active request.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRegenerationRequest,
    ) -> Result<RegenerationRequestRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO regeneration_requests \
                (project_id, requester_id, target_type, target_id, target_name, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RegenerationRequestRow>(&query)
            .bind(input.project_id)
            .bind(input.requester_id)
            .bind(input.target_type.as_str())
            .bind(input.target_id)
            .bind(input.target_name.trim())
            .bind(RequestStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<RegenerationRequestRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM regeneration_requests WHERE id = $1");
        sqlx::query_as::<_, RegenerationRequestRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's requests, newest first, optionally filtered by status.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RegenerationRequestRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM regeneration_requests \
             WHERE project_id = $1 AND ($2::SMALLINT IS NULL OR status_id = $2) \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, RegenerationRequestRow>(&query)
            .bind(project_id)
            .bind(status.map(RequestStatus::id))
            .fetch_all(pool)
            .await
    }

    /// Candidates of the given requests, ordered by request then position.
    pub async fn candidates_for(
        pool: &PgPool,
        request_ids: &[DbId],
    ) -> Result<Vec<RegenerationCandidate>, sqlx::Error> {
        let query = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM regeneration_candidates \
             WHERE request_id = ANY($1) ORDER BY request_id, position"
        );
        sqlx::query_as::<_, RegenerationCandidate>(&query)
            .bind(request_ids)
            .fetch_all(pool)
            .await
    }

    /// Log rows of the given requests in append order.
    pub async fn logs_for(
        pool: &PgPool,
        request_ids: &[DbId],
    ) -> Result<Vec<RegenerationLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM regeneration_request_logs \
             WHERE request_id = ANY($1) ORDER BY request_id, id"
        );
        sqlx::query_as::<_, RegenerationLogRow>(&query)
            .bind(request_ids)
            .fetch_all(pool)
            .await
    }

    /// Delete a request that is still `pending`. Returns `false` otherwise.
    pub async fn delete_pending(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM regeneration_requests WHERE id = $1 AND status_id = $2")
                .bind(id)
                .bind(RequestStatus::Pending.id())
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-swap the status from any of `from` to `to`, applying
    /// `update` in the same transaction.
    ///
    /// Returns `None` when the row is missing, in another status, claimed by
    /// a different attempt than `update.claim`, or when the update would push
    /// `attempts_used` past `max_attempts`.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: &[RequestStatus],
        to: RequestStatus,
        update: &RequestUpdate,
    ) -> Result<Option<RegenerationRequestRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let row = Self::transition_in(&mut tx, id, from, to, update).await?;
        if row.is_some() {
            tx.commit().await?;
        }
        Ok(row)
    }

    /// Append log entries without changing status.
    pub async fn append_logs(
        pool: &PgPool,
        id: DbId,
        logs: &[LogEntry],
    ) -> Result<(), sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::insert_logs(&mut conn, id, logs).await
    }

    /// Complete an `awaiting_final` request and write its selected URL into
    /// the target scene, atomically.
    pub async fn complete_with_scene(
        pool: &PgPool,
        id: DbId,
        update: &RequestUpdate,
    ) -> Result<FinalizeOutcome<RegenerationRequestRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(row) = Self::transition_in(
            &mut tx,
            id,
            &[RequestStatus::AwaitingFinal],
            RequestStatus::Completed,
            update,
        )
        .await?
        else {
            return Ok(FinalizeOutcome::StatusChanged);
        };

        let column = match TargetType::from_name(&row.target_type) {
            Ok(TargetType::Image) => "image_url",
            Ok(TargetType::Video) => "video_url",
            Err(_) => return Err(sqlx::Error::Decode("unknown target_type".into())),
        };
        let query = format!(
            "UPDATE scenes SET {column} = $3, updated_at = NOW() \
             WHERE id = $1 AND project_id = $2"
        );
        let applied = sqlx::query(&query)
            .bind(row.target_id)
            .bind(row.project_id)
            .bind(&row.selected_url)
            .execute(&mut *tx)
            .await?;

        if applied.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(FinalizeOutcome::SceneMissing);
        }

        tx.commit().await?;
        Ok(FinalizeOutcome::Completed(row))
    }

    /// Requests stuck in `generating` since before `cutoff`, with the
    /// instant each attempt claimed them.
    pub async fn list_stale_generating(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<(DbId, Timestamp)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, generating_since FROM regeneration_requests \
             WHERE status_id = $1 AND generating_since < $2 \
             ORDER BY generating_since",
        )
        .bind(RequestStatus::Generating.id())
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn transition_in(
        conn: &mut PgConnection,
        id: DbId,
        from: &[RequestStatus],
        to: RequestStatus,
        update: &RequestUpdate,
    ) -> Result<Option<RegenerationRequestRow>, sqlx::Error> {
        let from_ids: Vec<StatusId> = from.iter().map(|s| s.id()).collect();
        let (clear_error, error_message) = match &update.error_message {
            Some(msg) => (true, msg.clone()),
            None => (false, None),
        };
        let review = update.review.as_ref();
        let final_review = update.final_review.as_ref();

        let query = format!(
            "UPDATE regeneration_requests SET \
                status_id = $3, \
                max_attempts = COALESCE($4, max_attempts), \
                credits_paid = COALESCE($5, credits_paid), \
                attempts_used = attempts_used + $6, \
                selected_url = COALESCE($7, selected_url), \
                reviewed_by = COALESCE($8, reviewed_by), \
                reviewed_at = COALESCE($9, reviewed_at), \
                review_note = CASE WHEN $8 IS NULL THEN review_note ELSE $10 END, \
                final_review_by = COALESCE($11, final_review_by), \
                final_review_at = COALESCE($12, final_review_at), \
                final_review_note = CASE WHEN $11 IS NULL THEN final_review_note ELSE $13 END, \
                error_message = CASE WHEN $14::BOOLEAN THEN $15 ELSE error_message END, \
                generating_since = CASE WHEN $3::SMALLINT = $16::SMALLINT THEN NOW() ELSE NULL END, \
                updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($2) \
               AND attempts_used + $6 <= COALESCE($4, max_attempts) \
               AND ($17::TIMESTAMPTZ IS NULL OR generating_since = $17) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, RegenerationRequestRow>(&query)
            .bind(id)
            .bind(&from_ids)
            .bind(to.id())
            .bind(update.max_attempts)
            .bind(update.credits_paid)
            .bind(update.attempt_increment())
            .bind(&update.selected_url)
            .bind(review.map(|r| r.reviewer_id))
            .bind(review.map(|r| r.at))
            .bind(review.and_then(|r| r.note.clone()))
            .bind(final_review.map(|r| r.reviewer_id))
            .bind(final_review.map(|r| r.at))
            .bind(final_review.and_then(|r| r.note.clone()))
            .bind(clear_error)
            .bind(error_message)
            .bind(RequestStatus::Generating.id())
            .bind(update.claim)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if let Some(url) = &update.new_candidate {
            sqlx::query(
                "INSERT INTO regeneration_candidates (request_id, position, url) \
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(row.attempts_used)
            .bind(url)
            .execute(&mut *conn)
            .await?;
        }

        Self::insert_logs(conn, id, &update.logs).await?;
        Ok(Some(row))
    }

    async fn insert_logs(
        conn: &mut PgConnection,
        id: DbId,
        logs: &[LogEntry],
    ) -> Result<(), sqlx::Error> {
        for entry in logs {
            sqlx::query(
                "INSERT INTO regeneration_request_logs \
                    (request_id, kind, message, details, logged_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(entry.kind.as_str())
            .bind(&entry.message)
            .bind(&entry.details)
            .bind(entry.timestamp)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}
