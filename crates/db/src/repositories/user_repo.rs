//! Repository for display identities in the `users` table.

use sqlx::PgPool;
use filmgen_core::types::DbId;

use crate::models::user::UserSummary;

pub struct UserRepo;

impl UserRepo {
    /// Look up display names for a set of users. Unknown ids are omitted.
    pub async fn summaries(pool: &PgPool, ids: &[DbId]) -> Result<Vec<UserSummary>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserSummary>(
            "SELECT id, display_name FROM users WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }
}
