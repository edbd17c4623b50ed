//! Repositories for project settings, membership, and characters.

use sqlx::PgPool;
use filmgen_core::roles::{ROLE_ADMIN, ROLE_OWNER};
use filmgen_core::types::DbId;

use crate::models::project::{Character, ProjectSettings};

pub struct ProjectRepo;

impl ProjectRepo {
    pub async fn find_settings(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Option<ProjectSettings>, sqlx::Error> {
        sqlx::query_as::<_, ProjectSettings>(
            "SELECT id, owner_id, aspect_ratio, image_resolution, video_resolution, style_prompt \
             FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }
}

/// Membership lookups. The project owner counts as a member with the
/// `owner` role even without a `project_members` row.
pub struct ProjectMemberRepo;

impl ProjectMemberRepo {
    /// Role name of `user_id` on `project_id`, if any.
    pub async fn role_of(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT role FROM ( \
                 SELECT $3::TEXT AS role, 0 AS priority FROM projects \
                 WHERE id = $1 AND owner_id = $2 \
                 UNION ALL \
                 SELECT r.name, 1 FROM project_members m \
                 JOIN project_roles r ON r.id = m.role_id \
                 WHERE m.project_id = $1 AND m.user_id = $2 \
             ) roles \
             ORDER BY priority LIMIT 1",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(ROLE_OWNER)
        .fetch_optional(pool)
        .await
    }

    /// Users holding an approving role (owner or admin).
    pub async fn approvers(pool: &PgPool, project_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT owner_id FROM projects WHERE id = $1 \
             UNION \
             SELECT m.user_id FROM project_members m \
             JOIN project_roles r ON r.id = m.role_id \
             WHERE m.project_id = $1 AND r.name = ANY($2) \
             ORDER BY 1",
        )
        .bind(project_id)
        .bind(&[ROLE_OWNER, ROLE_ADMIN][..])
        .fetch_all(pool)
        .await
    }
}

pub struct CharacterRepo;

impl CharacterRepo {
    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Character>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Character>(
            "SELECT id, project_id, name, image_url FROM characters \
             WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }
}
