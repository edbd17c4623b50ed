//! Repository for the `scenes` table.

use sqlx::PgPool;
use filmgen_core::types::DbId;

use crate::models::scene::Scene;

/// Scene columns plus the aggregated character ids.
const SELECT_SCENE: &str = "\
    SELECT s.id, s.project_id, s.title, s.image_prompt, s.video_prompt, s.duration_secs, \
           s.image_url, s.video_url, \
           COALESCE(array_agg(sc.character_id ORDER BY sc.character_id) \
                    FILTER (WHERE sc.character_id IS NOT NULL), '{}') AS character_ids \
    FROM scenes s \
    LEFT JOIN scene_characters sc ON sc.scene_id = s.id";

pub struct SceneRepo;

impl SceneRepo {
    /// Find a scene within a project.
    pub async fn find_in_project(
        pool: &PgPool,
        project_id: DbId,
        scene_id: DbId,
    ) -> Result<Option<Scene>, sqlx::Error> {
        let query = format!(
            "{SELECT_SCENE} WHERE s.id = $1 AND s.project_id = $2 GROUP BY s.id"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(scene_id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }
}
