//! Scene rows as seen by the regeneration workflow.

use serde::Serialize;
use sqlx::FromRow;
use filmgen_core::regeneration::TargetType;
use filmgen_core::types::DbId;

/// A scene with its generation inputs and current media.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scene {
    pub id: DbId,
    pub project_id: DbId,
    pub title: String,
    pub image_prompt: Option<String>,
    pub video_prompt: Option<String>,
    pub duration_secs: i32,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub character_ids: Vec<DbId>,
}

impl Scene {
    /// Current media URL for the given target field.
    pub fn media_url(&self, target: TargetType) -> Option<&str> {
        match target {
            TargetType::Image => self.image_url.as_deref(),
            TargetType::Video => self.video_url.as_deref(),
        }
    }
}
