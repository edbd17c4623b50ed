//! Project generation settings and characters.

use serde::Serialize;
use sqlx::FromRow;
use filmgen_core::media::{AspectRatio, Resolution};
use filmgen_core::types::DbId;

/// The subset of a `projects` row that drives generation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectSettings {
    pub id: DbId,
    pub owner_id: DbId,
    pub aspect_ratio: String,
    pub image_resolution: String,
    pub video_resolution: String,
    pub style_prompt: Option<String>,
}

impl ProjectSettings {
    pub fn aspect_ratio(&self) -> AspectRatio {
        AspectRatio::from_name_or_default(&self.aspect_ratio)
    }

    pub fn image_resolution(&self) -> Resolution {
        Resolution::from_name_or_default(&self.image_resolution)
    }

    pub fn video_resolution(&self) -> Resolution {
        Resolution::from_name_or_default(&self.video_resolution)
    }
}

/// A row from the `characters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Character {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub image_url: Option<String>,
}
