//! User identity as shown next to workflow records.

use serde::Serialize;
use sqlx::FromRow;
use filmgen_core::types::DbId;

/// Display identity of a user.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct UserSummary {
    pub id: DbId,
    pub display_name: String,
}
