//! Project membership roles and the capabilities they grant.
//!
//! These must match the seed data of the `project_roles` lookup table.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_COLLABORATOR: &str = "collaborator";
pub const ROLE_READER: &str = "reader";

/// A user's role on a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Owner,
    Admin,
    Collaborator,
    Reader,
}

impl ProjectRole {
    /// Parse from the database `name` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            ROLE_OWNER => Ok(Self::Owner),
            ROLE_ADMIN => Ok(Self::Admin),
            ROLE_COLLABORATOR => Ok(Self::Collaborator),
            ROLE_READER => Ok(Self::Reader),
            other => Err(CoreError::Validation(format!(
                "Unknown project role '{other}'"
            ))),
        }
    }

    /// Database name value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Owner => ROLE_OWNER,
            Self::Admin => ROLE_ADMIN,
            Self::Collaborator => ROLE_COLLABORATOR,
            Self::Reader => ROLE_READER,
        }
    }

    /// Every member can read project content, including regeneration requests.
    pub fn can_view(self) -> bool {
        true
    }

    /// Whether the role may edit scenes (and therefore ask for regenerations).
    pub fn can_edit(self) -> bool {
        !matches!(self, Self::Reader)
    }

    /// Whether the role may approve, reject, and sign off regeneration requests.
    pub fn can_approve_requests(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_edits_but_cannot_approve() {
        assert!(ProjectRole::Collaborator.can_edit());
        assert!(!ProjectRole::Collaborator.can_approve_requests());
    }

    #[test]
    fn reader_only_views() {
        assert!(ProjectRole::Reader.can_view());
        assert!(!ProjectRole::Reader.can_edit());
        assert!(!ProjectRole::Reader.can_approve_requests());
    }

    #[test]
    fn owner_and_admin_approve() {
        assert!(ProjectRole::Owner.can_approve_requests());
        assert!(ProjectRole::Admin.can_approve_requests());
    }

    #[test]
    fn names_round_trip() {
        for role in [
            ProjectRole::Owner,
            ProjectRole::Admin,
            ProjectRole::Collaborator,
            ProjectRole::Reader,
        ] {
            assert_eq!(ProjectRole::from_name(role.name()).unwrap(), role);
        }
        assert!(ProjectRole::from_name("superuser").is_err());
    }
}
