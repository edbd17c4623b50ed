//! Filmgen domain core.
//!
//! Shared id/timestamp types, the [`error::CoreError`] taxonomy, project
//! capabilities, media/pricing tables, and the regeneration request state
//! machine rules. Nothing in this crate performs I/O.

pub mod error;
pub mod media;
pub mod pricing;
pub mod regeneration;
pub mod roles;
pub mod types;
