//! Dot-separated event names published by the regeneration workflow.

pub const REGENERATION_REQUESTED: &str = "regeneration.requested";
pub const REGENERATION_APPROVED: &str = "regeneration.approved";
pub const REGENERATION_REJECTED: &str = "regeneration.rejected";
pub const REGENERATION_READY_FOR_SELECTION: &str = "regeneration.ready_for_selection";
pub const REGENERATION_SELECTED: &str = "regeneration.selected";
pub const REGENERATION_COMPLETED: &str = "regeneration.completed";
pub const REGENERATION_FINAL_REJECTED: &str = "regeneration.final_rejected";
pub const REGENERATION_FAILED: &str = "regeneration.failed";

/// Prefix shared by every workflow event.
pub const REGENERATION_PREFIX: &str = "regeneration.";
