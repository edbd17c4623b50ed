pub mod notification;
pub mod regeneration;
