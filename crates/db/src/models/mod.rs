pub mod credit;
pub mod notification;
pub mod project;
pub mod regeneration;
pub mod scene;
pub mod user;
