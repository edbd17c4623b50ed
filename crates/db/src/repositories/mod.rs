pub mod credit_repo;
pub mod notification_repo;
pub mod project_repo;
pub mod regeneration_request_repo;
pub mod scene_repo;
pub mod user_repo;

pub use credit_repo::CreditRepo;
pub use notification_repo::NotificationRepo;
pub use project_repo::{CharacterRepo, ProjectMemberRepo, ProjectRepo};
pub use regeneration_request_repo::RegenerationRequestRepo;
pub use scene_repo::SceneRepo;
pub use user_repo::UserRepo;
