mod achievement_service;
mod audit_service;
mod auth_service;
mod comment_service;
mod dashboard_service;
mod document_service;
mod favorite_service;
pub mod gamification;
mod payment_service;
mod reaction_service;
mod report_service;
pub mod stripe;
mod user_service;

pub use achievement_service::*;
pub use audit_service::*;
pub use auth_service::*;
pub use comment_service::*;
pub use dashboard_service::*;
pub use document_service::*;
pub use favorite_service::*;
pub use gamification::GamificationService;
pub use payment_service::*;
pub use reaction_service::*;
pub use report_service::*;
pub use user_service::*;
