pub mod auth;
pub mod gate;

pub use auth::{attach_user, require_admin, Claims, CurrentUser, TokenKind, UserRole};
pub use gate::page_gate;
