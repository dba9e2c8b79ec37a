use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CreateAuditLog {
    pub admin_id: Uuid,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditAction {
    // Auth
    Login,
    Logout,
    // User management
    BanUser,
    UnbanUser,
    SetPremium,
    RevokePremium,
    DeleteUser,
    // Document moderation
    ApproveDocument,
    RejectDocument,
    RemoveDocument,
    RestoreDocument,
    ResolveReport,
    DismissReport,
    // Payments
    ApprovePayment,
    RejectPayment,
    /// Free-form action reported by the admin front end.
    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::BanUser => "ban_user",
            AuditAction::UnbanUser => "unban_user",
            AuditAction::SetPremium => "set_premium",
            AuditAction::RevokePremium => "revoke_premium",
            AuditAction::DeleteUser => "delete_user",
            AuditAction::ApproveDocument => "approve_document",
            AuditAction::RejectDocument => "reject_document",
            AuditAction::RemoveDocument => "remove_document",
            AuditAction::RestoreDocument => "restore_document",
            AuditAction::ResolveReport => "resolve_report",
            AuditAction::DismissReport => "dismiss_report",
            AuditAction::ApprovePayment => "approve_payment",
            AuditAction::RejectPayment => "reject_payment",
            AuditAction::Custom(action) => action,
        }
    }

    /// Custom actions are lowercase snake_case, at most 64 chars.
    pub fn custom(action: &str) -> Option<Self> {
        let valid = !action.is_empty()
            && action.len() <= 64
            && action
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
        valid.then(|| AuditAction::Custom(action.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    Document,
    Comment,
    Report,
    Payment,
    Session,
    Settings,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Document => "document",
            ResourceType::Comment => "comment",
            ResourceType::Report => "report",
            ResourceType::Payment => "payment",
            ResourceType::Session => "session",
            ResourceType::Settings => "settings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_actions_are_restricted() {
        assert_eq!(
            AuditAction::custom("export_users").map(|a| a.as_str().to_string()),
            Some("export_users".to_string())
        );
        assert!(AuditAction::custom("").is_none());
        assert!(AuditAction::custom("Drop Table").is_none());
        assert!(AuditAction::custom(&"a".repeat(65)).is_none());
    }
}
