use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::UserRole;
use crate::services::gamification::{self, Level};

#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub university: Option<String>,
    pub career: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    pub points: i32,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn role(&self) -> UserRole {
        match self.role.as_str() {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role() == UserRole::Admin
    }
}

/// Public shape of a profile; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub university: Option<String>,
    pub career: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub is_banned: bool,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    pub points: i32,
    pub level: &'static Level,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileView {
    fn from(p: Profile) -> Self {
        Self {
            level: gamification::level_for(p.points),
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            university: p.university,
            career: p.career,
            avatar_url: p.avatar_url,
            role: p.role,
            is_banned: p.is_banned,
            is_premium: p.is_premium,
            premium_until: p.premium_until,
            points: p.points,
            onboarding_completed: p.onboarding_completed,
            created_at: p.created_at,
        }
    }
}

/// The handful of fields the page gate branches on.
#[derive(Debug, Clone, FromRow)]
pub struct SessionProfile {
    pub role: String,
    pub is_banned: bool,
    pub is_premium: bool,
    pub onboarding_completed: bool,
}

impl SessionProfile {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterProfile {
    #[validate(email(message = "Correo electrónico inválido"))]
    pub email: String,
    #[validate(length(min = 8, message = "La contraseña debe tener al menos 8 caracteres"))]
    pub password: String,
    #[validate(length(min = 2, max = 120, message = "Ingresa tu nombre completo"))]
    pub full_name: String,
    #[validate(length(max = 160))]
    pub university: Option<String>,
    #[validate(length(max = 160))]
    pub career: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 2, max = 120))]
    pub full_name: Option<String>,
    #[validate(length(max = 160))]
    pub university: Option<String>,
    #[validate(length(max = 160))]
    pub career: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeaderboardRow {
    pub id: Uuid,
    pub full_name: String,
    pub university: Option<String>,
    pub avatar_url: Option<String>,
    pub points: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: &str, is_premium: bool) -> Profile {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            email: "ana@uni.edu.pe".into(),
            password_hash: "x".into(),
            full_name: "Ana Quispe".into(),
            university: None,
            career: None,
            avatar_url: None,
            role: role.into(),
            is_banned: false,
            ban_reason: None,
            is_premium,
            premium_until: None,
            points: 160,
            onboarding_completed: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unknown_roles_are_plain_users() {
        assert!(profile("admin", false).is_admin());
        assert!(!profile("user", true).is_admin());
        assert_eq!(profile("moderator", false).role(), UserRole::User);
    }

    #[test]
    fn view_carries_level_and_hides_hash() {
        let view = ProfileView::from(profile("user", false));
        assert_eq!(view.level.label, "Estudiante Destacado");
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
