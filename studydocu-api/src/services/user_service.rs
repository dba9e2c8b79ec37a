// User service - profile reads, self-service edits and admin user management
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{LeaderboardRow, Profile, ProfileView, SessionProfile, UpdateProfile};
use crate::services::achievement_service::AchievementService;
use crate::services::gamification::{self, Level, LevelProgress};
use crate::storage::ObjectStore;
use crate::utils::{like_pattern, Page, Pagination};

pub struct UserService {
    db: Database,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatusFilter {
    Active,
    Banned,
    Premium,
}

impl UserStatusFilter {
    fn condition(&self) -> &'static str {
        match self {
            UserStatusFilter::Active => " AND is_banned = false",
            UserStatusFilter::Banned => " AND is_banned = true",
            UserStatusFilter::Premium => " AND is_premium = true",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    pub search: Option<String>,
    pub status: Option<UserStatusFilter>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub profile: LeaderboardRow,
    pub level: &'static Level,
}

#[derive(Debug, Serialize)]
pub struct UserDashboard {
    pub points: i32,
    pub level: &'static Level,
    pub progress: Option<LevelProgress>,
    pub uploads: i64,
    pub likes_received: i64,
    pub favorites_received: i64,
    pub achievements_unlocked: i64,
}

#[derive(Debug, Serialize)]
pub struct DeletedUser {
    pub user_id: Uuid,
    pub documents_deleted: usize,
    pub objects_failed: usize,
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, params: &ListUsersParams) {
    if let Some(search) = params.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR email ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    if let Some(status) = params.status {
        qb.push(status.condition());
    }
}

impl UserService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn session_profile(&self, user_id: Uuid) -> Result<Option<SessionProfile>> {
        let profile: Option<SessionProfile> = sqlx::query_as(
            "SELECT role, is_banned, is_premium, onboarding_completed FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db.pg)
        .await?;

        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or_else(|| AppError::not_found("Usuario"))
    }

    pub async fn update_profile(&self, user_id: Uuid, input: &UpdateProfile) -> Result<Profile> {
        let profile: Profile = sqlx::query_as(
            r#"
            UPDATE profiles SET
                full_name = COALESCE($2, full_name),
                university = COALESCE($3, university),
                career = COALESCE($4, career),
                avatar_url = COALESCE($5, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(input.full_name.as_deref().map(str::trim))
        .bind(input.university.as_deref().map(str::trim))
        .bind(input.career.as_deref().map(str::trim))
        .bind(&input.avatar_url)
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::not_found("Usuario"))?;

        Ok(profile)
    }

    /// Onboarding is done once the profile names a university and a career.
    pub async fn complete_onboarding(&self, user_id: Uuid) -> Result<Profile> {
        let profile = self.get_profile(user_id).await?;

        let filled = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        if !filled(&profile.university) || !filled(&profile.career) {
            return Err(AppError::BadRequest(
                "Completa tu universidad y carrera para continuar".to_string(),
            ));
        }

        let profile: Profile = sqlx::query_as(
            "UPDATE profiles SET onboarding_completed = true, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .fetch_one(&self.db.pg)
        .await?;

        tracing::info!(user_id = %user_id, "Onboarding completed");
        Ok(profile)
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.clamp(1, Pagination::MAX_LIMIT) as i64;

        let rows: Vec<LeaderboardRow> = sqlx::query_as(
            r#"
            SELECT id, full_name, university, avatar_url, points
            FROM profiles
            WHERE is_banned = false
            ORDER BY points DESC, created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db.pg)
        .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, profile)| LeaderboardEntry {
                rank: i + 1,
                level: gamification::level_for(profile.points),
                profile,
            })
            .collect())
    }

    pub async fn dashboard(&self, user_id: Uuid) -> Result<UserDashboard> {
        let profile = self.get_profile(user_id).await?;
        let achievements = AchievementService::new(self.db.clone());
        let stats = achievements.stats(user_id).await?;

        let favorites_received: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM favorites f
            JOIN documents d ON d.id = f.document_id
            WHERE d.owner_id = $1 AND f.user_id <> $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db.pg)
        .await?;

        Ok(UserDashboard {
            points: profile.points,
            level: gamification::level_for(profile.points),
            progress: gamification::progress_to_next(profile.points),
            uploads: stats.uploads,
            likes_received: stats.likes_received,
            favorites_received,
            achievements_unlocked: achievements.count_unlocked(user_id).await?,
        })
    }

    /// List users with pagination and filters
    pub async fn list_users(
        &self,
        params: &ListUsersParams,
        pagination: &Pagination,
    ) -> Result<Page<ProfileView>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM profiles WHERE 1=1");
        push_user_filters(&mut qb, params);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit() as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let users: Vec<Profile> = qb.build_query_as().fetch_all(&self.db.pg).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM profiles WHERE 1=1");
        push_user_filters(&mut count, params);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db.pg).await?;

        Ok(Page::new(
            users.into_iter().map(ProfileView::from).collect(),
            total,
            pagination,
        ))
    }

    pub async fn ban(&self, user_id: Uuid, admin_id: Uuid, reason: &str) -> Result<Profile> {
        if user_id == admin_id {
            return Err(AppError::BadRequest("No puedes suspender tu propia cuenta".to_string()));
        }

        let profile: Profile = sqlx::query_as(
            r#"
            UPDATE profiles SET is_banned = true, ban_reason = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(reason)
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::not_found("Usuario"))?;

        tracing::info!(user_id = %user_id, admin_id = %admin_id, "User banned");
        Ok(profile)
    }

    pub async fn unban(&self, user_id: Uuid) -> Result<Profile> {
        let profile: Profile = sqlx::query_as(
            r#"
            UPDATE profiles SET is_banned = false, ban_reason = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::not_found("Usuario"))?;

        tracing::info!(user_id = %user_id, "User unbanned");
        Ok(profile)
    }

    /// Removes every row owned by the user in one transaction, then the stored
    /// files. A file that fails to delete is logged and counted, never fatal.
    pub async fn delete_user(
        &self,
        user_id: Uuid,
        admin_id: Uuid,
        storage: &dyn ObjectStore,
    ) -> Result<DeletedUser> {
        if user_id == admin_id {
            return Err(AppError::BadRequest("No puedes eliminar tu propia cuenta".to_string()));
        }

        let mut tx = self.db.pg.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM profiles WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::not_found("Usuario"));
        }

        let file_keys: Vec<String> =
            sqlx::query_scalar("SELECT file_key FROM documents WHERE owner_id = $1")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;

        let owned_docs = "SELECT id FROM documents WHERE owner_id = $1";
        let statements = [
            format!("DELETE FROM reports WHERE reporter_id = $1 OR document_id IN ({})", owned_docs),
            format!("DELETE FROM comments WHERE author_id = $1 OR document_id IN ({})", owned_docs),
            format!("DELETE FROM reactions WHERE user_id = $1 OR document_id IN ({})", owned_docs),
            format!("DELETE FROM favorites WHERE user_id = $1 OR document_id IN ({})", owned_docs),
            "DELETE FROM documents WHERE owner_id = $1".to_string(),
            "DELETE FROM memberships WHERE user_id = $1".to_string(),
            "DELETE FROM payments WHERE user_id = $1".to_string(),
            "DELETE FROM user_achievements WHERE user_id = $1".to_string(),
            "DELETE FROM profiles WHERE id = $1".to_string(),
        ];

        for statement in &statements {
            sqlx::query(statement).bind(user_id).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        let mut objects_failed = 0;
        for key in &file_keys {
            if let Err(e) = storage.delete(key).await {
                objects_failed += 1;
                tracing::warn!(user_id = %user_id, key = %key, error = %e, "Failed to delete stored file");
            }
        }

        tracing::info!(
            user_id = %user_id,
            admin_id = %admin_id,
            documents = file_keys.len(),
            objects_failed,
            "User deleted"
        );

        Ok(DeletedUser {
            user_id,
            documents_deleted: file_keys.len(),
            objects_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filters_map_to_profile_flags() {
        assert_eq!(UserStatusFilter::Banned.condition(), " AND is_banned = true");
        assert_eq!(UserStatusFilter::Premium.condition(), " AND is_premium = true");
    }

    #[test]
    fn search_filter_binds_the_escaped_pattern() {
        let params = ListUsersParams {
            search: Some("ana".into()),
            status: Some(UserStatusFilter::Active),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM profiles WHERE 1=1");
        push_user_filters(&mut qb, &params);
        let sql = qb.sql();
        assert!(sql.contains("full_name ILIKE $1 ESCAPE"));
        assert!(sql.contains("email ILIKE $2 ESCAPE"));
        assert!(sql.ends_with("AND is_banned = false"));
    }

    #[test]
    fn blank_search_adds_no_condition() {
        let params = ListUsersParams {
            search: Some("   ".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM profiles WHERE 1=1");
        push_user_filters(&mut qb, &params);
        assert_eq!(qb.sql(), "SELECT * FROM profiles WHERE 1=1");
    }
}
