//! Points and levels.
//!
//! Points accumulate on `profiles.points`; the level is derived on read from a
//! fixed threshold table and never stored.

use serde::Serialize;
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointEvent {
    DocumentUploaded,
    DocumentApproved,
    CommentPosted,
    LikeReceived,
    FavoriteReceived,
    AchievementUnlocked(i32),
}

impl PointEvent {
    pub fn points(&self) -> i32 {
        match self {
            PointEvent::DocumentUploaded => 10,
            PointEvent::DocumentApproved => 5,
            PointEvent::CommentPosted => 2,
            PointEvent::LikeReceived => 3,
            PointEvent::FavoriteReceived => 2,
            PointEvent::AchievementUnlocked(reward) => *reward,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointEvent::DocumentUploaded => "document_uploaded",
            PointEvent::DocumentApproved => "document_approved",
            PointEvent::CommentPosted => "comment_posted",
            PointEvent::LikeReceived => "like_received",
            PointEvent::FavoriteReceived => "favorite_received",
            PointEvent::AchievementUnlocked(_) => "achievement_unlocked",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Level {
    pub rank: u8,
    pub label: &'static str,
    pub badge: &'static str,
    pub color: &'static str,
    pub min_points: i32,
}

pub static LEVELS: [Level; 5] = [
    Level { rank: 1, label: "Novato", badge: "🌱", color: "gray", min_points: 0 },
    Level { rank: 2, label: "Aprendiz", badge: "📘", color: "blue", min_points: 50 },
    Level { rank: 3, label: "Estudiante Destacado", badge: "🎓", color: "green", min_points: 150 },
    Level { rank: 4, label: "Experto", badge: "🏅", color: "purple", min_points: 400 },
    Level { rank: 5, label: "Leyenda", badge: "👑", color: "gold", min_points: 1000 },
];

pub fn level_for(points: i32) -> &'static Level {
    match points {
        p if p >= 1000 => &LEVELS[4],
        p if p >= 400 => &LEVELS[3],
        p if p >= 150 => &LEVELS[2],
        p if p >= 50 => &LEVELS[1],
        _ => &LEVELS[0],
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct LevelProgress {
    pub next_label: &'static str,
    pub next_threshold: i32,
    pub points_needed: i32,
    pub percent: u8,
}

/// `None` once the top level is reached.
pub fn progress_to_next(points: i32) -> Option<LevelProgress> {
    let points = points.max(0);
    let current = level_for(points);
    let next = LEVELS.get(current.rank as usize)?;

    let span = next.min_points - current.min_points;
    let earned = points - current.min_points;

    Some(LevelProgress {
        next_label: next.label,
        next_threshold: next.min_points,
        points_needed: next.min_points - points,
        percent: ((earned * 100) / span).clamp(0, 100) as u8,
    })
}

pub struct GamificationService {
    db: Database,
}

impl GamificationService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the new point total.
    pub async fn award(&self, user_id: Uuid, event: PointEvent) -> Result<i32> {
        let total: i32 = sqlx::query_scalar(
            "UPDATE profiles SET points = points + $1, updated_at = NOW() WHERE id = $2 RETURNING points",
        )
        .bind(event.points())
        .bind(user_id)
        .fetch_one(&self.db.pg)
        .await?;

        tracing::debug!(
            user_id = %user_id,
            event = event.as_str(),
            points = event.points(),
            total,
            "Points awarded"
        );

        Ok(total)
    }

    /// Point awards never fail the request that earned them.
    pub async fn award_or_log(&self, user_id: Uuid, event: PointEvent) {
        if let Err(e) = self.award(user_id, event).await {
            tracing::warn!(user_id = %user_id, event = event.as_str(), error = %e, "Failed to award points");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_boundaries_are_inclusive() {
        assert_eq!(level_for(0).label, "Novato");
        assert_eq!(level_for(49).label, "Novato");
        assert_eq!(level_for(50).label, "Aprendiz");
        assert_eq!(level_for(149).label, "Aprendiz");
        assert_eq!(level_for(150).label, "Estudiante Destacado");
        assert_eq!(level_for(400).label, "Experto");
        assert_eq!(level_for(999).color, "purple");
        assert_eq!(level_for(1000).badge, "👑");
        assert_eq!(level_for(250_000).rank, 5);
    }

    #[test]
    fn negative_points_clamp_to_first_level() {
        assert_eq!(level_for(-20).rank, 1);
        let progress = progress_to_next(-20).unwrap();
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.points_needed, 50);
    }

    #[test]
    fn progress_within_a_level() {
        let progress = progress_to_next(100).unwrap();
        assert_eq!(progress.next_label, "Estudiante Destacado");
        assert_eq!(progress.next_threshold, 150);
        assert_eq!(progress.points_needed, 50);
        assert_eq!(progress.percent, 50);
    }

    #[test]
    fn top_level_has_no_next() {
        assert!(progress_to_next(1000).is_none());
        assert!(progress_to_next(5000).is_none());
    }

    #[test]
    fn event_points() {
        assert_eq!(PointEvent::DocumentUploaded.points(), 10);
        assert_eq!(PointEvent::LikeReceived.points(), 3);
        assert_eq!(PointEvent::AchievementUnlocked(25).points(), 25);
    }
}
