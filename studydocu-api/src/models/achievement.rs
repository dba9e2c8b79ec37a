use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCode {
    FirstUpload,
    FiveUploads,
    TenLikes,
}

/// Counts the achievement thresholds are compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContributionStats {
    pub uploads: i64,
    pub likes_received: i64,
}

impl AchievementCode {
    pub const ALL: [AchievementCode; 3] = [
        AchievementCode::FirstUpload,
        AchievementCode::FiveUploads,
        AchievementCode::TenLikes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementCode::FirstUpload => "first_upload",
            AchievementCode::FiveUploads => "five_uploads",
            AchievementCode::TenLikes => "ten_likes",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == code)
    }

    pub fn title(&self) -> &'static str {
        match self {
            AchievementCode::FirstUpload => "Primer aporte",
            AchievementCode::FiveUploads => "Colaborador constante",
            AchievementCode::TenLikes => "Contenido popular",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AchievementCode::FirstUpload => "Subiste tu primer documento",
            AchievementCode::FiveUploads => "Subiste 5 documentos",
            AchievementCode::TenLikes => "Tus documentos recibieron 10 me gusta",
        }
    }

    pub fn points_reward(&self) -> i32 {
        match self {
            AchievementCode::FirstUpload => 10,
            AchievementCode::FiveUploads => 25,
            AchievementCode::TenLikes => 30,
        }
    }

    pub fn is_met(&self, stats: &ContributionStats) -> bool {
        match self {
            AchievementCode::FirstUpload => stats.uploads >= 1,
            AchievementCode::FiveUploads => stats.uploads >= 5,
            AchievementCode::TenLikes => stats.likes_received >= 10,
        }
    }
}

pub fn evaluate(stats: &ContributionStats) -> Vec<AchievementCode> {
    AchievementCode::ALL
        .into_iter()
        .filter(|a| a.is_met(stats))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementStatus {
    pub code: AchievementCode,
    pub title: &'static str,
    pub description: &'static str,
    pub points_reward: i32,
    pub unlocked: bool,
    pub granted_at: Option<DateTime<Utc>>,
}

impl AchievementStatus {
    pub fn new(code: AchievementCode, granted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            code,
            title: code.title(),
            description: code.description(),
            points_reward: code.points_reward(),
            unlocked: granted_at.is_some(),
            granted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_unlocked_for_new_users() {
        assert!(evaluate(&ContributionStats::default()).is_empty());
    }

    #[test]
    fn upload_thresholds() {
        let one = ContributionStats { uploads: 1, likes_received: 0 };
        assert_eq!(evaluate(&one), vec![AchievementCode::FirstUpload]);

        let four = ContributionStats { uploads: 4, likes_received: 9 };
        assert_eq!(evaluate(&four), vec![AchievementCode::FirstUpload]);

        let five = ContributionStats { uploads: 5, likes_received: 0 };
        assert_eq!(
            evaluate(&five),
            vec![AchievementCode::FirstUpload, AchievementCode::FiveUploads]
        );
    }

    #[test]
    fn likes_threshold_is_independent_of_uploads() {
        let stats = ContributionStats { uploads: 0, likes_received: 10 };
        assert_eq!(evaluate(&stats), vec![AchievementCode::TenLikes]);
    }

    #[test]
    fn codes_round_trip_through_strings() {
        for code in AchievementCode::ALL {
            assert_eq!(AchievementCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(AchievementCode::parse("unknown"), None);
    }
}
