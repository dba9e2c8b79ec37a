use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub document_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    #[validate(length(min = 1, max = 2000, message = "El comentario debe tener entre 1 y 2000 caracteres"))]
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

/// A like pays the owner once per (user, document) pair. `first_credit` is
/// whether the award ledger accepted the pair just now.
pub fn like_award_due(
    kind: ReactionKind,
    reactor_id: Uuid,
    owner_id: Uuid,
    first_credit: bool,
) -> bool {
    kind == ReactionKind::Like && reactor_id != owner_id && first_credit
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Serialize)]
pub struct ReactionState {
    pub counts: ReactionCounts,
    pub my_reaction: Option<ReactionKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Copyright,
    Inappropriate,
    WrongInfo,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::Spam => "spam",
            ReportReason::Copyright => "copyright",
            ReportReason::Inappropriate => "inappropriate",
            ReportReason::WrongInfo => "wrong_info",
            ReportReason::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Report {
    pub id: Uuid,
    pub document_id: Uuid,
    pub reporter_id: Uuid,
    pub reason: String,
    pub details: Option<String>,
    pub status: String,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReportWithDocument {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub document_status: String,
    pub reporter_id: Uuid,
    pub reporter_name: String,
    pub reason: String,
    pub details: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReport {
    pub reason: ReportReason,
    #[validate(length(max = 1000))]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays reactions the way the service does: the ledger is offered the
    /// pair only for likes by someone other than the owner.
    fn awards_for(sequence: &[Option<ReactionKind>], reactor: Uuid, owner: Uuid) -> usize {
        let mut credited = false;
        let mut awards = 0;
        for step in sequence {
            let Some(kind) = *step else { continue };
            let eligible = kind == ReactionKind::Like && reactor != owner;
            let first_credit = eligible && !credited;
            if like_award_due(kind, reactor, owner, first_credit) {
                credited = true;
                awards += 1;
            }
        }
        awards
    }

    #[test]
    fn toggling_a_like_pays_the_owner_once() {
        let (reactor, owner) = (Uuid::new_v4(), Uuid::new_v4());
        let like = Some(ReactionKind::Like);
        let dislike = Some(ReactionKind::Dislike);

        assert_eq!(awards_for(&[like, dislike, like, dislike, like], reactor, owner), 1);
        // None stands for removing the reaction
        assert_eq!(awards_for(&[like, None, like, None, like], reactor, owner), 1);
        assert_eq!(awards_for(&[dislike, dislike], reactor, owner), 0);
    }

    #[test]
    fn owners_never_pay_themselves() {
        let owner = Uuid::new_v4();
        assert!(!like_award_due(ReactionKind::Like, owner, owner, true));
        assert_eq!(awards_for(&[Some(ReactionKind::Like)], owner, owner), 0);
    }

    #[test]
    fn report_reason_wire_names() {
        let reason: ReportReason = serde_json::from_str("\"wrong_info\"").unwrap();
        assert_eq!(reason, ReportReason::WrongInfo);
        assert_eq!(reason.as_str(), "wrong_info");
    }
}
