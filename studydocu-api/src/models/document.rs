use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
    Removed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Apuntes,
    Examen,
    Resumen,
    Tarea,
    Libro,
    Otro,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Apuntes => "apuntes",
            DocumentType::Examen => "examen",
            DocumentType::Resumen => "resumen",
            DocumentType::Tarea => "tarea",
            DocumentType::Libro => "libro",
            DocumentType::Otro => "otro",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "apuntes" => Some(DocumentType::Apuntes),
            "examen" => Some(DocumentType::Examen),
            "resumen" => Some(DocumentType::Resumen),
            "tarea" => Some(DocumentType::Tarea),
            "libro" => Some(DocumentType::Libro),
            "otro" => Some(DocumentType::Otro),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub university: Option<String>,
    pub career: Option<String>,
    pub document_type: String,
    #[serde(skip_serializing)]
    pub file_key: String,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub file_hash: String,
    pub page_count: Option<i32>,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub is_premium: bool,
    pub views_count: i64,
    pub downloads_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_approved(&self) -> bool {
        self.status == DocumentStatus::Approved.as_str()
    }
}

/// Listing row with owner name and engagement counts joined in.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub title: String,
    pub subject: String,
    pub university: Option<String>,
    pub career: Option<String>,
    pub document_type: String,
    pub page_count: Option<i32>,
    pub status: String,
    pub is_premium: bool,
    pub views_count: i64,
    pub downloads_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Metadata that arrives alongside the file in the upload form.
#[derive(Debug, Clone, Default, Validate)]
pub struct DocumentMetadata {
    #[validate(length(min = 3, max = 200, message = "El título debe tener entre 3 y 200 caracteres"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 2, max = 120, message = "Indica el curso o materia"))]
    pub subject: String,
    #[validate(length(max = 160))]
    pub university: Option<String>,
    #[validate(length(max = 160))]
    pub career: Option<String>,
    pub document_type: Option<DocumentType>,
    pub is_premium: bool,
}

pub struct NewDocument {
    pub owner_id: Uuid,
    pub metadata: DocumentMetadata,
    pub file_key: String,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub file_hash: String,
    pub page_count: Option<i32>,
    pub status: DocumentStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDocument {
    #[validate(length(min = 3, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 2, max = 120))]
    pub subject: Option<String>,
    #[validate(length(max = 160))]
    pub university: Option<String>,
    #[validate(length(max = 160))]
    pub career: Option<String>,
    pub document_type: Option<DocumentType>,
    pub is_premium: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Recent,
    Popular,
}

impl SortOrder {
    pub fn order_by(&self) -> &'static str {
        match self {
            SortOrder::Recent => "d.created_at DESC",
            SortOrder::Popular => "likes_count DESC, d.downloads_count DESC, d.created_at DESC",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilters {
    pub subject: Option<String>,
    pub university: Option<String>,
    pub career: Option<String>,
    pub document_type: Option<DocumentType>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}
