use std::collections::HashMap;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{
    Document, DocumentFilters, DocumentMetadata, DocumentSummary, DocumentType, UpdateDocument,
};
use crate::parser::{self, ParsedDocument};
use crate::services::{DocumentDetail, DocumentService, DownloadLink};
use crate::utils::{Page, Pagination};
use crate::AppState;

/// Multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let body_limit = DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/documents",
            get(browse_documents).post(upload_document).layer(body_limit),
        )
        .route("/documents/parse", post(parse_document).layer(body_limit))
        .route(
            "/documents/:id",
            get(get_document).patch(update_document).delete(delete_document),
        )
        .route("/documents/:id/download", get(download_document))
}

/// An uploaded file plus the text fields that came with it.
struct UploadForm {
    file_name: String,
    bytes: Vec<u8>,
    fields: HashMap<String, String>,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("El archivo supera el tamaño máximo permitido".to_string())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

async fn read_form(multipart: &mut Multipart) -> Result<UploadForm> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field
                .file_name()
                .map(String::from)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "documento".to_string());
            let bytes = field.bytes().await.map_err(multipart_error)?;
            file = Some((file_name, bytes.to_vec()));
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            fields.insert(name, value);
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| AppError::BadRequest("Falta el archivo (campo 'file')".to_string()))?;

    Ok(UploadForm {
        file_name,
        bytes,
        fields,
    })
}

fn optional(fields: &HashMap<String, String>, key: &str) -> Option<String> {
    fields
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn metadata_from_fields(fields: &HashMap<String, String>) -> Result<DocumentMetadata> {
    let document_type = match optional(fields, "document_type") {
        Some(value) => Some(DocumentType::parse(&value).ok_or_else(|| {
            AppError::BadRequest(format!("Tipo de documento inválido: {}", value))
        })?),
        None => None,
    };

    let is_premium = optional(fields, "is_premium")
        .map(|v| matches!(v.as_str(), "true" | "1" | "on"))
        .unwrap_or(false);

    Ok(DocumentMetadata {
        title: optional(fields, "title").unwrap_or_default(),
        description: optional(fields, "description"),
        subject: optional(fields, "subject").unwrap_or_default(),
        university: optional(fields, "university"),
        career: optional(fields, "career"),
        document_type,
        is_premium,
    })
}

async fn upload_document(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>)> {
    let form = read_form(&mut multipart).await?;
    let metadata = metadata_from_fields(&form.fields)?;

    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    let document = service
        .upload(
            &user,
            metadata,
            &form.file_name,
            form.bytes,
            state.config.storage.max_upload_bytes,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

/// Inspects a file without storing it.
async fn parse_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ParsedDocument>> {
    let form = read_form(&mut multipart).await?;
    crate::services::check_size(form.bytes.len(), state.config.storage.max_upload_bytes)?;

    let (parsed, _) = parser::parse_owned(form.file_name, form.bytes).await?;
    Ok(Json(parsed))
}

async fn browse_documents(
    State(state): State<AppState>,
    Query(filters): Query<DocumentFilters>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<DocumentSummary>>> {
    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    Ok(Json(service.browse(&filters, &pagination).await?))
}

async fn get_document(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentDetail>> {
    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    Ok(Json(service.detail(id, user.as_ref()).await?))
}

async fn download_document(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadLink>> {
    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    Ok(Json(service.download(id, user.as_ref()).await?))
}

async fn update_document(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDocument>,
) -> Result<Json<Document>> {
    payload.validate()?;

    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    Ok(Json(service.update(id, &user, &payload).await?))
}

async fn delete_document(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    service.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn form_fields_become_metadata() {
        let metadata = metadata_from_fields(&fields(&[
            ("title", "  Parcial de Física I "),
            ("subject", "Física"),
            ("career", ""),
            ("document_type", "examen"),
            ("is_premium", "on"),
        ]))
        .unwrap();

        assert_eq!(metadata.title, "Parcial de Física I");
        assert_eq!(metadata.career, None);
        assert_eq!(metadata.document_type, Some(DocumentType::Examen));
        assert!(metadata.is_premium);
    }

    #[test]
    fn unknown_document_type_is_rejected() {
        let result = metadata_from_fields(&fields(&[("document_type", "diapositivas")]));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
