//! Inspection of uploaded files: type detection, content hash and the bits of
//! metadata we can pull out without a full office-format parser.

use lopdf::{Document, Object};
use serde::Serialize;

use crate::utils::sha256_hex;

const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    Text,
}

impl DocumentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Pptx => "pptx",
            DocumentKind::Text => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            DocumentKind::Text => "text/plain; charset=utf-8",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("el archivo está vacío")]
    Empty,

    #[error("formato no soportado; sube un PDF, DOCX, PPTX o TXT")]
    Unsupported,

    #[error("el PDF está dañado: {0}")]
    MalformedPdf(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    pub kind: DocumentKind,
    pub file_name: String,
    pub size_bytes: usize,
    pub sha256: String,
    pub page_count: Option<u32>,
    pub title: Option<String>,
    pub word_count: Option<usize>,
    pub preview: Option<String>,
}

fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Magic bytes first; the extension only disambiguates zip-based office formats.
pub fn detect_kind(file_name: &str, bytes: &[u8]) -> Option<DocumentKind> {
    if bytes.starts_with(b"%PDF-") {
        return Some(DocumentKind::Pdf);
    }

    if bytes.starts_with(b"PK\x03\x04") {
        return match extension_of(file_name).as_deref() {
            Some("docx") => Some(DocumentKind::Docx),
            Some("pptx") => Some(DocumentKind::Pptx),
            _ => None,
        };
    }

    match std::str::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') => Some(DocumentKind::Text),
        _ => None,
    }
}

pub fn parse(file_name: &str, bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }

    let kind = detect_kind(file_name, bytes).ok_or(ParseError::Unsupported)?;

    let mut parsed = ParsedDocument {
        kind,
        file_name: file_name.to_string(),
        size_bytes: bytes.len(),
        sha256: sha256_hex(bytes),
        page_count: None,
        title: None,
        word_count: None,
        preview: None,
    };

    match kind {
        DocumentKind::Pdf => inspect_pdf(bytes, &mut parsed)?,
        DocumentKind::Text => {
            // detect_kind already proved the bytes are UTF-8
            let text = String::from_utf8_lossy(bytes);
            parsed.word_count = Some(text.split_whitespace().count());
            parsed.preview = preview(&text);
        }
        DocumentKind::Docx | DocumentKind::Pptx => {}
    }

    Ok(parsed)
}

/// Runs [`parse`] on the blocking pool, since loading a large PDF is CPU-bound,
/// and hands the bytes back for storage.
pub async fn parse_owned(
    file_name: String,
    bytes: Vec<u8>,
) -> crate::error::Result<(ParsedDocument, Vec<u8>)> {
    let parsed = tokio::task::spawn_blocking(move || {
        parse(&file_name, &bytes).map(|parsed| (parsed, bytes))
    })
    .await
    .map_err(|e| anyhow::anyhow!("parser task failed: {}", e))??;
    Ok(parsed)
}

fn inspect_pdf(bytes: &[u8], parsed: &mut ParsedDocument) -> Result<(), ParseError> {
    let doc = Document::load_mem(bytes).map_err(|e| ParseError::MalformedPdf(e.to_string()))?;

    let pages = doc.get_pages();
    parsed.page_count = Some(pages.len() as u32);
    parsed.title = pdf_title(&doc);

    if let Some(first_page) = pages.keys().next() {
        match doc.extract_text(&[*first_page]) {
            Ok(text) => {
                parsed.word_count = Some(text.split_whitespace().count());
                parsed.preview = preview(&text);
            }
            Err(e) => tracing::debug!(error = %e, "No extractable text on first PDF page"),
        }
    }

    Ok(())
}

fn pdf_title(doc: &Document) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };

    match info.as_dict().ok()?.get(b"Title").ok()? {
        Object::String(raw, _) => {
            let title = String::from_utf8_lossy(raw).trim().to_string();
            (!title.is_empty()).then_some(title)
        }
        _ => None,
    }
}

fn preview(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(PREVIEW_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    fn build_pdf(title: &str, pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal("Derivadas")]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn detects_kind_from_magic_bytes() {
        assert_eq!(detect_kind("x.bin", b"%PDF-1.7\n"), Some(DocumentKind::Pdf));
        assert_eq!(detect_kind("apuntes.DOCX", b"PK\x03\x04rest"), Some(DocumentKind::Docx));
        assert_eq!(detect_kind("clase.pptx", b"PK\x03\x04rest"), Some(DocumentKind::Pptx));
        assert_eq!(detect_kind("archivo.zip", b"PK\x03\x04rest"), None);
        assert_eq!(detect_kind("notas.txt", "Álgebra lineal".as_bytes()), Some(DocumentKind::Text));
        assert_eq!(detect_kind("img.png", &[0x89, b'P', b'N', b'G', 0xff, 0xfe]), None);
    }

    #[test]
    fn text_files_get_word_count_and_preview() {
        let body = "Resumen   de\nHistoria del Perú";
        let parsed = parse("resumen.txt", body.as_bytes()).unwrap();
        assert_eq!(parsed.kind, DocumentKind::Text);
        assert_eq!(parsed.word_count, Some(5));
        assert_eq!(parsed.preview.as_deref(), Some("Resumen de Historia del Perú"));
        assert_eq!(parsed.sha256.len(), 64);
    }

    #[test]
    fn preview_is_capped() {
        let body = "palabra ".repeat(200);
        let parsed = parse("largo.txt", body.as_bytes()).unwrap();
        assert_eq!(parsed.preview.unwrap().chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn empty_and_unknown_files_are_rejected() {
        assert!(matches!(parse("vacio.pdf", b""), Err(ParseError::Empty)));
        assert!(matches!(
            parse("foto.jpg", &[0xff, 0xd8, 0xff, 0x00]),
            Err(ParseError::Unsupported)
        ));
    }

    #[tokio::test]
    async fn parse_owned_returns_the_bytes_and_maps_errors() {
        let body = b"Apuntes de Estadistica".to_vec();
        let (parsed, bytes) = parse_owned("apuntes.txt".into(), body.clone()).await.unwrap();
        assert_eq!(parsed.kind, DocumentKind::Text);
        assert_eq!(bytes, body);

        let err = parse_owned("foto.jpg".into(), vec![0xff, 0xd8, 0xff, 0x00])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::UnsupportedMediaType(_)));
    }

    #[test]
    fn truncated_pdf_is_malformed() {
        assert!(matches!(
            parse("roto.pdf", b"%PDF-1.4\n1 0 obj"),
            Err(ParseError::MalformedPdf(_))
        ));
    }

    #[test]
    fn pdf_page_count_and_title() {
        let bytes = build_pdf("Apuntes de Calculo", 3);
        let parsed = parse("calculo.pdf", &bytes).unwrap();
        assert_eq!(parsed.kind, DocumentKind::Pdf);
        assert_eq!(parsed.page_count, Some(3));
        assert_eq!(parsed.title.as_deref(), Some("Apuntes de Calculo"));
    }

    #[test]
    fn hash_is_stable_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
