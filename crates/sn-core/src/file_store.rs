//! Uploaded chat files.
//!
//! Bytes are kept in the `files` table next to the rest of the node state.
//! Each upload is classified once at write time; the classification and the
//! content type served back are stored with the bytes.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatFileType {
    Image,
    Document,
    PlainText,
    Csv,
}

impl ChatFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatFileType::Image => "image",
            ChatFileType::Document => "document",
            ChatFileType::PlainText => "plain_text",
            ChatFileType::Csv => "csv",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(ChatFileType::Image),
            "document" => Some(ChatFileType::Document),
            "plain_text" => Some(ChatFileType::PlainText),
            "csv" => Some(ChatFileType::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: ChatFileType,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub descriptor: FileDescriptor,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file {0} is empty")]
    Empty(String),

    #[error("unsupported file type for {0}")]
    UnsupportedType(String),

    #[error("invalid stored file: {0}")]
    InvalidRow(String),

    #[error("file store database error: {0}")]
    Database(#[from] sqlx::Error),
}

const OFFICE_TYPES: &[(&str, &str)] = &[
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
];

const TEXT_EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    ("json", "application/json"),
    ("log", "text/plain"),
    ("xml", "application/xml"),
    ("html", "text/html"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
];

/// Classifies an upload. Magic bytes win over the file name, the file name
/// wins over the declared content type (clients routinely send
/// `application/octet-stream`), and valid UTF-8 without NUL bytes falls back to
/// plain text. Returns the classification and the content type to serve.
pub fn detect_file_type(
    name: &str,
    declared_content_type: Option<&str>,
    content: &[u8],
) -> Option<(ChatFileType, String)> {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if let Some(image_type) = sniff_image(content) {
        return Some((ChatFileType::Image, image_type.to_string()));
    }
    if content.starts_with(b"%PDF-") {
        return Some((ChatFileType::Document, "application/pdf".to_string()));
    }
    if content.starts_with(b"PK\x03\x04") {
        return OFFICE_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| (ChatFileType::Document, mime.to_string()));
    }

    let is_text = std::str::from_utf8(content)
        .map(|text| !text.contains('\0'))
        .unwrap_or(false);
    if !is_text {
        return None;
    }

    if extension == "csv" {
        return Some((ChatFileType::Csv, "text/csv".to_string()));
    }
    if let Some((_, mime)) = TEXT_EXTENSIONS.iter().find(|(ext, _)| *ext == extension) {
        return Some((ChatFileType::PlainText, mime.to_string()));
    }
    match declared_content_type.map(|value| value.trim().to_ascii_lowercase()) {
        Some(declared) if declared.starts_with("text/csv") => {
            Some((ChatFileType::Csv, "text/csv".to_string()))
        }
        _ => Some((ChatFileType::PlainText, "text/plain".to_string())),
    }
}

fn sniff_image(content: &[u8]) -> Option<&'static str> {
    if content.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if content.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if content.starts_with(b"GIF87a") || content.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if content.len() >= 12 && &content[..4] == b"RIFF" && &content[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

pub async fn save_file(
    pool: &SqlitePool,
    name: &str,
    declared_content_type: Option<&str>,
    content: &[u8],
) -> Result<FileDescriptor, FileStoreError> {
    if content.is_empty() {
        return Err(FileStoreError::Empty(name.to_string()));
    }
    let (file_type, content_type) = detect_file_type(name, declared_content_type, content)
        .ok_or_else(|| FileStoreError::UnsupportedType(name.to_string()))?;

    let file_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO files (file_id, display_name, file_type, content_type, content, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&file_id)
    .bind(name)
    .bind(file_type.as_str())
    .bind(&content_type)
    .bind(content)
    .bind(crate::now_millis())
    .execute(pool)
    .await?;

    tracing::info!(
        file_id = %file_id,
        file_type = file_type.as_str(),
        bytes = content.len(),
        "file stored"
    );
    Ok(FileDescriptor {
        id: file_id,
        name: name.to_string(),
        file_type,
    })
}

pub async fn read_file(pool: &SqlitePool, file_id: &str) -> Result<StoredFile, FileStoreError> {
    let row = sqlx::query(
        "SELECT file_id, display_name, file_type, content_type, content FROM files WHERE file_id = ?",
    )
    .bind(file_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(FileStoreError::NotFound(file_id.to_string()));
    };
    let raw_type: String = row.try_get("file_type")?;
    let file_type = ChatFileType::parse(&raw_type)
        .ok_or_else(|| FileStoreError::InvalidRow(format!("unknown file type {raw_type}")))?;

    Ok(StoredFile {
        descriptor: FileDescriptor {
            id: row.try_get("file_id")?,
            name: row.try_get("display_name")?,
            file_type,
        },
        content_type: row.try_get("content_type")?,
        content: row.try_get("content")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

    #[test]
    fn pdf_is_detected_from_magic_bytes() {
        let (file_type, mime) =
            detect_file_type("report.bin", Some("application/octet-stream"), PDF_BYTES).unwrap();
        assert_eq!(file_type, ChatFileType::Document);
        assert_eq!(mime, "application/pdf");
    }

    #[test]
    fn images_are_detected_before_extension() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        let (file_type, mime) = detect_file_type("notes.txt", None, png).unwrap();
        assert_eq!(file_type, ChatFileType::Image);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn text_uploads_use_extension_then_declared_type() {
        assert_eq!(
            detect_file_type("rows.csv", None, b"a,b\n1,2\n").unwrap().0,
            ChatFileType::Csv
        );
        assert_eq!(
            detect_file_type("upload", Some("text/csv"), b"a,b\n").unwrap().0,
            ChatFileType::Csv
        );
        assert_eq!(
            detect_file_type("readme.md", None, b"# title").unwrap(),
            (ChatFileType::PlainText, "text/markdown".to_string())
        );
        assert_eq!(
            detect_file_type("upload", None, b"hello").unwrap().0,
            ChatFileType::PlainText
        );
    }

    #[test]
    fn unknown_binary_is_rejected() {
        assert!(detect_file_type("blob.bin", None, &[0x00, 0x9F, 0x92, 0x96]).is_none());
        assert!(detect_file_type("archive.zip", None, b"PK\x03\x04rest").is_none());
    }

    #[tokio::test]
    async fn save_then_read_returns_same_bytes() {
        let pool = crate::migrations::migrated_pool().await;
        let descriptor = save_file(&pool, "report.pdf", None, PDF_BYTES).await.unwrap();
        assert_eq!(descriptor.file_type, ChatFileType::Document);

        let stored = read_file(&pool, &descriptor.id).await.unwrap();
        assert_eq!(stored.descriptor, descriptor);
        assert_eq!(stored.content_type, "application/pdf");
        assert_eq!(stored.content, PDF_BYTES);
    }

    #[tokio::test]
    async fn empty_and_missing_files_are_errors() {
        let pool = crate::migrations::migrated_pool().await;
        assert!(matches!(
            save_file(&pool, "empty.txt", None, b"").await,
            Err(FileStoreError::Empty(_))
        ));
        assert!(matches!(
            read_file(&pool, "missing").await,
            Err(FileStoreError::NotFound(_))
        ));
    }
}
