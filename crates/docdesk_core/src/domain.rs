//! crates/docdesk_core/src/domain.rs
//!
//! Defines the pure, core data structures for the coordinator.
//! These structs are independent of the HTTP wire format; adapters convert
//! their own record types into them.

use bytes::Bytes;
use chrono::NaiveDate;

/// Server-assigned, stable document identifier.
pub type DocumentId = i64;

/// The identity record returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Username/password pair submitted from the login prompt.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Full registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// What a successful login or registration yields.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
}

/// A document as listed by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub number: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub has_file: bool,
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
    /// Attachment size in bytes.
    pub file_size: Option<u64>,
}

impl Document {
    /// Attachment size rounded to whole KiB, the way the list displays it.
    pub fn size_kb(&self) -> Option<u64> {
        self.file_size.map(|bytes| bytes.saturating_add(512) / 1024)
    }

    /// The editable metadata of this document.
    pub fn fields(&self) -> DocumentFields {
        DocumentFields {
            title: self.title.clone(),
            number: self.number.clone(),
            date: self.date,
            description: self.description.clone(),
        }
    }
}

/// The metadata part of a create/update submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFields {
    pub title: String,
    pub number: String,
    pub date: NaiveDate,
    pub description: Option<String>,
}

impl DocumentFields {
    /// Required-ness check run before anything is sent.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.number.trim().is_empty() {
            return Err("Number is required".to_string());
        }
        Ok(())
    }
}

/// A local file selected for upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// The result of an OCR text fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrText {
    Text(String),
    /// The repository has no extracted text for the document.
    Unavailable,
}

impl OcrText {
    /// Builds the value from a raw repository answer. Missing or empty text is
    /// absent; whitespace is kept as text.
    pub fn from_raw(raw: Option<String>) -> Self {
        match raw {
            Some(text) if !text.is_empty() => OcrText::Text(text),
            _ => OcrText::Unavailable,
        }
    }
}

/// Which index a list query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Structured metadata (title, number, description).
    Metadata,
    /// OCR-extracted text.
    Ocr,
}

/// One list query: the committed term under a mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub mode: SearchMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str, number: &str) -> DocumentFields {
        DocumentFields {
            title: title.to_string(),
            number: number.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: None,
        }
    }

    #[test]
    fn blank_title_or_number_is_rejected() {
        assert_eq!(fields("  ", "INV-1").validate(), Err("Title is required".to_string()));
        assert_eq!(fields("Invoice", "").validate(), Err("Number is required".to_string()));
        assert!(fields("Invoice", "INV-1").validate().is_ok());
    }

    #[test]
    fn only_missing_or_empty_ocr_text_is_unavailable() {
        assert_eq!(OcrText::from_raw(None), OcrText::Unavailable);
        assert_eq!(OcrText::from_raw(Some(String::new())), OcrText::Unavailable);
        assert_eq!(OcrText::from_raw(Some("  \n".into())), OcrText::Text("  \n".into()));
        assert_eq!(OcrText::from_raw(Some("total".into())), OcrText::Text("total".into()));
    }

    #[test]
    fn size_is_rounded_to_kib() {
        let mut doc = Document {
            id: 1,
            title: "t".into(),
            number: "n".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: None,
            has_file: true,
            original_filename: Some("scan.pdf".into()),
            content_type: None,
            file_size: Some(1536),
        };
        assert_eq!(doc.size_kb(), Some(2));
        doc.file_size = Some(1000);
        assert_eq!(doc.size_kb(), Some(1));
        doc.file_size = Some(u64::MAX);
        assert_eq!(doc.size_kb(), Some(u64::MAX / 1024));
        doc.file_size = None;
        assert_eq!(doc.size_kb(), None);
    }
}
