//! crates/docdesk_core/src/view.rs
//!
//! Immutable snapshots of coordinator state handed to the presentation layer.

use crate::domain::{Document, DocumentFields, DocumentId};
use crate::highlight::{highlight, Fragment};
use crate::query::SearchState;
use crate::session::{AuthMode, SessionStatus};

pub const NO_OCR_TEXT: &str = "No OCR text available for this document.";
pub const OCR_LOAD_FAILED: &str = "Failed to load OCR text.";

/// Everything the UI needs to render, as of one state change.
#[derive(Debug, Clone)]
pub struct DeskView {
    pub session: SessionStatus,
    /// `Some` while the authentication prompt is visible.
    pub auth_prompt: Option<AuthMode>,
    pub search: SearchState,
    pub loading: bool,
    pub documents: Vec<Document>,
    pub ocr_view: Option<OcrView>,
    pub form: EditForm,
    pub confirmation: Option<Confirmation>,
    pub notice: Option<Notice>,
}

/// The OCR text panel for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrView {
    pub document_id: DocumentId,
    pub title: String,
    /// The committed search term at the time the panel opened.
    pub keyword: String,
    pub loading: bool,
    pub text: String,
    pub(crate) seq: u64,
}

impl OcrView {
    pub(crate) fn opening(document_id: DocumentId, title: String, keyword: String, seq: u64) -> Self {
        Self {
            document_id,
            title,
            keyword,
            loading: true,
            text: String::new(),
            seq,
        }
    }

    pub(crate) fn show(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.loading = false;
    }

    /// The text split around matches of the keyword.
    pub fn fragments(&self) -> Vec<Fragment> {
        highlight(&self.text, &self.keyword)
    }
}

/// The create/edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditForm {
    Closed,
    Creating,
    Editing { id: DocumentId, fields: DocumentFields },
}

/// A destructive action waiting for the user to confirm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    DeleteDocument(DocumentId),
    DetachFile(DocumentId),
}

impl Confirmation {
    pub fn prompt(&self) -> &'static str {
        match self {
            Confirmation::DeleteDocument(_) => "Are you sure you want to delete this document?",
            Confirmation::DetachFile(_) => "Are you sure you want to delete the attached file?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A message surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}
