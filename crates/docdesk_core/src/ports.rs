//! crates/docdesk_core/src/ports.rs
//!
//! Defines the service contracts (traits) the coordinator talks through.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! core independent of HTTP, the filesystem and any particular UI.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{
    AuthGrant, Credentials, Document, DocumentFields, DocumentId, FileUpload, OcrText,
    Registration, SearchQuery, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors of the transport underneath.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The repository answered 401: the session is no longer valid.
    #[error("Unauthorized")]
    Unauthorized,
    /// Malformed or rejected input, with the server's message.
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    /// Transport-level failure, timeouts included.
    #[error("Network failure: {0}")]
    Network(String),
}

impl PortError {
    /// The text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            PortError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            PortError::Rejected(msg) | PortError::NotFound(msg) | PortError::Unexpected(msg) => {
                msg.clone()
            }
            PortError::Network(msg) => format!("Could not reach the server: {}", msg),
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote document repository. Every call except the three auth calls
/// carries the bearer token of the current session.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    // --- Auth ---
    async fn validate_token(&self, token: &str) -> PortResult<User>;

    async fn login(&self, credentials: &Credentials) -> PortResult<AuthGrant>;

    async fn register(&self, registration: &Registration) -> PortResult<AuthGrant>;

    // --- Listing ---
    /// Runs one list query; the mode selects metadata or OCR search.
    async fn search_documents(&self, token: &str, query: &SearchQuery) -> PortResult<Vec<Document>>;

    // --- Mutations ---
    async fn create_document(
        &self,
        token: &str,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document>;

    async fn update_document(
        &self,
        token: &str,
        id: DocumentId,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document>;

    async fn delete_document(&self, token: &str, id: DocumentId) -> PortResult<()>;

    async fn upload_file(&self, token: &str, id: DocumentId, file: &FileUpload) -> PortResult<Document>;

    async fn delete_file(&self, token: &str, id: DocumentId) -> PortResult<Document>;

    // --- Reads that bypass the list ---
    async fn download_file(&self, token: &str, id: DocumentId) -> PortResult<Bytes>;

    async fn fetch_ocr_text(&self, token: &str, id: DocumentId) -> PortResult<OcrText>;
}

/// Durable storage for the session token, the only state that survives a restart.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> PortResult<Option<String>>;

    async fn save(&self, token: &str) -> PortResult<()>;

    async fn clear(&self) -> PortResult<()>;
}

/// Delivers downloaded file bytes to the user as a local save.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Saves the file and returns a human-readable description of where it went.
    async fn deliver(&self, filename: &str, bytes: Bytes) -> PortResult<String>;
}
