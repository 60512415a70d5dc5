//! In-memory collaborators for exercising the web layer against a real desk.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use docdesk_core::{
    AuthGrant, Credentials, Document, DocumentDesk, DocumentFields, DocumentId, DocumentRepository,
    DownloadSink, FileUpload, OcrText, PortError, PortResult, Registration, SearchQuery,
    TokenStore, User,
};
use std::sync::{Arc, Mutex};

/// What the repository was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search(String),
    Create { title: String, file: Option<String> },
    Update { id: DocumentId, file: Option<String> },
    Upload { id: DocumentId, file: String },
    Delete(DocumentId),
    DeleteFile(DocumentId),
}

#[derive(Default)]
struct Recorded {
    calls: Vec<Call>,
    expired: bool,
}

/// Answers every search with one document titled after the search term, so
/// the list always shows which query was applied last.
#[derive(Default)]
pub struct RecordingRepository {
    recorded: Mutex<Recorded>,
}

impl RecordingRepository {
    pub fn calls(&self) -> Vec<Call> {
        self.recorded.lock().unwrap().calls.clone()
    }

    /// Every later authenticated call is refused with a 401.
    pub fn expire_sessions(&self) {
        self.recorded.lock().unwrap().expired = true;
    }

    fn record(&self, call: Call) -> PortResult<()> {
        let mut recorded = self.recorded.lock().unwrap();
        if recorded.expired {
            return Err(PortError::Unauthorized);
        }
        recorded.calls.push(call);
        Ok(())
    }
}

pub fn user() -> User {
    User {
        id: 1,
        username: "ada".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "ada".into(),
        password: "analytical-engine".into(),
    }
}

pub fn document(id: DocumentId, title: &str) -> Document {
    Document {
        id,
        title: title.to_string(),
        number: format!("N-{}", id),
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        description: None,
        has_file: false,
        original_filename: None,
        content_type: None,
        file_size: None,
    }
}

pub fn upload(name: &str) -> FileUpload {
    FileUpload {
        filename: name.to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: Bytes::from_static(b"%PDF"),
    }
}

#[async_trait]
impl DocumentRepository for RecordingRepository {
    async fn validate_token(&self, _token: &str) -> PortResult<User> {
        Ok(user())
    }

    async fn login(&self, _credentials: &Credentials) -> PortResult<AuthGrant> {
        Ok(AuthGrant {
            token: "token".into(),
            user: user(),
        })
    }

    async fn register(&self, _registration: &Registration) -> PortResult<AuthGrant> {
        Err(PortError::Rejected("Username is already taken!".into()))
    }

    async fn search_documents(&self, _token: &str, query: &SearchQuery) -> PortResult<Vec<Document>> {
        self.record(Call::Search(query.term.clone()))?;
        Ok(vec![document(1, &query.term)])
    }

    async fn create_document(
        &self,
        _token: &str,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document> {
        self.record(Call::Create {
            title: fields.title.clone(),
            file: file.map(|f| f.filename.clone()),
        })?;
        Ok(document(2, &fields.title))
    }

    async fn update_document(
        &self,
        _token: &str,
        id: DocumentId,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document> {
        self.record(Call::Update {
            id,
            file: file.map(|f| f.filename.clone()),
        })?;
        Ok(document(id, &fields.title))
    }

    async fn delete_document(&self, _token: &str, id: DocumentId) -> PortResult<()> {
        self.record(Call::Delete(id))
    }

    async fn upload_file(&self, _token: &str, id: DocumentId, file: &FileUpload) -> PortResult<Document> {
        self.record(Call::Upload {
            id,
            file: file.filename.clone(),
        })?;
        Ok(document(id, "attached"))
    }

    async fn delete_file(&self, _token: &str, id: DocumentId) -> PortResult<Document> {
        self.record(Call::DeleteFile(id))?;
        Ok(document(id, "detached"))
    }

    async fn download_file(&self, _token: &str, _id: DocumentId) -> PortResult<Bytes> {
        Err(PortError::NotFound("No file attached to this document".into()))
    }

    async fn fetch_ocr_text(&self, _token: &str, _id: DocumentId) -> PortResult<OcrText> {
        Ok(OcrText::Unavailable)
    }
}

#[derive(Default)]
pub struct NoTokens;

#[async_trait]
impl TokenStore for NoTokens {
    async fn load(&self) -> PortResult<Option<String>> {
        Ok(None)
    }

    async fn save(&self, _token: &str) -> PortResult<()> {
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoDownloads;

#[async_trait]
impl DownloadSink for NoDownloads {
    async fn deliver(&self, filename: &str, _bytes: Bytes) -> PortResult<String> {
        Ok(format!("memory://{}", filename))
    }
}

pub fn desk(repo: &Arc<RecordingRepository>) -> Arc<DocumentDesk> {
    Arc::new(DocumentDesk::new(
        repo.clone(),
        Arc::new(NoTokens),
        Arc::new(NoDownloads),
    ))
}
