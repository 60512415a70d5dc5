//! In-memory collaborators for driving `DocumentDesk` in tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use docdesk_core::{
    AuthGrant, Credentials, Document, DocumentDesk, DocumentFields, DocumentId, DocumentRepository,
    DownloadSink, FileUpload, OcrText, PortError, PortResult, Registration, SearchMode,
    SearchQuery, TokenStore, User,
};
use tokio::sync::oneshot;

pub const USERNAME: &str = "ada";
pub const PASSWORD: &str = "analytical-engine";

//=========================================================================================
// Fake repository
//=========================================================================================

struct Stored {
    document: Document,
    file: Option<FileUpload>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, (String, User)>,
    tokens: HashSet<String>,
    issued: u64,
    next_id: DocumentId,
    documents: BTreeMap<DocumentId, Stored>,
    ocr_texts: HashMap<DocumentId, String>,
    searches: Vec<SearchQuery>,
    ocr_calls: HashMap<DocumentId, usize>,
    mutation_calls: usize,
    fail_next: Option<PortError>,
    fail_ocr: bool,
}

/// A repository that keeps everything in memory and records what it was asked.
#[derive(Default)]
pub struct FakeRepository {
    inner: Mutex<Inner>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

pub fn user() -> User {
    User {
        id: 1,
        username: USERNAME.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
    }
}

impl FakeRepository {
    pub fn new() -> Self {
        let repo = Self::default();
        {
            let mut inner = repo.inner.lock().unwrap();
            inner.next_id = 1;
            inner
                .accounts
                .insert(USERNAME.to_string(), (PASSWORD.to_string(), user()));
        }
        repo
    }

    /// Makes `token` valid, as if issued by an earlier login.
    pub fn accept_token(&self, token: &str) {
        self.inner.lock().unwrap().tokens.insert(token.to_string());
    }

    /// Every outstanding token stops being valid.
    pub fn expire_sessions(&self) {
        self.inner.lock().unwrap().tokens.clear();
    }

    /// The next authenticated call fails with `error`.
    pub fn fail_next(&self, error: PortError) {
        self.inner.lock().unwrap().fail_next = Some(error);
    }

    pub fn fail_ocr(&self, fail: bool) {
        self.inner.lock().unwrap().fail_ocr = fail;
    }

    /// Holds the response to the next search for `term` until the returned
    /// sender fires.
    pub fn hold_search(&self, term: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(term.to_string(), rx);
        tx
    }

    pub fn searches(&self) -> Vec<SearchQuery> {
        self.inner.lock().unwrap().searches.clone()
    }

    pub fn ocr_calls(&self, id: DocumentId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .ocr_calls
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn mutation_calls(&self) -> usize {
        self.inner.lock().unwrap().mutation_calls
    }

    pub fn stored_file(&self, id: DocumentId) -> Option<FileUpload> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(&id)
            .and_then(|stored| stored.file.clone())
    }

    fn check(&self, token: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.tokens.contains(token) {
            return Err(PortError::Unauthorized);
        }
        match inner.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn grant(&self, user: User) -> AuthGrant {
        let mut inner = self.inner.lock().unwrap();
        inner.issued += 1;
        let token = format!("token-{}", inner.issued);
        inner.tokens.insert(token.clone());
        AuthGrant { token, user }
    }

    fn attach(inner: &mut Inner, id: DocumentId, file: &FileUpload) {
        let Some(stored) = inner.documents.get_mut(&id) else {
            return;
        };
        stored.document.has_file = true;
        stored.document.original_filename = Some(file.filename.clone());
        stored.document.content_type = file.content_type.clone();
        stored.document.file_size = Some(file.bytes.len() as u64);
        stored.file = Some(file.clone());
        inner
            .ocr_texts
            .insert(id, format!("Scanned text of {}", file.filename));
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl DocumentRepository for FakeRepository {
    async fn validate_token(&self, token: &str) -> PortResult<User> {
        let inner = self.inner.lock().unwrap();
        if inner.tokens.contains(token) {
            Ok(user())
        } else {
            Err(PortError::Unauthorized)
        }
    }

    async fn login(&self, credentials: &Credentials) -> PortResult<AuthGrant> {
        let account = self
            .inner
            .lock()
            .unwrap()
            .accounts
            .get(&credentials.username)
            .cloned();
        match account {
            Some((password, user)) if password == credentials.password => Ok(self.grant(user)),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn register(&self, registration: &Registration) -> PortResult<AuthGrant> {
        let user = {
            let mut inner = self.inner.lock().unwrap();
            if inner.accounts.contains_key(&registration.username) {
                return Err(PortError::Rejected("Username is already taken!".to_string()));
            }
            let user = User {
                id: inner.accounts.len() as i64 + 1,
                username: registration.username.clone(),
                first_name: registration.first_name.clone(),
                last_name: registration.last_name.clone(),
                email: registration.email.clone(),
            };
            inner.accounts.insert(
                registration.username.clone(),
                (registration.password.clone(), user.clone()),
            );
            user
        };
        Ok(self.grant(user))
    }

    async fn search_documents(&self, token: &str, query: &SearchQuery) -> PortResult<Vec<Document>> {
        self.inner.lock().unwrap().searches.push(query.clone());

        let gate = self.gates.lock().unwrap().remove(&query.term);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.check(token)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .documents
            .iter()
            .filter(|(id, stored)| {
                let doc = &stored.document;
                match query.mode {
                    SearchMode::Metadata => {
                        query.term.is_empty()
                            || contains(&doc.title, &query.term)
                            || contains(&doc.number, &query.term)
                            || doc
                                .description
                                .as_deref()
                                .is_some_and(|d| contains(d, &query.term))
                    }
                    SearchMode::Ocr => inner
                        .ocr_texts
                        .get(id)
                        .is_some_and(|text| contains(text, &query.term)),
                }
            })
            .map(|(_, stored)| stored.document.clone())
            .collect())
    }

    async fn create_document(
        &self,
        token: &str,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document> {
        self.inner.lock().unwrap().mutation_calls += 1;
        self.check(token)?;
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        let document = Document {
            id,
            title: fields.title.clone(),
            number: fields.number.clone(),
            date: fields.date,
            description: fields.description.clone(),
            has_file: false,
            original_filename: None,
            content_type: None,
            file_size: None,
        };
        inner.documents.insert(id, Stored { document, file: None });
        if let Some(file) = file {
            Self::attach(&mut inner, id, file);
        }
        Ok(inner.documents[&id].document.clone())
    }

    async fn update_document(
        &self,
        token: &str,
        id: DocumentId,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document> {
        self.inner.lock().unwrap().mutation_calls += 1;
        self.check(token)?;
        let mut inner = self.inner.lock().unwrap();
        let Some(stored) = inner.documents.get_mut(&id) else {
            return Err(PortError::NotFound(format!("Document not found with id: {}", id)));
        };
        stored.document.title = fields.title.clone();
        stored.document.number = fields.number.clone();
        stored.document.date = fields.date;
        stored.document.description = fields.description.clone();
        if let Some(file) = file {
            Self::attach(&mut inner, id, file);
        }
        Ok(inner.documents[&id].document.clone())
    }

    async fn delete_document(&self, token: &str, id: DocumentId) -> PortResult<()> {
        self.inner.lock().unwrap().mutation_calls += 1;
        self.check(token)?;
        let mut inner = self.inner.lock().unwrap();
        inner.ocr_texts.remove(&id);
        inner
            .documents
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Document not found with id: {}", id)))
    }

    async fn upload_file(&self, token: &str, id: DocumentId, file: &FileUpload) -> PortResult<Document> {
        self.inner.lock().unwrap().mutation_calls += 1;
        self.check(token)?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.documents.contains_key(&id) {
            return Err(PortError::NotFound(format!("Document not found with id: {}", id)));
        }
        Self::attach(&mut inner, id, file);
        Ok(inner.documents[&id].document.clone())
    }

    async fn delete_file(&self, token: &str, id: DocumentId) -> PortResult<Document> {
        self.inner.lock().unwrap().mutation_calls += 1;
        self.check(token)?;
        let mut inner = self.inner.lock().unwrap();
        inner.ocr_texts.remove(&id);
        let Some(stored) = inner.documents.get_mut(&id) else {
            return Err(PortError::NotFound(format!("Document not found with id: {}", id)));
        };
        stored.file = None;
        stored.document.has_file = false;
        stored.document.original_filename = None;
        stored.document.content_type = None;
        stored.document.file_size = None;
        Ok(stored.document.clone())
    }

    async fn download_file(&self, token: &str, id: DocumentId) -> PortResult<Bytes> {
        self.check(token)?;
        self.stored_file(id)
            .map(|file| file.bytes)
            .ok_or_else(|| PortError::NotFound("No file attached to this document".to_string()))
    }

    async fn fetch_ocr_text(&self, token: &str, id: DocumentId) -> PortResult<OcrText> {
        *self.inner.lock().unwrap().ocr_calls.entry(id).or_insert(0) += 1;
        self.check(token)?;
        let inner = self.inner.lock().unwrap();
        if inner.fail_ocr {
            return Err(PortError::Unexpected("OCR service unavailable".to_string()));
        }
        Ok(OcrText::from_raw(inner.ocr_texts.get(&id).cloned()))
    }
}

//=========================================================================================
// Token store and download sink
//=========================================================================================

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> PortResult<Option<String>> {
        Ok(self.current())
    }

    async fn save(&self, token: &str) -> PortResult<()> {
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDownloads {
    saved: Mutex<Vec<(String, Bytes)>>,
}

impl MemoryDownloads {
    pub fn saved(&self) -> Vec<(String, Bytes)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadSink for MemoryDownloads {
    async fn deliver(&self, filename: &str, bytes: Bytes) -> PortResult<String> {
        self.saved.lock().unwrap().push((filename.to_string(), bytes));
        Ok(format!("memory://{}", filename))
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub struct Harness {
    pub repo: Arc<FakeRepository>,
    pub tokens: Arc<MemoryTokenStore>,
    pub downloads: Arc<MemoryDownloads>,
    pub desk: Arc<DocumentDesk>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tokens(MemoryTokenStore::default())
    }

    pub fn with_tokens(tokens: MemoryTokenStore) -> Self {
        let repo = Arc::new(FakeRepository::new());
        let tokens = Arc::new(tokens);
        let downloads = Arc::new(MemoryDownloads::default());
        let desk = Arc::new(DocumentDesk::new(
            repo.clone(),
            tokens.clone(),
            downloads.clone(),
        ));
        Self {
            repo,
            tokens,
            downloads,
            desk,
        }
    }

    /// A harness whose desk has already logged in.
    pub async fn signed_in() -> Self {
        let harness = Self::new();
        harness
            .desk
            .login(credentials())
            .await
            .expect("login with the seeded account");
        harness
    }

    pub fn titles(&self) -> Vec<String> {
        self.desk
            .view()
            .documents
            .iter()
            .map(|doc| doc.title.clone())
            .collect()
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
    }
}

pub fn fields(title: &str, number: &str) -> DocumentFields {
    DocumentFields {
        title: title.to_string(),
        number: number.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        description: None,
    }
}

pub fn file(name: &str, contents: &str) -> FileUpload {
    FileUpload {
        filename: name.to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: Bytes::from(contents.to_string()),
    }
}

/// Yields until the fake has seen `count` searches.
pub async fn wait_for_searches(repo: &FakeRepository, count: usize) {
    while repo.searches().len() < count {
        tokio::task::yield_now().await;
    }
}
