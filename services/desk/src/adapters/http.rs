//! services/desk/src/adapters/http.rs
//!
//! The HTTP adapter, the concrete implementation of the `DocumentRepository`
//! port from the core crate. It speaks JSON and multipart to the remote
//! document repository using `reqwest`, and maps every failure onto
//! `PortError` so the core never sees a transport type.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use docdesk_core::domain::{
    AuthGrant, Credentials, Document, DocumentFields, DocumentId, FileUpload, OcrText,
    Registration, SearchMode, SearchQuery, User,
};
use docdesk_core::ports::{DocumentRepository, PortError, PortResult};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const FALLBACK_MESSAGE: &str = "Something went wrong";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A `reqwest` client bound to one repository base URL.
#[derive(Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
}

impl HttpRepository {
    /// Creates a new `HttpRepository`. Without a timeout a request waits as
    /// long as the server does.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and turns any non-2xx status into a `PortError`.
    async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| {
            error!("Could not decode the repository response: {}", e);
            PortError::Unexpected(format!("Malformed response from the server: {}", e))
        })
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        error!("Repository request timed out: {}", e);
        PortError::Network("the request timed out".to_string())
    } else {
        error!("Repository request failed: {}", e);
        PortError::Network(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> PortError {
    debug!(%status, "Repository answered with an error status");
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            PortError::Rejected(message)
        }
        _ => PortError::Unexpected(message),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// The user-facing message in an error body: a JSON `message` field, else
/// the body as plain text.
pub fn error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<ErrorBody>(trimmed)
            .ok()
            .and_then(|parsed| parsed.message)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
    }
    if trimmed.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthRecord {
    token: Option<String>,
    id: i64,
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}
impl AuthRecord {
    fn to_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
        }
    }

    fn to_grant(mut self) -> PortResult<AuthGrant> {
        let token = self
            .token
            .take()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PortError::Unexpected("The server did not return a token".to_string()))?;
        Ok(AuthGrant {
            token,
            user: self.to_user(),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRecord {
    id: DocumentId,
    title: String,
    number: String,
    date: NaiveDate,
    description: Option<String>,
    #[serde(default)]
    has_file: bool,
    original_filename: Option<String>,
    content_type: Option<String>,
    file_size: Option<u64>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            title: self.title,
            number: self.number,
            date: self.date,
            description: self.description,
            has_file: self.has_file,
            original_filename: self.original_filename,
            content_type: self.content_type,
            file_size: self.file_size,
        }
    }
}

/// One page of a list query. Only the first page is ever requested.
#[derive(Deserialize)]
struct PageRecord {
    #[serde(default)]
    content: Vec<DocumentRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrTextRecord {
    ocr_text: Option<String>,
}

#[derive(Serialize)]
struct LoginPayload<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterPayload<'a> {
    username: &'a str,
    password: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Serialize)]
struct DocumentPayload<'a> {
    title: &'a str,
    number: &'a str,
    date: NaiveDate,
    description: Option<&'a str>,
}

//=========================================================================================
// Multipart Bodies
//=========================================================================================

fn file_part(file: &FileUpload) -> PortResult<Part> {
    let part = Part::bytes(file.bytes.to_vec()).file_name(file.filename.clone());
    match &file.content_type {
        Some(content_type) => part
            .mime_str(content_type)
            .map_err(|_| PortError::Rejected(format!("Unsupported content type: {}", content_type))),
        None => Ok(part),
    }
}

/// The create/update body: a JSON `document` part and an optional `file` part.
fn document_form(fields: &DocumentFields, file: Option<&FileUpload>) -> PortResult<Form> {
    let payload = DocumentPayload {
        title: &fields.title,
        number: &fields.number,
        date: fields.date,
        description: fields.description.as_deref(),
    };
    let json = serde_json::to_vec(&payload)
        .map_err(|e| PortError::Unexpected(format!("Could not encode the document: {}", e)))?;
    let document = Part::bytes(json)
        .mime_str("application/json")
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    let mut form = Form::new().part("document", document);
    if let Some(file) = file {
        form = form.part("file", file_part(file)?);
    }
    Ok(form)
}

//=========================================================================================
// DocumentRepository Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentRepository for HttpRepository {
    async fn validate_token(&self, token: &str) -> PortResult<User> {
        let request = self.client.get(self.url("/auth/validate")).bearer_auth(token);
        let record: AuthRecord = self.send_json(request).await?;
        Ok(record.to_user())
    }

    async fn login(&self, credentials: &Credentials) -> PortResult<AuthGrant> {
        let request = self.client.post(self.url("/auth/login")).json(&LoginPayload {
            username: &credentials.username,
            password: &credentials.password,
        });
        let record: AuthRecord = self.send_json(request).await?;
        record.to_grant()
    }

    async fn register(&self, registration: &Registration) -> PortResult<AuthGrant> {
        let request = self.client.post(self.url("/auth/register")).json(&RegisterPayload {
            username: &registration.username,
            password: &registration.password,
            email: &registration.email,
            first_name: &registration.first_name,
            last_name: &registration.last_name,
        });
        let record: AuthRecord = self.send_json(request).await?;
        record.to_grant()
    }

    async fn search_documents(&self, token: &str, query: &SearchQuery) -> PortResult<Vec<Document>> {
        let request = match query.mode {
            SearchMode::Metadata => self
                .client
                .get(self.url("/documents"))
                .query(&[("search", query.term.as_str())]),
            SearchMode::Ocr => self
                .client
                .get(self.url("/documents/ocr/search"))
                .query(&[("query", query.term.as_str())]),
        };
        let page: PageRecord = self.send_json(request.bearer_auth(token)).await?;
        Ok(page.content.into_iter().map(DocumentRecord::to_domain).collect())
    }

    async fn create_document(
        &self,
        token: &str,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document> {
        let request = self
            .client
            .post(self.url("/documents"))
            .bearer_auth(token)
            .multipart(document_form(fields, file)?);
        let record: DocumentRecord = self.send_json(request).await?;
        Ok(record.to_domain())
    }

    async fn update_document(
        &self,
        token: &str,
        id: DocumentId,
        fields: &DocumentFields,
        file: Option<&FileUpload>,
    ) -> PortResult<Document> {
        let request = self
            .client
            .put(self.url(&format!("/documents/{}", id)))
            .bearer_auth(token)
            .multipart(document_form(fields, file)?);
        let record: DocumentRecord = self.send_json(request).await?;
        Ok(record.to_domain())
    }

    async fn delete_document(&self, token: &str, id: DocumentId) -> PortResult<()> {
        let request = self
            .client
            .delete(self.url(&format!("/documents/{}", id)))
            .bearer_auth(token);
        self.send(request).await?;
        Ok(())
    }

    async fn upload_file(&self, token: &str, id: DocumentId, file: &FileUpload) -> PortResult<Document> {
        let request = self
            .client
            .post(self.url(&format!("/documents/{}/upload", id)))
            .bearer_auth(token)
            .multipart(Form::new().part("file", file_part(file)?));
        let record: DocumentRecord = self.send_json(request).await?;
        Ok(record.to_domain())
    }

    async fn delete_file(&self, token: &str, id: DocumentId) -> PortResult<Document> {
        let request = self
            .client
            .delete(self.url(&format!("/documents/{}/file", id)))
            .bearer_auth(token);
        let record: DocumentRecord = self.send_json(request).await?;
        Ok(record.to_domain())
    }

    async fn download_file(&self, token: &str, id: DocumentId) -> PortResult<Bytes> {
        let request = self
            .client
            .get(self.url(&format!("/documents/{}/download", id)))
            .bearer_auth(token);
        let response = self.send(request).await?;
        response.bytes().await.map_err(transport_error)
    }

    async fn fetch_ocr_text(&self, token: &str, id: DocumentId) -> PortResult<OcrText> {
        let request = self
            .client
            .get(self.url(&format!("/documents/{}/ocr/text", id)))
            .bearer_auth(token);
        let record: OcrTextRecord = self.send_json(request).await?;
        Ok(OcrText::from_raw(record.ocr_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_the_json_message() {
        assert_eq!(
            error_message(r#"{"message":"Number already exists","status":400}"#),
            "Number already exists"
        );
    }

    #[test]
    fn error_message_falls_back_to_plain_text() {
        assert_eq!(error_message("Username is already taken!"), "Username is already taken!");
        assert_eq!(error_message("  "), FALLBACK_MESSAGE);
        assert_eq!(error_message(r#"{"status":500}"#), FALLBACK_MESSAGE);
    }

    #[test]
    fn statuses_map_onto_port_errors() {
        assert_eq!(status_error(StatusCode::UNAUTHORIZED, "Invalid token"), PortError::Unauthorized);
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, "Document not found"),
            PortError::NotFound("Document not found".to_string())
        );
        assert_eq!(
            status_error(StatusCode::CONFLICT, "taken"),
            PortError::Rejected("taken".to_string())
        );
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            PortError::Unexpected(FALLBACK_MESSAGE.to_string())
        );
    }

    #[test]
    fn document_records_accept_the_repository_shape() {
        let json = r#"{
            "id": 7, "title": "Invoice", "number": "INV-1", "date": "2024-01-01",
            "description": null, "createdAt": "2024-01-01T10:00:00",
            "hasFile": true, "originalFilename": "scan.pdf",
            "contentType": "application/pdf", "fileSize": 2048,
            "ocrText": "ignored", "ocrProcessed": true
        }"#;
        let doc = serde_json::from_str::<DocumentRecord>(json).unwrap().to_domain();
        assert_eq!(doc.id, 7);
        assert!(doc.has_file);
        assert_eq!(doc.size_kb(), Some(2));
        assert_eq!(doc.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
