//! services/desk/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser UI and the
//! coordinator. The UI sends events; the coordinator answers with complete
//! view snapshots after every state change.

use chrono::NaiveDate;
use docdesk_core::{
    AuthMode, Confirmation, DeskView, Document, DocumentFields, DocumentId, EditForm, Fragment,
    NoticeKind, OcrView, SessionStatus, User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: File contents never travel over the socket. The UI stages them with
// `POST /uploads` first and refers to the returned `upload_id` here.
//=========================================================================================

/// The metadata fields of the create/edit form.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FieldsInput {
    pub title: String,
    pub number: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<FieldsInput> for DocumentFields {
    fn from(input: FieldsInput) -> Self {
        DocumentFields {
            title: input.title,
            number: input.number,
            date: input.date,
            description: input.description,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthModeInput {
    Login,
    Register,
}

impl From<AuthModeInput> for AuthMode {
    fn from(mode: AuthModeInput) -> Self {
        match mode {
            AuthModeInput::Login => AuthMode::Login,
            AuthModeInput::Register => AuthMode::Register,
        }
    }
}

/// Represents the events a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // --- Session ---
    Login { username: String, password: String },
    Register {
        username: String,
        password: String,
        email: String,
        first_name: String,
        last_name: String,
    },
    Logout,
    SetAuthMode { mode: AuthModeInput },

    // --- Search ---
    /// A keystroke in the search box. Never triggers a fetch.
    SetDraftTerm { text: String },
    Commit,
    Clear,
    ToggleOcrMode,
    Refresh,

    // --- Form and mutations ---
    OpenCreateForm,
    OpenEditForm { id: DocumentId },
    CloseForm,
    CreateDocument {
        fields: FieldsInput,
        #[serde(default)]
        upload_id: Option<Uuid>,
    },
    UpdateDocument {
        id: DocumentId,
        fields: FieldsInput,
        #[serde(default)]
        upload_id: Option<Uuid>,
    },
    AttachFile { id: DocumentId, upload_id: Uuid },
    RequestDelete { id: DocumentId },
    RequestDetach { id: DocumentId },
    Confirm,
    DismissConfirmation,

    // --- Reads ---
    Download { id: DocumentId, filename: String },
    ShowOcrText { id: DocumentId, title: String },
    CloseOcrView,
    DismissNotice,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The complete state to render. Sent on connect and after every change.
    View { view: ViewPayload },

    /// A message that could not be handled at all (malformed JSON, unknown
    /// upload). Failures of desk operations arrive as the view's notice.
    Error { message: String },
}

#[derive(Serialize, Debug, Clone)]
pub struct UserPayload {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&User> for UserPayload {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionPayload {
    /// One of `unauthenticated`, `validating`, `authenticated`.
    pub status: &'static str,
    pub user: Option<UserPayload>,
}

#[derive(Serialize, Debug, Clone)]
pub struct SearchPayload {
    pub draft_term: String,
    pub committed_term: String,
    pub ocr_mode: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct DocumentPayload {
    pub id: DocumentId,
    pub title: String,
    pub number: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub has_file: bool,
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<u64>,
    pub size_kb: Option<u64>,
}

impl From<&Document> for DocumentPayload {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title.clone(),
            number: doc.number.clone(),
            date: doc.date,
            description: doc.description.clone(),
            has_file: doc.has_file,
            original_filename: doc.original_filename.clone(),
            content_type: doc.content_type.clone(),
            file_size: doc.file_size,
            size_kb: doc.size_kb(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FragmentPayload {
    pub text: String,
    pub highlighted: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct OcrViewPayload {
    pub document_id: DocumentId,
    pub title: String,
    pub keyword: String,
    pub loading: bool,
    pub fragments: Vec<FragmentPayload>,
}

impl From<&OcrView> for OcrViewPayload {
    fn from(view: &OcrView) -> Self {
        Self {
            document_id: view.document_id,
            title: view.title.clone(),
            keyword: view.keyword.clone(),
            loading: view.loading,
            fragments: view
                .fragments()
                .into_iter()
                .map(|fragment| match fragment {
                    Fragment::Plain(text) => FragmentPayload { text, highlighted: false },
                    Fragment::Match(text) => FragmentPayload { text, highlighted: true },
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct FormPayload {
    /// One of `closed`, `creating`, `editing`.
    pub mode: &'static str,
    pub id: Option<DocumentId>,
    pub fields: Option<FieldsInput>,
}

impl From<&EditForm> for FormPayload {
    fn from(form: &EditForm) -> Self {
        match form {
            EditForm::Closed => Self { mode: "closed", id: None, fields: None },
            EditForm::Creating => Self { mode: "creating", id: None, fields: None },
            EditForm::Editing { id, fields } => Self {
                mode: "editing",
                id: Some(*id),
                fields: Some(FieldsInput {
                    title: fields.title.clone(),
                    number: fields.number.clone(),
                    date: fields.date,
                    description: fields.description.clone(),
                }),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ConfirmationPayload {
    /// `delete_document` or `detach_file`.
    pub action: &'static str,
    pub document_id: DocumentId,
    pub prompt: &'static str,
}

impl From<&Confirmation> for ConfirmationPayload {
    fn from(confirmation: &Confirmation) -> Self {
        let (action, document_id) = match confirmation {
            Confirmation::DeleteDocument(id) => ("delete_document", *id),
            Confirmation::DetachFile(id) => ("detach_file", *id),
        };
        Self {
            action,
            document_id,
            prompt: confirmation.prompt(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct NoticePayload {
    /// `info` or `error`.
    pub kind: &'static str,
    pub message: String,
}

/// The serialized form of a `DeskView`.
#[derive(Serialize, Debug, Clone)]
pub struct ViewPayload {
    pub session: SessionPayload,
    /// `login` or `register` while the prompt is visible.
    pub auth_prompt: Option<&'static str>,
    pub search: SearchPayload,
    pub loading: bool,
    pub documents: Vec<DocumentPayload>,
    pub ocr_view: Option<OcrViewPayload>,
    pub form: FormPayload,
    pub confirmation: Option<ConfirmationPayload>,
    pub notice: Option<NoticePayload>,
}

impl From<&DeskView> for ViewPayload {
    fn from(view: &DeskView) -> Self {
        let session = match &view.session {
            SessionStatus::Unauthenticated => SessionPayload { status: "unauthenticated", user: None },
            SessionStatus::Validating => SessionPayload { status: "validating", user: None },
            SessionStatus::Authenticated(user) => SessionPayload {
                status: "authenticated",
                user: Some(user.into()),
            },
        };
        Self {
            session,
            auth_prompt: view.auth_prompt.map(|mode| match mode {
                AuthMode::Login => "login",
                AuthMode::Register => "register",
            }),
            search: SearchPayload {
                draft_term: view.search.draft_term.clone(),
                committed_term: view.search.committed_term.clone(),
                ocr_mode: view.search.ocr_mode,
            },
            loading: view.loading,
            documents: view.documents.iter().map(DocumentPayload::from).collect(),
            ocr_view: view.ocr_view.as_ref().map(OcrViewPayload::from),
            form: FormPayload::from(&view.form),
            confirmation: view.confirmation.as_ref().map(ConfirmationPayload::from),
            notice: view.notice.as_ref().map(|notice| NoticePayload {
                kind: match notice.kind {
                    NoticeKind::Info => "info",
                    NoticeKind::Error => "error",
                },
                message: notice.message.clone(),
            }),
        }
    }
}

impl From<&DeskView> for ServerMessage {
    fn from(view: &DeskView) -> Self {
        ServerMessage::View { view: view.into() }
    }
}
