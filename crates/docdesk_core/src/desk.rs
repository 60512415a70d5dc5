//! crates/docdesk_core/src/desk.rs
//!
//! `DocumentDesk` is the single owner of the session, the search state, the
//! document list, the OCR cache and the view state. Presentation code reads
//! `DeskView` snapshots (`view`/`subscribe`) and calls the desk's methods; it
//! has no other way to mutate anything.
//!
//! Every operation applies its local state change when it is called, under a
//! short synchronous lock, and returns a future that only does the remote
//! work. Callers that issue operations in order therefore get their effects
//! in that order, even when the returned futures run concurrently. The lock
//! is never held across a repository call.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::OcrCache;
use crate::domain::{Document, DocumentId, OcrText};
use crate::ports::{DocumentRepository, DownloadSink, PortError, TokenStore};
use crate::query::{QueryCoordinator, QueryTicket};
use crate::session::SessionManager;
use crate::view::{Confirmation, DeskView, EditForm, Notice, OcrView};

//=========================================================================================
// Errors
//=========================================================================================

/// What a desk operation reports back to its caller. The same failure is
/// also surfaced in the view as a `Notice` where the user needs to see it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeskError {
    #[error("Not logged in")]
    NotAuthenticated,
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Nothing is waiting for confirmation")]
    ConfirmationRequired,
    /// The session or query changed while the call was in flight, so its
    /// result was not applied.
    #[error("Superseded by a newer session or query")]
    Superseded,
    #[error(transparent)]
    Port(#[from] PortError),
}

//=========================================================================================
// Owned State
//=========================================================================================

#[derive(Debug)]
pub(crate) struct DeskState {
    pub(crate) session: SessionManager,
    pub(crate) query: QueryCoordinator,
    pub(crate) documents: Vec<Document>,
    pub(crate) cache: OcrCache,
    pub(crate) ocr_view: Option<OcrView>,
    pub(crate) ocr_seq: u64,
    pub(crate) form: EditForm,
    pub(crate) confirmation: Option<Confirmation>,
    pub(crate) notice: Option<Notice>,
}

impl DeskState {
    fn new() -> Self {
        Self {
            session: SessionManager::new(),
            query: QueryCoordinator::new(),
            documents: Vec::new(),
            cache: OcrCache::new(),
            ocr_view: None,
            ocr_seq: 0,
            form: EditForm::Closed,
            confirmation: None,
            notice: None,
        }
    }

    pub(crate) fn view(&self) -> DeskView {
        DeskView {
            session: self.session.status(),
            auth_prompt: self.session.prompt(),
            search: self.query.search().clone(),
            loading: self.query.is_loading() || self.session.is_validating(),
            documents: self.documents.clone(),
            ocr_view: self.ocr_view.clone(),
            form: self.form.clone(),
            confirmation: self.confirmation,
            notice: self.notice.clone(),
        }
    }

    pub(crate) fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub(crate) fn reset_for_logout(&mut self) {
        self.session.sign_out();
        self.query.abandon();
        self.documents.clear();
        self.cache.clear();
        self.ocr_view = None;
        self.form = EditForm::Closed;
        self.confirmation = None;
    }
}

//=========================================================================================
// The Desk
//=========================================================================================

pub struct DocumentDesk {
    pub(crate) repository: Arc<dyn DocumentRepository>,
    pub(crate) tokens: Arc<dyn TokenStore>,
    pub(crate) downloads: Arc<dyn DownloadSink>,
    pub(crate) state: Mutex<DeskState>,
    views: watch::Sender<DeskView>,
    sessions: watch::Sender<u64>,
}

impl DocumentDesk {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        tokens: Arc<dyn TokenStore>,
        downloads: Arc<dyn DownloadSink>,
    ) -> Self {
        let state = DeskState::new();
        let (views, _) = watch::channel(state.view());
        let (sessions, _) = watch::channel(state.session.epoch());
        Self {
            repository,
            tokens,
            downloads,
            state: Mutex::new(state),
            views,
            sessions,
        }
    }

    /// The latest published snapshot.
    pub fn view(&self) -> DeskView {
        self.views.borrow().clone()
    }

    /// A receiver that is notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<DeskView> {
        self.views.subscribe()
    }

    /// Identifies the current session. Changes on every login, validation
    /// and logout.
    pub fn session_epoch(&self) -> u64 {
        *self.sessions.borrow()
    }

    /// A receiver that is notified whenever `session_epoch` changes.
    pub fn subscribe_sessions(&self) -> watch::Receiver<u64> {
        self.sessions.subscribe()
    }

    /// Cache lookup without any remote call.
    pub fn cached_ocr_text(&self, id: DocumentId) -> Option<OcrText> {
        self.read_state(|state| state.cache.get(id).cloned())
    }

    /// Runs `f` against the state under the lock, then publishes a snapshot.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut DeskState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut state);
        self.views.send_replace(state.view());
        let epoch = state.session.epoch();
        self.sessions.send_if_modified(|current| {
            let changed = *current != epoch;
            *current = epoch;
            changed
        });
        out
    }

    /// Like `with_state`, without publishing.
    pub(crate) fn read_state<R>(&self, f: impl FnOnce(&DeskState) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    pub(crate) fn notify_error(&self, message: impl Into<String>) {
        let notice = Notice::error(message);
        self.with_state(|state| state.notice = Some(notice));
    }

    pub fn dismiss_notice(&self) {
        self.with_state(|state| state.notice = None);
    }

    //-------------------------------------------------------------------------------------
    // Query coordination
    //-------------------------------------------------------------------------------------

    /// Updates the draft term only; never fetches.
    pub fn set_draft_term(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_state(|state| state.query.set_draft_term(text));
    }

    pub fn commit(&self) -> impl Future<Output = Result<(), DeskError>> + Send + '_ {
        let issued = self.issue_query(QueryCoordinator::commit);
        self.run_query(issued)
    }

    pub fn clear(&self) -> impl Future<Output = Result<(), DeskError>> + Send + '_ {
        let issued = self.issue_query(QueryCoordinator::clear);
        self.run_query(issued)
    }

    pub fn toggle_ocr_mode(&self) -> impl Future<Output = Result<(), DeskError>> + Send + '_ {
        let issued = self.issue_query(QueryCoordinator::toggle_ocr_mode);
        self.run_query(issued)
    }

    /// Re-runs the committed query. Used after login and after every
    /// successful mutation.
    pub fn fetch(&self) -> impl Future<Output = Result<(), DeskError>> + Send + '_ {
        let issued = self.issue_query(QueryCoordinator::issue);
        self.run_query(issued)
    }

    /// Applies the query change and stamps a ticket for it.
    fn issue_query(
        &self,
        prepare: fn(&mut QueryCoordinator) -> QueryTicket,
    ) -> Result<(QueryTicket, String), DeskError> {
        self.with_state(|state| {
            let ticket = prepare(&mut state.query);
            match state.session.token() {
                Some(token) => Ok((ticket, token.to_string())),
                None => {
                    state.query.abandon();
                    Err(DeskError::NotAuthenticated)
                }
            }
        })
    }

    async fn run_query(&self, issued: Result<(QueryTicket, String), DeskError>) -> Result<(), DeskError> {
        let (ticket, token) = issued?;
        debug!(term = %ticket.query.term, mode = ?ticket.query.mode, "Fetching documents");
        let result = self.repository.search_documents(&token, &ticket.query).await;

        if let Err(PortError::Unauthorized) = result {
            self.session_expired(&token).await;
            return Err(DeskError::Port(PortError::Unauthorized));
        }

        self.with_state(|state| {
            if !state.query.resolve(&ticket) {
                debug!(term = %ticket.query.term, "Discarding stale document list");
                return Err(DeskError::Superseded);
            }
            match result {
                Ok(documents) => {
                    state.documents = documents;
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "Document list fetch failed, showing an empty list");
                    state.documents.clear();
                    Err(DeskError::Port(e))
                }
            }
        })
    }
}
