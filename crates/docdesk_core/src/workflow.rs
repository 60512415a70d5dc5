//! crates/docdesk_core/src/workflow.rs
//!
//! Document mutations and the views that lead into them.
//!
//! Every mutation follows the same sequence: check the session when the call
//! is made, send one request, and only after a success response apply local
//! effects (OCR cache invalidation, closing the form) and refresh the list. A failed mutation
//! only surfaces its error; the list, the cache and the form stay as they were.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::desk::{DeskError, DeskState, DocumentDesk};
use crate::domain::{Document, DocumentFields, DocumentId, FileUpload, OcrText};
use crate::ports::PortError;
use crate::view::{Confirmation, EditForm, Notice, OcrView, NO_OCR_TEXT, OCR_LOAD_FAILED};

/// The token and session epoch a mutation was started under.
struct Grant {
    token: String,
    epoch: u64,
}

impl DocumentDesk {
    //-------------------------------------------------------------------------------------
    // Shared sequencing helpers
    //-------------------------------------------------------------------------------------

    fn authorize(&self) -> Result<Grant, DeskError> {
        let grant = self.read_state(|state| {
            state.session.token().map(|token| Grant {
                token: token.to_string(),
                epoch: state.session.epoch(),
            })
        });
        grant.ok_or_else(|| {
            self.notify_error("Please log in first.");
            DeskError::NotAuthenticated
        })
    }

    fn check_fields(&self, fields: &DocumentFields) -> Result<(), DeskError> {
        fields.validate().map_err(|message| {
            self.notify_error(message.clone());
            DeskError::Invalid(message)
        })
    }

    /// Applies the local effects of a successful mutation, unless the
    /// session it was started under is gone.
    async fn apply_success(
        &self,
        grant: &Grant,
        effects: impl FnOnce(&mut DeskState),
    ) -> Result<(), DeskError> {
        let applied = self.with_state(|state| {
            if state.session.epoch() != grant.epoch || !state.session.is_authenticated() {
                return false;
            }
            effects(state);
            true
        });
        if !applied {
            debug!("Session changed while the mutation was in flight");
            return Err(DeskError::Superseded);
        }
        // A failed refresh degrades the list on its own; the mutation still succeeded.
        let _ = self.fetch().await;
        Ok(())
    }

    /// Translates a failed call into the user-visible outcome.
    async fn fail(&self, grant: &Grant, context: &str, error: PortError) -> DeskError {
        match &error {
            PortError::Unauthorized => self.session_expired(&grant.token).await,
            _ => {
                warn!(error = %error, "{}", context);
                self.notify_error(format!("{}: {}", context, error.user_message()));
            }
        }
        DeskError::Port(error)
    }

    //-------------------------------------------------------------------------------------
    // Edit form
    //-------------------------------------------------------------------------------------

    pub fn open_create_form(&self) {
        self.with_state(|state| state.form = EditForm::Creating);
    }

    /// Opens the form prefilled from the listed document.
    pub fn open_edit_form(&self, id: DocumentId) -> Result<(), DeskError> {
        let opened = self.with_state(|state| match state.document(id).map(Document::fields) {
            Some(mut fields) => {
                fields.description.get_or_insert_with(String::new);
                state.form = EditForm::Editing { id, fields };
                true
            }
            None => false,
        });
        if opened {
            Ok(())
        } else {
            let message = format!("Document {} not found", id);
            self.notify_error(message.clone());
            Err(DeskError::Port(PortError::NotFound(message)))
        }
    }

    pub fn close_form(&self) {
        self.with_state(|state| state.form = EditForm::Closed);
    }

    //-------------------------------------------------------------------------------------
    // Mutations
    //-------------------------------------------------------------------------------------

    pub fn create(
        &self,
        fields: DocumentFields,
        file: Option<FileUpload>,
    ) -> impl Future<Output = Result<Document, DeskError>> + Send + '_ {
        let grant = self.check_fields(&fields).and_then(|()| self.authorize());
        async move {
            let grant = grant?;
            match self
                .repository
                .create_document(&grant.token, &fields, file.as_ref())
                .await
            {
                Ok(document) => {
                    info!(id = document.id, "Document created");
                    self.apply_success(&grant, |state| state.form = EditForm::Closed)
                        .await?;
                    Ok(document)
                }
                Err(e) => Err(self.fail(&grant, "Error creating document", e).await),
            }
        }
    }

    /// Updates metadata and optionally replaces the file. The OCR cache entry
    /// is dropped on every successful update, with or without a file part.
    pub fn update(
        &self,
        id: DocumentId,
        fields: DocumentFields,
        file: Option<FileUpload>,
    ) -> impl Future<Output = Result<Document, DeskError>> + Send + '_ {
        let grant = self.check_fields(&fields).and_then(|()| self.authorize());
        async move {
            let grant = grant?;
            match self
                .repository
                .update_document(&grant.token, id, &fields, file.as_ref())
                .await
            {
                Ok(document) => {
                    info!(id, with_file = file.is_some(), "Document updated");
                    self.apply_success(&grant, |state| {
                        state.cache.invalidate_on_update(id);
                        state.form = EditForm::Closed;
                    })
                    .await?;
                    Ok(document)
                }
                Err(e) => Err(self.fail(&grant, "Error updating document", e).await),
            }
        }
    }

    async fn delete(&self, grant: Grant, id: DocumentId) -> Result<(), DeskError> {
        match self.repository.delete_document(&grant.token, id).await {
            Ok(()) => {
                info!(id, "Document deleted");
                self.apply_success(&grant, |state| {
                    state.cache.invalidate(id);
                    if state.ocr_view.as_ref().map(|view| view.document_id) == Some(id) {
                        state.ocr_view = None;
                    }
                })
                .await
            }
            Err(e) => Err(self.fail(&grant, "Error deleting document", e).await),
        }
    }

    /// Uploads a file to a document that has none yet.
    pub fn attach_file(
        &self,
        id: DocumentId,
        file: FileUpload,
    ) -> impl Future<Output = Result<Document, DeskError>> + Send + '_ {
        let already_attached =
            self.read_state(|state| state.document(id).is_some_and(|doc| doc.has_file));
        let grant = if already_attached {
            let message = "This document already has a file. Delete it before uploading another.";
            self.notify_error(message);
            Err(DeskError::Invalid(message.to_string()))
        } else {
            self.authorize()
        };

        async move {
            let grant = grant?;
            match self.repository.upload_file(&grant.token, id, &file).await {
                Ok(document) => {
                    info!(id, filename = %file.filename, "File attached");
                    self.apply_success(&grant, |state| {
                        state.cache.invalidate(id);
                        state.notice = Some(Notice::info("File uploaded successfully!"));
                    })
                    .await?;
                    Ok(document)
                }
                Err(e) => Err(self.fail(&grant, "Error uploading file", e).await),
            }
        }
    }

    /// Removes the attached file. Only reachable through `confirm`.
    async fn detach_file(&self, grant: Grant, id: DocumentId) -> Result<(), DeskError> {
        match self.repository.delete_file(&grant.token, id).await {
            Ok(_) => {
                info!(id, "File detached");
                self.apply_success(&grant, |state| {
                    state.cache.invalidate(id);
                    state.notice = Some(Notice::info("File deleted successfully!"));
                })
                .await
            }
            Err(e) => Err(self.fail(&grant, "Error deleting file", e).await),
        }
    }

    //-------------------------------------------------------------------------------------
    // Confirmation of destructive actions
    //-------------------------------------------------------------------------------------

    pub fn request_confirmation(&self, confirmation: Confirmation) {
        self.with_state(|state| state.confirmation = Some(confirmation));
    }

    pub fn dismiss_confirmation(&self) {
        self.with_state(|state| state.confirmation = None);
    }

    /// Runs the action the user just confirmed.
    pub fn confirm(&self) -> impl Future<Output = Result<(), DeskError>> + Send + '_ {
        let pending = self.with_state(|state| state.confirmation.take());
        let step = pending.map(|confirmation| (confirmation, self.authorize()));
        async move {
            match step {
                Some((Confirmation::DeleteDocument(id), grant)) => self.delete(grant?, id).await,
                Some((Confirmation::DetachFile(id), grant)) => self.detach_file(grant?, id).await,
                None => Err(DeskError::ConfirmationRequired),
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Reads
    //-------------------------------------------------------------------------------------

    /// Fetches the attached file and hands it to the download sink.
    pub fn download(
        &self,
        id: DocumentId,
        filename: &str,
    ) -> impl Future<Output = Result<String, DeskError>> + Send + '_ {
        let grant = self.authorize();
        let filename = filename.to_string();
        async move {
            let grant = grant?;
            let bytes = match self.repository.download_file(&grant.token, id).await {
                Ok(bytes) => bytes,
                Err(e) => return Err(self.fail(&grant, "Error downloading file", e).await),
            };

            match self.downloads.deliver(&filename, bytes).await {
                Ok(location) => {
                    info!(id, %location, "File downloaded");
                    self.with_state(|state| {
                        state.notice = Some(Notice::info(format!("Downloaded to {}", location)))
                    });
                    Ok(location)
                }
                Err(e) => Err(self.fail(&grant, "Error downloading file", e).await),
            }
        }
    }

    /// Opens the OCR panel for a document and resolves its text through the
    /// cache. Matches of the committed search term are highlighted.
    pub fn fetch_ocr_text(
        &self,
        id: DocumentId,
        title: &str,
    ) -> impl Future<Output = Result<OcrText, DeskError>> + Send + '_ {
        let opened = self.authorize().map(|grant| {
            let title = title.to_string();
            let (seq, cached, ticket) = self.with_state(|state| {
                state.ocr_seq += 1;
                let seq = state.ocr_seq;
                let keyword = state.query.search().committed_term.clone();
                let mut view = OcrView::opening(id, title, keyword, seq);
                let cached = state.cache.get(id).cloned();
                if let Some(text) = &cached {
                    view.show(display_text(text));
                }
                state.ocr_view = Some(view);
                (seq, cached, state.cache.begin_fetch(id))
            });
            (grant, seq, cached, ticket)
        });

        async move {
            let (grant, seq, cached, ticket) = opened?;
            if let Some(text) = cached {
                debug!(id, "OCR text served from cache");
                return Ok(text);
            }

            match self.repository.fetch_ocr_text(&grant.token, id).await {
                Ok(text) => {
                    self.with_state(|state| {
                        if !state.cache.store(&ticket, text.clone()) {
                            debug!(id, "OCR text changed while loading, not caching it");
                        }
                        if let Some(view) = state.ocr_view.as_mut().filter(|view| view.seq == seq) {
                            view.show(display_text(&text));
                        }
                    });
                    Ok(text)
                }
                Err(PortError::Unauthorized) => {
                    self.session_expired(&grant.token).await;
                    Err(DeskError::Port(PortError::Unauthorized))
                }
                Err(e) => {
                    warn!(id, error = %e, "OCR text fetch failed");
                    self.with_state(|state| {
                        if let Some(view) = state.ocr_view.as_mut().filter(|view| view.seq == seq) {
                            view.show(OCR_LOAD_FAILED);
                        }
                    });
                    Err(DeskError::Port(e))
                }
            }
        }
    }

    pub fn close_ocr_view(&self) {
        self.with_state(|state| state.ocr_view = None);
    }
}

fn display_text(text: &OcrText) -> String {
    match text {
        OcrText::Text(text) => text.clone(),
        OcrText::Unavailable => NO_OCR_TEXT.to_string(),
    }
}
