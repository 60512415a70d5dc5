//! crates/docdesk_core/src/query.rs
//!
//! The two-stage search model: a draft term the user is typing, a committed
//! term that queries actually use, and the OCR-mode flag. Every list fetch is
//! issued under a `QueryTicket`; only the ticket of the most recently issued
//! query may apply its result.

use crate::domain::{SearchMode, SearchQuery};

/// The user-facing search inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub draft_term: String,
    pub committed_term: String,
    pub ocr_mode: bool,
}

impl SearchState {
    fn query(&self) -> SearchQuery {
        SearchQuery {
            term: self.committed_term.clone(),
            mode: if self.ocr_mode {
                SearchMode::Ocr
            } else {
                SearchMode::Metadata
            },
        }
    }
}

/// Identifies one issued list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    generation: u64,
    pub query: SearchQuery,
}

#[derive(Debug, Default)]
pub struct QueryCoordinator {
    search: SearchState,
    generation: u64,
    loading: bool,
}

impl QueryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Keystrokes only touch the draft.
    pub fn set_draft_term(&mut self, text: impl Into<String>) {
        self.search.draft_term = text.into();
    }

    pub fn commit(&mut self) -> QueryTicket {
        self.search.committed_term = self.search.draft_term.clone();
        self.issue()
    }

    pub fn clear(&mut self) -> QueryTicket {
        self.search.draft_term.clear();
        self.search.committed_term.clear();
        self.issue()
    }

    /// Flips the mode and re-commits the draft under it.
    pub fn toggle_ocr_mode(&mut self) -> QueryTicket {
        self.search.ocr_mode = !self.search.ocr_mode;
        self.search.committed_term = self.search.draft_term.clone();
        self.issue()
    }

    /// Issues a query for the current committed combination, superseding any
    /// query still in flight.
    pub fn issue(&mut self) -> QueryTicket {
        self.generation += 1;
        self.loading = true;
        QueryTicket {
            generation: self.generation,
            query: self.search.query(),
        }
    }

    pub fn is_current(&self, ticket: &QueryTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Marks the query behind `ticket` as resolved. Returns false, leaving
    /// the loading flag alone, when a newer query has been issued since.
    pub fn resolve(&mut self, ticket: &QueryTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.loading = false;
        true
    }

    /// Orphans every in-flight query without issuing a new one.
    pub fn abandon(&mut self) {
        self.generation += 1;
        self.loading = false;
    }
}
