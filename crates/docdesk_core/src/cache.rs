//! crates/docdesk_core/src/cache.rs
//!
//! Per-document memoization of OCR text.
//!
//! Entries never expire by time. They are dropped only by explicit
//! invalidation, which every file-affecting mutation performs. Each id also
//! carries a generation so a fetch that was started before an invalidation
//! cannot store its (now stale) result afterwards.

use std::collections::HashMap;

use crate::domain::{DocumentId, OcrText};

/// Handed out when a remote OCR fetch starts; required to store its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrTicket {
    id: DocumentId,
    generation: u64,
    era: u64,
}

impl OcrTicket {
    pub fn id(&self) -> DocumentId {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct OcrCache {
    entries: HashMap<DocumentId, OcrText>,
    generations: HashMap<DocumentId, u64>,
    /// Bumped by `clear`, which orphans every outstanding ticket at once.
    era: u64,
}

impl OcrCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: DocumentId) -> Option<&OcrText> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn begin_fetch(&self, id: DocumentId) -> OcrTicket {
        OcrTicket {
            id,
            generation: self.generations.get(&id).copied().unwrap_or(0),
            era: self.era,
        }
    }

    /// Stores a fetched result. Returns false, storing nothing, when the
    /// document was invalidated (or the cache cleared) after `ticket` was taken.
    pub fn store(&mut self, ticket: &OcrTicket, text: OcrText) -> bool {
        let current = self.generations.get(&ticket.id).copied().unwrap_or(0);
        if ticket.era != self.era || ticket.generation != current {
            return false;
        }
        self.entries.insert(ticket.id, text);
        true
    }

    /// Drops any entry for `id`. Called after a delete, a file replacement
    /// or a file removal.
    pub fn invalidate(&mut self, id: DocumentId) {
        self.entries.remove(&id);
        *self.generations.entry(id).or_insert(0) += 1;
    }

    /// An update submission may always carry a new file, so every successful
    /// update invalidates, metadata-only edits included.
    pub fn invalidate_on_update(&mut self, id: DocumentId) {
        self.invalidate(id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generations.clear();
        self.era += 1;
    }
}
