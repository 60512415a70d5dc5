//! services/desk/src/web/state.rs
//!
//! Defines the application's shared state.

use docdesk_core::{DocumentDesk, FileUpload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;
use uuid::Uuid;

/// How many files may wait in staging at once.
pub const MAX_STAGED_UPLOADS: usize = 16;
/// How long a staged file waits for the event that uses it.
pub const STAGED_UPLOAD_TTL: Duration = Duration::from_secs(15 * 60);

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Every connection drives the same desk: there is one user session per process.
#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<DocumentDesk>,
    pub uploads: Arc<StagedUploads>,
}

impl AppState {
    /// Must be called inside the runtime: a background task drops staged
    /// files whenever the desk's session changes.
    pub fn new(desk: Arc<DocumentDesk>, uploads: StagedUploads) -> Self {
        let uploads = Arc::new(uploads);
        uploads.follow_sessions(desk.subscribe_sessions());
        Self { desk, uploads }
    }
}

//=========================================================================================
// Staged Uploads
//=========================================================================================

struct Staged {
    file: FileUpload,
    session: u64,
    staged_at: Instant,
}

/// Files posted to `/uploads` and waiting for the event that uses them.
///
/// Each staged file is handed out at most once, and only to the session it
/// was staged under. Files older than the TTL are gone, and staging past
/// capacity evicts the oldest file.
pub struct StagedUploads {
    files: Mutex<HashMap<Uuid, Staged>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for StagedUploads {
    fn default() -> Self {
        Self::with_limits(MAX_STAGED_UPLOADS, STAGED_UPLOAD_TTL)
    }
}

impl StagedUploads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn files(&self) -> MutexGuard<'_, HashMap<Uuid, Staged>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stages `file` for the session identified by `session`.
    pub fn stage(&self, file: FileUpload, session: u64) -> Uuid {
        let mut files = self.files();
        let ttl = self.ttl;
        files.retain(|_, staged| staged.staged_at.elapsed() < ttl);
        while files.len() >= self.capacity {
            let oldest = files
                .iter()
                .min_by_key(|(_, staged)| staged.staged_at)
                .map(|(id, _)| *id);
            let Some(id) = oldest else { break };
            debug!(upload_id = %id, "Evicting the oldest staged upload");
            files.remove(&id);
        }

        let id = Uuid::new_v4();
        files.insert(
            id,
            Staged {
                file,
                session,
                staged_at: Instant::now(),
            },
        );
        id
    }

    pub fn take(&self, id: Uuid, session: u64) -> Option<FileUpload> {
        self.files()
            .remove(&id)
            .filter(|staged| staged.session == session && staged.staged_at.elapsed() < self.ttl)
            .map(|staged| staged.file)
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.files().clear();
    }

    /// Drops every file staged under a session other than `session`.
    pub fn retain_session(&self, session: u64) {
        let mut files = self.files();
        let before = files.len();
        files.retain(|_, staged| staged.session == session);
        if files.len() < before {
            debug!(dropped = before - files.len(), "Dropped uploads staged by an ended session");
        }
    }

    /// Keeps staging in step with the desk: when the session changes, by
    /// login, logout or a refused token, files from the old one are dropped.
    pub fn follow_sessions(self: &Arc<Self>, mut sessions: watch::Receiver<u64>) -> JoinHandle<()> {
        let uploads = Arc::clone(self);
        tokio::spawn(async move {
            while sessions.changed().await.is_ok() {
                let current = *sessions.borrow_and_update();
                uploads.retain_session(current);
            }
        })
    }
}
