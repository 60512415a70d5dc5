//! services/desk/src/adapters/token_store.rs
//!
//! Keeps the session token in a single file so a restart can resume the
//! session. Nothing else is persisted.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use docdesk_core::ports::{PortError, PortResult, TokenStore};
use tokio::fs;

pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn io_error(action: &str, e: std::io::Error) -> PortError {
    PortError::Unexpected(format!("Could not {} the session token: {}", action, e))
}

#[async_trait]
impl TokenStore for FileTokenStore {
    /// A missing or blank file means there is no stored session.
    async fn load(&self) -> PortResult<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", e)),
        }
    }

    async fn save(&self, token: &str) -> PortResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("store", e))?;
        }
        fs::write(&self.path, token)
            .await
            .map_err(|e| io_error("store", e))
    }

    async fn clear(&self) -> PortResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", e)),
        }
    }
}
