//! services/desk/src/adapters/downloads.rs
//!
//! Saves downloaded attachments into a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use docdesk_core::ports::{DownloadSink, PortError, PortResult};
use tracing::info;

pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// First free path for `filename`, appending " (n)" before the extension
    /// when earlier downloads already took the name.
    async fn free_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("download");
        let extension = path.extension().and_then(|e| e.to_str());
        let mut n = 1;
        loop {
            let name = match extension {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            let candidate = self.dir.join(name);
            if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Strips any directory components and characters that are unsafe in a
/// file name. Falls back to "download" when nothing usable is left.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl DownloadSink for DownloadDir {
    async fn deliver(&self, filename: &str, bytes: Bytes) -> PortResult<String> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            PortError::Unexpected(format!("Could not create the download folder: {}", e))
        })?;
        let path = self.free_path(&sanitize_filename(filename)).await;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("Could not save the file: {}", e)))?;
        info!(path = %path.display(), size = bytes.len(), "Saved download");
        Ok(path.display().to_string())
    }
}
