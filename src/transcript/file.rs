//! Daily transcript files

use super::{ConversationLog, LogError, TranscriptEntry};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Appends entries to `<dir>/conversation_<YYYY-MM-DD>.txt`
#[derive(Debug, Clone)]
pub struct FileLog {
    dir: PathBuf,
}

impl FileLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File the entry belongs in, keyed by the entry's UTC date
    pub fn path_for(&self, entry: &TranscriptEntry) -> PathBuf {
        self.dir
            .join(format!("conversation_{}.txt", entry.timestamp.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl ConversationLog for FileLog {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), LogError> {
        let path = self.path_for(entry);
        let io_err = |source| LogError::Io {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(format!("{entry}\n\n").as_bytes())
            .await
            .map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }
}
