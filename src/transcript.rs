//! Conversation transcript
//!
//! Every message sent, every reply received and every system event is
//! appended to a [`ConversationLog`]. Writing is best-effort: the engine
//! downgrades failures to warnings.

mod file;
#[cfg(test)]
pub mod memory;

pub use file::FileLog;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to write transcript {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Who a transcript line belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Speaker {
    System,
    /// Text the relay sent to a participant
    To(String),
    /// Text a participant replied with
    Participant(String),
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::System => write!(f, "SYSTEM"),
            Speaker::To(name) => write!(f, "USER_TO_{}", name.to_uppercase()),
            Speaker::Participant(name) => write!(f, "{}", name.to_uppercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            speaker,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Speaker::System, text)
    }

    pub fn sent_to(name: &str, text: impl Into<String>) -> Self {
        Self::new(Speaker::To(name.to_string()), text)
    }

    pub fn reply_from(name: &str, text: impl Into<String>) -> Self {
        Self::new(Speaker::Participant(name.to_string()), text)
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.speaker,
            self.text
        )
    }
}

/// Append-only sink for transcript entries
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), LogError>;
}

#[async_trait]
impl<T: ConversationLog + ?Sized> ConversationLog for Arc<T> {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), LogError> {
        (**self).append(entry).await
    }
}
