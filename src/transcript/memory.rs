//! In-memory transcript for tests

use super::{ConversationLog, LogError, Speaker, TranscriptEntry};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// `(label, text)` pairs, handy for ordered assertions
    pub fn lines(&self) -> Vec<(String, String)> {
        self.entries()
            .into_iter()
            .map(|e| (e.speaker.to_string(), e.text))
            .collect()
    }

    pub fn system_lines(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.speaker == Speaker::System)
            .map(|e| e.text)
            .collect()
    }

    /// Index of the first entry with this label
    pub fn position(&self, label: &str) -> Option<usize> {
        self.lines().iter().position(|(l, _)| l == label)
    }

    pub fn count(&self, label: &str) -> usize {
        self.lines().iter().filter(|(l, _)| l == label).count()
    }
}

#[async_trait]
impl ConversationLog for MemoryLog {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), LogError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
