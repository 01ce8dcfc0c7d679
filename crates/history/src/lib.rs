//! Conversation history persistence — append-only JSONL storage.
//!
//! Each conversation gets its own record file (`conversation_<id>.jsonl`)
//! and every record is also appended to a combined file covering all
//! conversations. One line per turn, one JSON object per line. The files
//! are human-inspectable and trivially greppable.

use chrono::{DateTime, Utc};
use gavel_core::error::HistoryError;
use gavel_core::message::ConversationId;
use gavel_core::turn::TurnRecord;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A conversation known to the store.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub last_update: DateTime<Utc>,
    pub messages_count: usize,
}

/// Append-only store of turn records, keyed per conversation.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
    combined_path: PathBuf,
}

impl ConversationStore {
    /// Create a store rooted at `dir`. The combined record file lives
    /// inside the same directory.
    pub fn new(dir: impl Into<PathBuf>, combined_file: &str) -> Self {
        let dir = dir.into();
        let combined_path = dir.join(combined_file);
        Self { dir, combined_path }
    }

    fn conversation_path(&self, id: &ConversationId) -> PathBuf {
        self.dir.join(format!("conversation_{id}.jsonl"))
    }

    /// Append one turn record to the conversation's file and to the
    /// combined file.
    pub fn append(&self, record: &TurnRecord) -> Result<(), HistoryError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            HistoryError::Storage(format!("Failed to create history directory: {e}"))
        })?;

        let line = serde_json::to_string(record)
            .map_err(|e| HistoryError::Encoding(e.to_string()))?;

        for path in [
            self.conversation_path(&record.conversation_id),
            self.combined_path.clone(),
        ] {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    HistoryError::Storage(format!("Failed to open {}: {e}", path.display()))
                })?;
            writeln!(file, "{line}").map_err(|e| {
                HistoryError::Storage(format!("Failed to write {}: {e}", path.display()))
            })?;
        }

        debug!(conversation_id = %record.conversation_id, turn = record.turn, "Turn persisted");
        Ok(())
    }

    /// Load all turn records for a conversation, in append order.
    ///
    /// A missing file means an empty history. Corrupted lines are skipped
    /// with a warning; a bad line must not take the conversation down.
    pub fn load(&self, id: &ConversationId) -> Vec<TurnRecord> {
        let path = self.conversation_path(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<TurnRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "Skipping corrupted turn record");
                    None
                }
            })
            .collect()
    }

    /// Remove one conversation's record file.
    pub fn remove(&self, id: &ConversationId) -> Result<(), HistoryError> {
        match std::fs::remove_file(self.conversation_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HistoryError::Storage(format!(
                "Failed to remove history for {id}: {e}"
            ))),
        }
    }

    /// Delete all persisted history: every per-conversation file and the
    /// combined file. Succeeds on an already-empty store.
    pub fn reset_all(&self) -> Result<(), HistoryError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(HistoryError::Storage(format!(
                    "Failed to read history directory: {e}"
                )));
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_conversation =
                name.starts_with("conversation_") && name.ends_with(".jsonl");
            if is_conversation || path == self.combined_path {
                std::fs::remove_file(&path).map_err(|e| {
                    HistoryError::Storage(format!("Failed to remove {}: {e}", path.display()))
                })?;
            }
        }

        Ok(())
    }

    /// List known conversations with last-update time and turn count,
    /// most recently updated first.
    pub fn list(&self) -> Vec<ConversationSummary> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut summaries: Vec<ConversationSummary> = entries
            .filter_map(|e| e.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let id = name
                    .strip_prefix("conversation_")?
                    .strip_suffix(".jsonl")?
                    .to_string();
                let records = self.load(&ConversationId(id.clone()));
                let last_update = records.last().map(|r| r.timestamp)?;
                Some(ConversationSummary {
                    id,
                    last_update,
                    messages_count: records.len(),
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        summaries
    }
}
