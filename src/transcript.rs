//! Session transcripts.
//!
//! The driver records every prompt and reply and writes the transcript as
//! pretty-printed JSON when the session closes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{HostSignal, Turn};

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    System,
    User,
}

/// One line of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub at: DateTime<Utc>,
    pub who: Speaker,
    pub text: String,
    /// State after the line (system lines only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Category of the reply (system lines only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// Transcript of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: Uuid,
    pub profile: String,
    pub started_at: DateTime<Utc>,
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            profile: profile.into(),
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Record a user utterance.
    pub fn user(&mut self, text: &str) {
        self.entries.push(TranscriptEntry {
            at: Utc::now(),
            who: Speaker::User,
            text: text.to_string(),
            state: None,
            category: None,
            signal: None,
        });
    }

    /// Record the engine's side of a turn.
    pub fn system(&mut self, turn: &Turn) {
        self.entries.push(TranscriptEntry {
            at: Utc::now(),
            who: Speaker::System,
            text: turn.display_text.clone(),
            state: Some(turn.next_state.to_string()),
            category: Some(turn.category.to_string()),
            signal: turn.signal.map(signal_name),
        });
    }

    /// File name used by [`write_to_dir`](Self::write_to_dir).
    pub fn file_name(&self) -> String {
        let short_id: String = self.session_id.simple().to_string().chars().take(8).collect();
        format!(
            "session_{}_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S"),
            short_id
        )
    }

    /// Write the transcript into `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, anyhow::Error> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        log::info!("transcript written to {}", path.display());
        Ok(path)
    }
}

fn signal_name(signal: HostSignal) -> String {
    match signal {
        HostSignal::Crisis => "crisis".to_string(),
        HostSignal::OffAppHandoff => "off_app_handoff".to_string(),
    }
}
