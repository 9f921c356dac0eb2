//! Session transcript export.
//!
//! Writes one pretty-printed JSON file per session into the transcripts
//! directory, named by start time plus a session-id prefix so a directory
//! listing reads chronologically.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Modality;
use crate::engine::context::{Message, ResponseEntry, SessionStatus};
use crate::store::SessionRecord;

/// Everything worth keeping from a finished (or abandoned) session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: String,
    pub user_id: String,
    pub modality: Modality,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    pub cycle_count: u32,
    pub messages: Vec<Message>,
    pub responses: Vec<ResponseEntry>,
    pub exported_at: DateTime<Utc>,
}

impl Transcript {
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            session_id: record.session.session_id.clone(),
            user_id: record.session.user_id.clone(),
            modality: record.session.modality,
            status: record.session.status,
            started_at: record.session.created_at,
            ended_at: record.session.completed_at,
            statement: record.context.metadata.problem_statement.clone(),
            cycle_count: record.context.metadata.cycle_count,
            messages: record.message_log.clone(),
            responses: record.context.user_responses.clone(),
            exported_at: Utc::now(),
        }
    }
}

pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Export one session, returning the path written.
    pub fn write(&self, record: &SessionRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!(
                "Failed to create transcripts directory: {}",
                self.dir.display()
            )
        })?;

        // Session ids are caller-supplied, so take chars rather than slicing.
        let prefix: String = record.session.session_id.chars().take(8).collect();
        let filename = format!(
            "{}_{}.json",
            record.session.created_at.format("%Y-%m-%dT%H-%M-%S"),
            prefix
        );
        let path = self.dir.join(filename);

        let transcript = Transcript::from_record(record);
        let json =
            serde_json::to_string_pretty(&transcript).context("Failed to serialize transcript")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write transcript: {}", path.display()))?;
        Ok(path)
    }

    /// Exported transcript files, most recent first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| {
                format!(
                    "Failed to read transcripts directory: {}",
                    self.dir.display()
                )
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        files.sort();
        files.reverse();
        Ok(files)
    }

    pub fn load(&self, path: &Path) -> Result<Transcript> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse transcript: {}", path.display()))
    }
}
