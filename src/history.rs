//! Session history and the durable CSV interaction log.
//!
//! Records live in two places: an in-memory sequence for the sidebar
//! (discarded with the session) and an append-only CSV file that is never
//! read back. The file is opened, appended, and closed on every write; rows
//! from concurrent sessions may interleave.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::prompts::ChainOutcome;

/// One completed submission. Immutable once built; all six fields are always
/// populated (sentinel text stands in for failed steps).
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub timestamp: DateTime<Local>,
    pub original_prompt: String,
    pub optimized_prompt: String,
    pub evaluation: String,
    pub original_response: String,
    pub optimized_response: String,
}

impl Interaction {
    /// Flattens a chain outcome into a record stamped with the current time.
    pub fn from_outcome(original_prompt: String, outcome: &ChainOutcome) -> Self {
        Self {
            timestamp: Local::now(),
            original_prompt,
            optimized_prompt: outcome.optimized_prompt.text.clone(),
            evaluation: outcome.evaluation.text.clone(),
            original_response: outcome.original_response.text.clone(),
            optimized_response: outcome.optimized_response.text.clone(),
        }
    }
}

/// In-memory record sequence for the current session, most-recent-last.
#[derive(Debug, Default)]
pub struct SessionHistory {
    entries: Vec<Interaction>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Interaction) {
        self.entries.push(record);
    }

    /// Sidebar order: newest first.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &Interaction> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Appends one record to the CSV log at `path`.
///
/// The six-column header is emitted exactly once, when the file does not yet
/// exist. No locking; whatever atomicity the platform's append-mode write
/// provides is all there is.
pub fn append_to_log(path: &Path, record: &Interaction) -> Result<()> {
    let file_exists = path.exists();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open history log at {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer
        .serialize(record)
        .context("failed to serialize history record")?;
    writer.flush().context("failed to flush history log")?;

    info!(path = %path.display(), "history_appended");
    Ok(())
}
