//! Append-only history of detected feelings.
//!
//! Each analyzed utterance appends one `{timestamp: [labels]}` record
//! to a JSON array on disk, giving a long-term record that outlives the
//! sliding conversation window. A malformed or missing file starts a
//! fresh history rather than failing startup.

use crate::emotion::Emotion;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One appended observation: a single-entry `timestamp -> [labels]` map.
pub type FeelingRecord = BTreeMap<String, Vec<String>>;

/// Persisted feeling history, an append-only list of records.
#[derive(Debug, Clone)]
pub struct FeelingHistory {
    path: PathBuf,
    entries: Vec<FeelingRecord>,
}

impl FeelingHistory {
    /// Load the history from `path`, or start empty when the file is
    /// missing or unreadable.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("malformed feeling history {}, starting fresh: {e}", path.display());
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        debug!("feeling history: {} entries", entries.len());
        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    /// Append one observation and persist the whole file. Records are
    /// only ever added, including two observations with the same
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn append(&mut self, at: DateTime<Utc>, feelings: &[Emotion]) -> Result<()> {
        let labels = feelings.iter().map(|e| e.label().to_owned()).collect();
        let mut record = FeelingRecord::new();
        record.insert(at.to_rfc3339(), labels);
        self.entries.push(record);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Memory(format!("cannot create {}: {e}", parent.display())))?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::Memory(format!("cannot serialize feeling history: {e}")))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| Error::Memory(format!("cannot write {}: {e}", self.path.display())))?;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All recorded observations, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[FeelingRecord] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn appends_survive_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("feelings.json");

        let mut history = FeelingHistory::load(&path);
        assert!(history.is_empty());
        history
            .append(Utc::now(), &[Emotion::Joy, Emotion::Surprise])
            .unwrap();

        // the file is a JSON array of records
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(parsed.is_array());

        let reloaded = FeelingHistory::load(&path);
        assert_eq!(reloaded.len(), 1);
        let labels = reloaded.entries()[0].values().next().unwrap();
        assert_eq!(labels, &vec!["joy".to_owned(), "surprise".to_owned()]);
    }

    #[test]
    fn equal_timestamps_both_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("feelings.json");
        let at = Utc::now();

        let mut history = FeelingHistory::load(&path);
        history.append(at, &[Emotion::Joy]).unwrap();
        history.append(at, &[Emotion::Anger]).unwrap();

        let reloaded = FeelingHistory::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.entries()[0].values().next().unwrap(),
            &vec!["joy".to_owned()]
        );
        assert_eq!(
            reloaded.entries()[1].values().next().unwrap(),
            &vec!["anger".to_owned()]
        );
    }

    #[test]
    fn malformed_file_starts_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("feelings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let history = FeelingHistory::load(&path);
        assert!(history.is_empty());
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("deep").join("feelings.json");
        let mut history = FeelingHistory::load(&path);
        history.append(Utc::now(), &[Emotion::Neutral]).unwrap();
        assert!(path.is_file());
    }
}
