//! Recently generated meeting links
//!
//! A short, most-recent-first list persisted next to the config. Local only
//! and independent of the credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::Result;

/// One generated meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Bounded, most-recent-first sequence of records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    records: Vec<MeetingRecord>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Adopt existing records, keeping only the newest `limit`
    pub fn from_records(mut records: Vec<MeetingRecord>, limit: usize) -> Self {
        let limit = limit.max(1);
        records.truncate(limit);
        Self { records, limit }
    }

    /// Insert at the head, evicting the oldest once over the limit
    pub fn push(&mut self, record: MeetingRecord) {
        self.records.insert(0, record);
        self.records.truncate(self.limit);
    }

    /// Remove every record with exactly this URL; returns whether any matched
    pub fn remove(&mut self, url: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.url != url);
        self.records.len() != before
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[MeetingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// JSON file holding the history
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }

    /// Store in the default location
    pub fn default_location(limit: usize) -> Self {
        Self::new(crate::config::config_dir().join("history.json"), limit)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<History> {
        if !self.path.exists() {
            return Ok(History::new(self.limit));
        }

        let content = std::fs::read_to_string(&self.path)?;
        let records: Vec<MeetingRecord> = match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                // History is best-effort; a damaged file starts a fresh list
                tracing::warn!("Discarding unreadable history at {:?}: {}", self.path, e);
                Vec::new()
            }
        };
        Ok(History::from_records(records, self.limit))
    }

    pub fn save(&self, history: &History) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(history.records())?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Load, insert at the head, save
    pub fn add(&self, record: MeetingRecord) -> Result<History> {
        let mut history = self.load()?;
        history.push(record);
        self.save(&history)?;
        Ok(history)
    }

    /// Load, remove by URL, save; returns whether a record was removed
    pub fn remove(&self, url: &str) -> Result<bool> {
        let mut history = self.load()?;
        let removed = history.remove(url);
        if removed {
            self.save(&history)?;
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        self.save(&History::new(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(n: i64) -> MeetingRecord {
        MeetingRecord {
            url: format!("https://teams.test/join/{}", n),
            title: format!("Meeting {}", n),
            created_at: Utc::now() + Duration::seconds(n),
        }
    }

    fn urls(history: &History) -> Vec<String> {
        history.records().iter().map(|r| r.url.clone()).collect()
    }

    #[test]
    fn test_fourth_insert_evicts_oldest() {
        let mut history = History::new(3);
        for n in 1..=4 {
            history.push(record(n));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(
            urls(&history),
            vec![
                "https://teams.test/join/4",
                "https://teams.test/join/3",
                "https://teams.test/join/2",
            ]
        );
    }

    #[test]
    fn test_remove_by_exact_url() {
        let mut history = History::new(3);
        history.push(record(1));
        history.push(record(2));

        assert!(!history.remove("https://teams.test/join"));
        assert!(history.remove("https://teams.test/join/1"));
        assert_eq!(urls(&history), vec!["https://teams.test/join/2"]);
        assert!(!history.remove("https://teams.test/join/1"));
    }

    #[test]
    fn test_from_records_truncates() {
        let history = History::from_records((1..=5).rev().map(record).collect(), 3);
        assert_eq!(history.len(), 3);
        assert_eq!(history.records()[0].url, "https://teams.test/join/5");
    }

    #[test]
    fn test_store_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 3);

        assert!(store.load().unwrap().is_empty());
        for n in 1..=4 {
            store.add(record(n)).unwrap();
        }

        let reopened = HistoryStore::new(store.path(), 3).load().unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.records()[0].url, "https://teams.test/join/4");

        assert!(store.remove("https://teams.test/join/3").unwrap());
        assert_eq!(store.load().unwrap().len(), 2);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ nope").unwrap();

        let history = HistoryStore::new(&path, 3).load().unwrap();
        assert!(history.is_empty());
    }
}
