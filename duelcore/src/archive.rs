//! Archival log of finalized duels
//!
//! An ordered, length-bounded log of `RecentDuelRecord` snapshots,
//! persisted as pretty-printed JSON and reloaded at process start. Only
//! the most recent N records are kept; older ones are discarded on
//! append.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::duel::types::RecentDuelRecord;
use crate::error::{DuelError, DuelResult};

/// Shared reference to the archive store
pub type SharedRecentStore = Arc<RecentDuelStore>;

pub struct RecentDuelStore {
    path: PathBuf,
    max_records: usize,
    /// Oldest first; truncated from the front.
    records: RwLock<Vec<RecentDuelRecord>>,
}

impl RecentDuelStore {
    /// Load the log from `path`, starting empty when the file is missing.
    /// A corrupt file is logged and replaced rather than taking the
    /// service down.
    pub fn load(path: impl Into<PathBuf>, max_records: usize) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<Vec<RecentDuelRecord>>(&json) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "recent-duel log unreadable, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        debug!(path = %path.display(), loaded = records.len(), "recent-duel log loaded");
        Self {
            path,
            max_records,
            records: RwLock::new(records),
        }
    }

    pub fn shared(self) -> SharedRecentStore {
        Arc::new(self)
    }

    /// Append a record, truncate to the most recent N, and persist.
    pub async fn append(&self, record: RecentDuelRecord) -> DuelResult<()> {
        let mut records = self.records.write().await;
        records.push(record);
        let excess = records.len().saturating_sub(self.max_records);
        if excess > 0 {
            records.drain(..excess);
        }
        save(&self.path, &records)
    }

    /// All archived records, newest first.
    pub async fn recent(&self) -> Vec<RecentDuelRecord> {
        let records = self.records.read().await;
        records.iter().rev().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn save(path: &Path, records: &[RecentDuelRecord]) -> DuelResult<()> {
    let json = serde_json::to_string_pretty(records).map_err(DuelError::storage)?;
    std::fs::write(path, json).map_err(DuelError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duel::types::DuelSession;
    use crate::judge::Problem;
    use chrono::Utc;

    fn record(u1: u64, u2: u64) -> RecentDuelRecord {
        let problems = vec![Problem {
            contest_id: 1,
            index: "A".to_string(),
            name: "P".to_string(),
            rating: Some(800),
            tags: Vec::new(),
        }];
        let session = DuelSession::new(
            (u1, u2),
            (format!("h{u1}"), format!("h{u2}")),
            problems,
            vec![800],
            1800,
            1,
        );
        RecentDuelRecord::from_session(&session, Utc::now())
    }

    #[tokio::test]
    async fn test_append_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_duels.json");

        let store = RecentDuelStore::load(&path, 20);
        store.append(record(1, 2)).await.unwrap();
        store.append(record(3, 4)).await.unwrap();

        // A fresh store over the same file sees identical records.
        let reloaded = RecentDuelStore::load(&path, 20);
        let records = reloaded.recent().await;
        assert_eq!(records.len(), 2);
        // Newest first.
        assert_eq!(records[0].users, (3, 4));
        assert_eq!(records[1].users, (1, 2));
        assert_eq!(records[1].handles, ("h1".to_string(), "h2".to_string()));
    }

    #[tokio::test]
    async fn test_truncates_to_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_duels.json");

        let store = RecentDuelStore::load(&path, 3);
        for i in 0..5 {
            store.append(record(i * 2, i * 2 + 1)).await.unwrap();
        }
        assert_eq!(store.len().await, 3);

        let records = store.recent().await;
        // The two oldest (users 0/1 and 2/3) were discarded.
        assert_eq!(records[0].users, (8, 9));
        assert_eq!(records[2].users, (4, 5));
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecentDuelStore::load(dir.path().join("nope.json"), 20);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_duels.json");
        std::fs::write(&path, "not json").unwrap();

        let store = RecentDuelStore::load(&path, 20);
        assert!(store.is_empty().await);
    }
}
