//! Handle directory
//!
//! Maps internal users to their judge-service handles. A handle is
//! validated exactly once, at link time, by fetching its submission
//! history through the shared (paced) judge client; afterwards it is
//! taken on trust. Links persist as JSON and are reloaded at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::duel::types::{Handle, UserId};
use crate::error::{DuelError, DuelResult};
use crate::judge::JudgeClient;

/// Shared reference to the handle directory
pub type SharedHandleDirectory = Arc<HandleDirectory>;

pub struct HandleDirectory {
    path: PathBuf,
    links: RwLock<HashMap<UserId, Handle>>,
}

impl HandleDirectory {
    /// Load links from `path`, starting empty when the file is missing
    /// or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let links = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<HashMap<UserId, Handle>>(&json) {
                Ok(links) => links,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "handle directory unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        debug!(path = %path.display(), linked = links.len(), "handle directory loaded");
        Self {
            path,
            links: RwLock::new(links),
        }
    }

    pub fn shared(self) -> SharedHandleDirectory {
        Arc::new(self)
    }

    pub async fn handle_of(&self, user: UserId) -> Option<Handle> {
        self.links.read().await.get(&user).cloned()
    }

    /// Link `handle` to `user`, replacing any previous link of that user.
    ///
    /// Rejects a handle already held by a different user (compared
    /// case-insensitively) and validates the handle against the judge
    /// service before committing.
    pub async fn link(
        &self,
        judge: &dyn JudgeClient,
        user: UserId,
        handle: &str,
    ) -> DuelResult<()> {
        let handle = handle.trim().to_string();
        {
            let links = self.links.read().await;
            let taken = links
                .iter()
                .any(|(uid, linked)| *uid != user && linked.eq_ignore_ascii_case(&handle));
            if taken {
                return Err(DuelError::HandleTaken(handle));
            }
        }

        // Validation doubles as an existence check: an unknown handle is
        // rejected by the service rather than stored here.
        judge.fetch_submissions(&handle).await?;

        let mut links = self.links.write().await;
        links.insert(user, handle.clone());
        save(&self.path, &links)?;
        info!(user, handle = %handle, "handle linked");
        Ok(())
    }

    /// Remove `user`'s link, returning the handle it held.
    pub async fn unlink(&self, user: UserId) -> DuelResult<Handle> {
        let mut links = self.links.write().await;
        let removed = links.remove(&user).ok_or(DuelError::NotLinked(user))?;
        save(&self.path, &links)?;
        info!(user, handle = %removed, "handle unlinked");
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }
}

fn save(path: &Path, links: &HashMap<UserId, Handle>) -> DuelResult<()> {
    let json = serde_json::to_string_pretty(links).map_err(DuelError::storage)?;
    std::fs::write(path, json).map_err(DuelError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{Problem, SubmissionHistory};
    use async_trait::async_trait;

    /// Judge stub that accepts a fixed set of handles.
    struct StubJudge {
        known: Vec<String>,
    }

    #[async_trait]
    impl JudgeClient for StubJudge {
        async fn fetch_submissions(&self, handle: &str) -> DuelResult<SubmissionHistory> {
            if self.known.iter().any(|h| h == handle) {
                Ok(SubmissionHistory::new())
            } else {
                Err(DuelError::DataUnavailable("handle: User not found".into()))
            }
        }

        async fn fetch_problemset(&self) -> DuelResult<Vec<Problem>> {
            Ok(Vec::new())
        }
    }

    fn judge() -> StubJudge {
        StubJudge {
            known: vec!["alice".to_string(), "bob".to_string()],
        }
    }

    #[tokio::test]
    async fn test_link_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let links = HandleDirectory::load(dir.path().join("handles.json"));

        links.link(&judge(), 1, "alice").await.unwrap();
        assert_eq!(links.handle_of(1).await.as_deref(), Some("alice"));
        assert_eq!(links.handle_of(2).await, None);
    }

    #[tokio::test]
    async fn test_handle_taken_by_other_user() {
        let dir = tempfile::tempdir().unwrap();
        let links = HandleDirectory::load(dir.path().join("handles.json"));

        links.link(&judge(), 1, "alice").await.unwrap();
        let err = links.link(&judge(), 2, "ALICE").await.unwrap_err();
        assert!(matches!(err, DuelError::HandleTaken(_)));

        // Relinking your own handle is fine.
        links.link(&judge(), 1, "alice").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_handle_rejected_by_validation() {
        let dir = tempfile::tempdir().unwrap();
        let links = HandleDirectory::load(dir.path().join("handles.json"));

        let err = links.link(&judge(), 1, "nobody").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(links.handle_of(1).await, None);
    }

    #[tokio::test]
    async fn test_links_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handles.json");

        let links = HandleDirectory::load(&path);
        links.link(&judge(), 1, "alice").await.unwrap();
        links.link(&judge(), 2, "bob").await.unwrap();

        let reloaded = HandleDirectory::load(&path);
        assert_eq!(reloaded.handle_of(1).await.as_deref(), Some("alice"));
        assert_eq!(reloaded.handle_of(2).await.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let links = HandleDirectory::load(dir.path().join("handles.json"));

        links.link(&judge(), 1, "alice").await.unwrap();
        assert_eq!(links.unlink(1).await.unwrap(), "alice");
        assert!(matches!(
            links.unlink(1).await,
            Err(DuelError::NotLinked(1))
        ));
    }
}
