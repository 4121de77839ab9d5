//! Session registry
//!
//! The authoritative store of active duel sessions. One lock guards the
//! whole map so admission (pair-collision plus capacity check) and insert
//! happen atomically under concurrent creation attempts. Each session is
//! additionally wrapped in its own mutex so reconciliation and
//! finalization serialize per session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::duel::types::{DuelSession, PairKey, UserId};
use crate::error::{DuelError, DuelResult};

/// A registered session behind its per-session mutation lock.
pub type SharedSession = Arc<Mutex<DuelSession>>;

/// Shared reference to the registry.
pub type SharedRegistry = Arc<SessionRegistry>;

pub struct SessionRegistry {
    capacity: usize,
    sessions: RwLock<HashMap<PairKey, SharedSession>>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(self)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admit and insert a new session.
    ///
    /// Fails with `AlreadyActive` when the unordered pair already has a
    /// session and `CapacityExceeded` at the global ceiling. Note the
    /// collision check is exact-pair only: a user can, by construction,
    /// hold concurrent duels with different partners.
    pub async fn create(&self, session: DuelSession) -> DuelResult<SharedSession> {
        let key = session.pair_key();
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            return Err(DuelError::AlreadyActive);
        }
        if sessions.len() >= self.capacity {
            return Err(DuelError::CapacityExceeded {
                limit: self.capacity,
            });
        }
        let shared = Arc::new(Mutex::new(session));
        sessions.insert(key, shared.clone());
        debug!(?key, active = sessions.len(), "duel session registered");
        Ok(shared)
    }

    /// Linear scan for a session containing `user` in either pair slot.
    pub async fn find_by_user(&self, user: UserId) -> Option<(PairKey, SharedSession)> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .find(|(key, _)| key.contains(user))
            .map(|(key, session)| (*key, session.clone()))
    }

    pub async fn get(&self, key: PairKey) -> Option<SharedSession> {
        self.sessions.read().await.get(&key).cloned()
    }

    pub async fn remove(&self, key: PairKey) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(&key);
        if removed.is_some() {
            debug!(?key, "duel session removed");
        }
        removed
    }

    /// Snapshot of all active sessions, for the timeout sweep.
    pub async fn active(&self) -> Vec<(PairKey, SharedSession)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(key, session)| (*key, session.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Problem;

    fn session(u1: UserId, u2: UserId) -> DuelSession {
        let problems = vec![Problem {
            contest_id: 1,
            index: "A".to_string(),
            name: "P".to_string(),
            rating: Some(800),
            tags: Vec::new(),
        }];
        DuelSession::new(
            (u1, u2),
            (format!("h{u1}"), format!("h{u2}")),
            problems,
            vec![800],
            1800,
            1,
        )
    }

    #[tokio::test]
    async fn test_create_and_find_by_either_user() {
        let registry = SessionRegistry::new(20);
        registry.create(session(1, 2)).await.unwrap();

        assert!(registry.find_by_user(1).await.is_some());
        assert!(registry.find_by_user(2).await.is_some());
        assert!(registry.find_by_user(3).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_pair_rejected_regardless_of_order() {
        let registry = SessionRegistry::new(20);
        registry.create(session(1, 2)).await.unwrap();

        assert!(matches!(
            registry.create(session(2, 1)).await,
            Err(DuelError::AlreadyActive)
        ));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_ceiling() {
        let registry = SessionRegistry::new(2);
        registry.create(session(1, 2)).await.unwrap();
        registry.create(session(3, 4)).await.unwrap();

        assert!(matches!(
            registry.create(session(5, 6)).await,
            Err(DuelError::CapacityExceeded { limit: 2 })
        ));

        // Removing one frees a slot.
        registry.remove(PairKey::new(1, 2)).await.unwrap();
        registry.create(session(5, 6)).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creation_admits_exactly_one() {
        let registry = SessionRegistry::new(20).shared();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.create(session(1, 2)).await.is_ok()
            }));
        }
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = SessionRegistry::new(20);
        registry.create(session(1, 2)).await.unwrap();
        let key = PairKey::new(1, 2);
        assert!(registry.remove(key).await.is_some());
        assert!(registry.remove(key).await.is_none());
        assert!(registry.is_empty().await);
    }
}
