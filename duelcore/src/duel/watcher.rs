//! Timeout watcher
//!
//! A single periodic task sweeping all active sessions and finalizing
//! any that have spent their time budget. This is the only progress
//! guarantee that does not depend on a participant issuing a request.
//! One session's failure never blocks the rest of the sweep, and sweeps
//! never overlap: the next one starts only after the previous finished.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::duel::finalize::SharedFinalizer;
use crate::duel::registry::SharedRegistry;

pub struct TimeoutWatcher {
    registry: SharedRegistry,
    finalizer: SharedFinalizer,
    interval: Duration,
}

impl TimeoutWatcher {
    pub fn new(registry: SharedRegistry, finalizer: SharedFinalizer, interval: Duration) -> Self {
        Self {
            registry,
            finalizer,
            interval,
        }
    }

    /// Run the sweep loop until the returned handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.interval).await;
                let swept = self.sweep_once().await;
                if swept > 0 {
                    debug!(swept, "timeout sweep finalized sessions");
                }
            }
        })
    }

    /// One pass over all active sessions. Returns how many were
    /// finalized.
    pub async fn sweep_once(&self) -> usize {
        let now = Utc::now();
        let mut finalized = 0;
        for (key, session) in self.registry.active().await {
            let expired = {
                let s = session.lock().await;
                !s.ended && s.time_expired(now)
            };
            if !expired {
                continue;
            }
            // The finalizer re-checks `ended` under the lock, so racing
            // an explicit end request here is harmless.
            match self.finalizer.finalize(key, &session).await {
                Some(_) => finalized += 1,
                None => debug!(?key, "session already finalized during sweep"),
            }
        }
        finalized
    }
}
