//! Duel finalization
//!
//! Marks the session ended, computes the verdict, announces the result,
//! archives a snapshot and evicts the session from the registry.
//! Finalization can be triggered from an explicit end request, from a
//! reconciliation pass, or from the timeout sweep, so the whole path is
//! idempotent: the `ended` flag is flipped under the session lock and
//! only the flipping caller performs the side effects.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::archive::SharedRecentStore;
use crate::duel::registry::{SharedRegistry, SharedSession};
use crate::duel::types::{
    points_for_slot, DuelSession, DuelVerdict, PairKey, RecentDuelRecord,
};
use crate::events::types::{ProblemSlot, SolveAward};
use crate::events::{DuelEvent, SharedEventBus};

/// Shared reference to the finalizer
pub type SharedFinalizer = Arc<Finalizer>;

pub struct Finalizer {
    registry: SharedRegistry,
    archive: SharedRecentStore,
    events: SharedEventBus,
}

impl Finalizer {
    pub fn new(registry: SharedRegistry, archive: SharedRecentStore, events: SharedEventBus) -> Self {
        Self {
            registry,
            archive,
            events,
        }
    }

    pub fn shared(self) -> SharedFinalizer {
        Arc::new(self)
    }

    /// Finalize the session. Returns the archival record, or `None` when
    /// another trigger already finalized it.
    ///
    /// An archive write failure is logged and does not keep the session
    /// alive; the announcement and eviction still happen.
    pub async fn finalize(&self, key: PairKey, session: &SharedSession) -> Option<RecentDuelRecord> {
        let (record, event) = {
            let mut s = session.lock().await;
            if s.ended {
                return None;
            }
            s.ended = true;
            let ended_at = Utc::now();
            let verdict = compute_verdict(&s);
            info!(?key, ?verdict, "duel finalized");
            let record = RecentDuelRecord::from_session(&s, ended_at);
            let event = DuelEvent::DuelFinished {
                channel: s.channel,
                users: s.users,
                handles: s.handles.clone(),
                outcomes: outcome_summary(&s),
                scores: s.scores.clone(),
                verdict,
                timestamp: ended_at,
            };
            (record, event)
        };

        self.events.publish(event);
        if let Err(e) = self.archive.append(record.clone()).await {
            warn!(?key, error = %e, "failed to archive finished duel");
        }
        self.registry.remove(key).await;
        Some(record)
    }
}

/// Winner by score; equal scores fall back to who reached their final
/// score first; no usable stamp on either side is a draw.
pub fn compute_verdict(session: &DuelSession) -> DuelVerdict {
    let (h1, h2) = (&session.handles.0, &session.handles.1);
    let (s1, s2) = (session.score_of(h1), session.score_of(h2));
    if s1 > s2 {
        return DuelVerdict::Winner { handle: h1.clone() };
    }
    if s2 > s1 {
        return DuelVerdict::Winner { handle: h2.clone() };
    }
    let t1 = session.score_reached_at.get(h1);
    let t2 = session.score_reached_at.get(h2);
    match (t1, t2) {
        (Some(t1), Some(t2)) if t1 < t2 => DuelVerdict::TieBreak { handle: h1.clone() },
        (Some(t1), Some(t2)) if t2 < t1 => DuelVerdict::TieBreak { handle: h2.clone() },
        (Some(_), None) => DuelVerdict::TieBreak { handle: h1.clone() },
        (None, Some(_)) => DuelVerdict::TieBreak { handle: h2.clone() },
        _ => DuelVerdict::Draw,
    }
}

/// Every slot with its locked (or still unresolved) outcome, for the
/// final announcement.
fn outcome_summary(session: &DuelSession) -> Vec<SolveAward> {
    session
        .problems
        .iter()
        .enumerate()
        .map(|(idx, problem)| {
            let pid = &session.problem_ids[idx];
            let rating = session.ratings.get(idx).copied().unwrap_or(0);
            let points = points_for_slot(&session.points, idx);
            SolveAward {
                slot: ProblemSlot::new(idx, problem, rating, points),
                outcome: session.per_problem[pid].solved_by.clone(),
                points,
            }
        })
        .collect()
}
