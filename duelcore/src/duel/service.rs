//! Duel command surface
//!
//! The operations the presentation layer calls. Every failure from the
//! selector or the reconciliation engine is recovered here and surfaced
//! as a structured [`DuelError`]; announcements go out on the event bus.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::archive::SharedRecentStore;
use crate::duel::finalize::{Finalizer, SharedFinalizer};
use crate::duel::reconcile;
use crate::duel::registry::{SessionRegistry, SharedRegistry, SharedSession};
use crate::duel::selector;
use crate::duel::types::{
    points_for_slot, ChannelId, DuelParams, DuelSession, Handle, PairKey, RecentDuelRecord,
    SolvedBy, UserId,
};
use crate::duel::watcher::TimeoutWatcher;
use crate::error::{DuelError, DuelResult};
use crate::events::types::{ProblemSlot, SolveAward};
use crate::events::{DuelEvent, SharedEventBus};
use crate::judge::JudgeClient;
use crate::links::SharedHandleDirectory;

/// Read-only view of one problem slot and its current outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemStatus {
    pub slot: ProblemSlot,
    pub outcome: SolvedBy,
    pub first_solve_time: Option<i64>,
}

/// Read-only view of a session, as returned by `status`. Built without
/// touching the judge service.
#[derive(Debug, Clone, Serialize)]
pub struct DuelSnapshot {
    pub users: (UserId, UserId),
    pub handles: (Handle, Handle),
    pub problems: Vec<ProblemStatus>,
    pub scores: HashMap<Handle, u32>,
    pub started_at: DateTime<Utc>,
    pub time_limit_secs: u64,
    pub seconds_left: i64,
    pub ended: bool,
}

impl DuelSnapshot {
    fn from_session(session: &DuelSession, now: DateTime<Utc>) -> Self {
        let problems = session
            .problems
            .iter()
            .enumerate()
            .map(|(idx, problem)| {
                let pid = &session.problem_ids[idx];
                let outcome = &session.per_problem[pid];
                ProblemStatus {
                    slot: ProblemSlot::new(
                        idx,
                        problem,
                        session.ratings.get(idx).copied().unwrap_or(0),
                        points_for_slot(&session.points, idx),
                    ),
                    outcome: outcome.solved_by.clone(),
                    first_solve_time: outcome.first_solve_time,
                }
            })
            .collect();
        Self {
            users: session.users,
            handles: session.handles.clone(),
            problems,
            scores: session.scores.clone(),
            started_at: session.started_at,
            time_limit_secs: session.time_limit_secs,
            seconds_left: session.seconds_left(now),
            ended: session.ended,
        }
    }
}

/// Shared reference to the duel service
pub type SharedDuelService = Arc<DuelService>;

pub struct DuelService {
    judge: Arc<dyn JudgeClient>,
    links: SharedHandleDirectory,
    registry: SharedRegistry,
    archive: SharedRecentStore,
    events: SharedEventBus,
    finalizer: SharedFinalizer,
}

impl DuelService {
    pub fn new(
        judge: Arc<dyn JudgeClient>,
        links: SharedHandleDirectory,
        registry: SharedRegistry,
        archive: SharedRecentStore,
        events: SharedEventBus,
    ) -> Self {
        let finalizer =
            Finalizer::new(registry.clone(), archive.clone(), events.clone()).shared();
        Self {
            judge,
            links,
            registry,
            archive,
            events,
            finalizer,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// Build the periodic timeout sweep over this service's registry.
    pub fn watcher(&self, interval: std::time::Duration) -> TimeoutWatcher {
        TimeoutWatcher::new(self.registry.clone(), self.finalizer.clone(), interval)
    }

    /// Start a duel between `requestor` and `opponent`.
    ///
    /// `args` are the raw numeric command arguments (see
    /// [`DuelParams::from_args`]); `channel` is where announcements about
    /// this duel will be addressed.
    pub async fn start_duel(
        &self,
        requestor: UserId,
        opponent: UserId,
        args: &[i64],
        channel: ChannelId,
    ) -> DuelResult<DuelSnapshot> {
        let params = DuelParams::from_args(args)?;

        let h1 = self.links.handle_of(requestor).await;
        let h2 = self.links.handle_of(opponent).await;
        let mut missing = Vec::new();
        if h1.is_none() {
            missing.push(requestor);
        }
        if h2.is_none() {
            missing.push(opponent);
        }
        let (Some(h1), Some(h2)) = (h1, h2) else {
            return Err(DuelError::HandleNotLinked(missing));
        };

        // Fast-fail admission checks before paying for three paced
        // fetches. The registry re-checks atomically at insert time,
        // in the same order: pair collision, then capacity.
        let key = PairKey::new(requestor, opponent);
        if self.registry.get(key).await.is_some() {
            return Err(DuelError::AlreadyActive);
        }
        if self.registry.len().await >= self.registry.capacity() {
            return Err(DuelError::CapacityExceeded {
                limit: self.registry.capacity(),
            });
        }

        let problems = selector::select_for_handles(&*self.judge, &h1, &h2, &params.ratings).await?;

        let session = DuelSession::new(
            (requestor, opponent),
            (h1, h2),
            problems,
            params.ratings.clone(),
            params.time_limit_secs,
            channel,
        );
        let shared = self.registry.create(session).await?;

        let (snapshot, event) = {
            let s = shared.lock().await;
            let now = Utc::now();
            let snapshot = DuelSnapshot::from_session(&s, now);
            let event = DuelEvent::DuelStarted {
                channel: s.channel,
                users: s.users,
                handles: s.handles.clone(),
                problems: snapshot.problems.iter().map(|p| p.slot.clone()).collect(),
                time_limit_secs: s.time_limit_secs,
                timestamp: now,
            };
            (snapshot, event)
        };
        info!(?key, ratings = ?params.ratings, "duel started");
        self.events.publish(event);
        Ok(snapshot)
    }

    /// Fetch both histories fresh and lock in any newly solved problems.
    /// Finalizes the duel when everything is resolved or time is up.
    pub async fn reconcile_now(&self, requestor: UserId) -> DuelResult<Vec<SolveAward>> {
        let (key, session) = self.find_session(requestor).await?;

        let (awards, event, should_finalize) = {
            // The session lock is held across the fetches so concurrent
            // reconciliations and finalization serialize per session.
            let mut s = session.lock().await;
            if s.ended {
                return Err(DuelError::NotInSession(requestor));
            }
            let outcome = reconcile::reconcile(&*self.judge, &mut s).await?;
            let now = Utc::now();
            let awards = awards_for(&s, &outcome.newly_resolved);
            let event = (!awards.is_empty()).then(|| DuelEvent::SolvesRecorded {
                channel: s.channel,
                users: s.users,
                handles: s.handles.clone(),
                awards: awards.clone(),
                scores: s.scores.clone(),
                seconds_left: s.seconds_left(now),
                timestamp: now,
            });
            (awards, event, outcome.should_finalize)
        };

        if let Some(event) = event {
            self.events.publish(event);
        }
        if should_finalize {
            self.finalizer.finalize(key, &session).await;
        }
        Ok(awards)
    }

    /// Current state of the requestor's duel, as-is, no fetch.
    pub async fn status(&self, requestor: UserId) -> DuelResult<DuelSnapshot> {
        let (_, session) = self.find_session(requestor).await?;
        let s = session.lock().await;
        Ok(DuelSnapshot::from_session(&s, Utc::now()))
    }

    /// The requestor's problem list with current outcomes.
    pub async fn list_problems(&self, requestor: UserId) -> DuelResult<Vec<ProblemStatus>> {
        Ok(self.status(requestor).await?.problems)
    }

    /// End the requestor's duel immediately with the standing scores.
    pub async fn end_duel(&self, requestor: UserId) -> DuelResult<RecentDuelRecord> {
        let (key, session) = self.find_session(requestor).await?;
        self.finalizer
            .finalize(key, &session)
            .await
            .ok_or(DuelError::NotInSession(requestor))
    }

    /// Archived duels, newest first.
    pub async fn list_recent(&self) -> Vec<RecentDuelRecord> {
        self.archive.recent().await
    }

    async fn find_session(&self, user: UserId) -> DuelResult<(PairKey, SharedSession)> {
        self.registry
            .find_by_user(user)
            .await
            .ok_or(DuelError::NotInSession(user))
    }
}

/// Display-ready award list for a set of freshly resolved slots.
fn awards_for(session: &DuelSession, resolved: &[reconcile::ResolvedSlot]) -> Vec<SolveAward> {
    resolved
        .iter()
        .map(|slot| SolveAward {
            slot: ProblemSlot::new(
                slot.index,
                &session.problems[slot.index],
                session.ratings.get(slot.index).copied().unwrap_or(0),
                points_for_slot(&session.points, slot.index),
            ),
            outcome: slot.outcome.clone(),
            points: slot.points,
        })
        .collect()
}
