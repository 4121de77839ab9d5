//! Duel session data model
//!
//! `DuelSession` is the one mutable entity in the system. Everything else
//! here is either fixed at creation (problems, points, handles) or an
//! immutable snapshot of a finished session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DuelError, DuelResult};
use crate::judge::{Problem, ProblemId};

/// Internal user identifier (the presentation layer's notion of a user).
pub type UserId = u64;

/// External judge-service identity.
pub type Handle = String;

/// Opaque destination for result announcements.
pub type ChannelId = u64;

/// Default point values for a five-problem duel.
pub const DEFAULT_POINTS: [u32; 5] = [100, 200, 300, 400, 500];

/// Order-independent key for the pair of duelists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey(pub UserId, pub UserId);

impl PairKey {
    /// Normalize to `(min, max)` so `(a, b)` and `(b, a)` collide.
    pub fn new(a: UserId, b: UserId) -> Self {
        Self(a.min(b), a.max(b))
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.0 == user || self.1 == user
    }
}

/// Outcome slot of one duel problem. Transitions out of `Unresolved`
/// exactly once and is never reassigned afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolvedBy {
    /// Nobody has an accepted solve yet.
    Unresolved,
    /// One handle had the strictly earliest accepted solve.
    WonBy { handle: Handle },
    /// Both solved in the same second; nobody scores.
    Tied,
    /// Both solved but the service reported no usable timestamps, so
    /// both sides received the problem's full points.
    DualAward,
}

impl SolvedBy {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }

    /// The sole winning handle, when there is one.
    pub fn winner(&self) -> Option<&str> {
        match self {
            Self::WonBy { handle } => Some(handle),
            _ => None,
        }
    }
}

/// Per-problem resolution state inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemOutcome {
    pub solved_by: SolvedBy,
    /// Epoch seconds of the winning (or tying) accepted solve, when known.
    pub first_solve_time: Option<i64>,
}

impl ProblemOutcome {
    pub fn unresolved() -> Self {
        Self {
            solved_by: SolvedBy::Unresolved,
            first_solve_time: None,
        }
    }
}

/// Rating list and time budget derived from the start command's numeric
/// arguments.
///
/// Accepted forms:
/// - no args: five ratings evenly stepped over 800..2400, 30 minutes
/// - `[base, time_min]`: `[base, base+100, .., base+400]`
/// - `[min, max, num, time_min]`: `num` ratings evenly stepped min..max
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelParams {
    pub ratings: Vec<u32>,
    pub time_limit_secs: u64,
}

impl DuelParams {
    pub fn from_args(args: &[i64]) -> DuelResult<Self> {
        match args {
            [] => Self::stepped(800, 2400, 5, 30),
            [base, time_min] => {
                let base = to_rating(*base)?;
                let ratings = (0..5).map(|i| base + i * 100).collect();
                Ok(Self {
                    ratings,
                    time_limit_secs: to_minutes(*time_min)? * 60,
                })
            }
            [min, max, num, time_min] => {
                let min = to_rating(*min)?;
                let max = to_rating(*max)?;
                if max < min {
                    return Err(DuelError::InvalidArguments(format!(
                        "max rating {max} below min rating {min}"
                    )));
                }
                let num = match *num {
                    n @ 1..=50 => n as u32,
                    n => {
                        return Err(DuelError::InvalidArguments(format!(
                            "problem count {n} out of range"
                        )))
                    }
                };
                Self::stepped(min, max, num, to_minutes(*time_min)?)
            }
            other => Err(DuelError::InvalidArguments(format!(
                "expected 0, 2 or 4 numeric arguments, got {}",
                other.len()
            ))),
        }
    }

    fn stepped(min: u32, max: u32, num: u32, time_min: u64) -> DuelResult<Self> {
        let ratings = if num == 1 {
            vec![min]
        } else {
            let step = (max - min) / (num - 1);
            (0..num).map(|i| min + i * step).collect()
        };
        Ok(Self {
            ratings,
            time_limit_secs: time_min * 60,
        })
    }
}

fn to_rating(v: i64) -> DuelResult<u32> {
    if (0..=5000).contains(&v) {
        Ok(v as u32)
    } else {
        Err(DuelError::InvalidArguments(format!("rating {v} out of range")))
    }
}

fn to_minutes(v: i64) -> DuelResult<u64> {
    if v >= 1 {
        Ok(v as u64)
    } else {
        Err(DuelError::InvalidArguments(format!(
            "time limit {v} must be at least one minute"
        )))
    }
}

/// Point value for problem slot `idx`, falling back to the positional
/// default when the points list is shorter than the problem list.
pub fn points_for_slot(points: &[u32], idx: usize) -> u32 {
    points
        .get(idx)
        .copied()
        .unwrap_or_else(|| 100 * (idx as u32 + 1))
}

/// The central mutable entity: one timed two-party duel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuelSession {
    pub users: (UserId, UserId),
    pub handles: (Handle, Handle),
    /// Fixed at creation, one per requested rating.
    pub problems: Vec<Problem>,
    /// Canonical ids, parallel to `problems`.
    pub problem_ids: Vec<ProblemId>,
    pub ratings: Vec<u32>,
    /// Point values, parallel to `problems`.
    pub points: Vec<u32>,
    /// Mutated only by reconciliation, monotonically.
    pub per_problem: HashMap<ProblemId, ProblemOutcome>,
    /// Accumulated points per handle. Never decreases.
    pub scores: HashMap<Handle, u32>,
    /// First instant each handle's score increased. First write wins;
    /// consulted only for the final tie-break.
    pub score_reached_at: HashMap<Handle, DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub time_limit_secs: u64,
    /// Set exactly once, by finalization.
    pub ended: bool,
    pub channel: ChannelId,
}

impl DuelSession {
    pub fn new(
        users: (UserId, UserId),
        handles: (Handle, Handle),
        problems: Vec<Problem>,
        ratings: Vec<u32>,
        time_limit_secs: u64,
        channel: ChannelId,
    ) -> Self {
        let problem_ids: Vec<ProblemId> = problems.iter().map(Problem::id).collect();
        let points = if problems.len() == DEFAULT_POINTS.len() {
            DEFAULT_POINTS.to_vec()
        } else {
            (0..problems.len()).map(|i| 100 * (i as u32 + 1)).collect()
        };
        let per_problem = problem_ids
            .iter()
            .map(|pid| (pid.clone(), ProblemOutcome::unresolved()))
            .collect();
        let mut scores = HashMap::new();
        scores.insert(handles.0.clone(), 0);
        scores.insert(handles.1.clone(), 0);
        Self {
            users,
            handles,
            problems,
            problem_ids,
            ratings,
            points,
            per_problem,
            scores,
            score_reached_at: HashMap::new(),
            started_at: Utc::now(),
            time_limit_secs,
            ended: false,
            channel,
        }
    }

    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.users.0, self.users.1)
    }

    pub fn score_of(&self, handle: &str) -> u32 {
        self.scores.get(handle).copied().unwrap_or(0)
    }

    pub fn outcome(&self, pid: &str) -> Option<&ProblemOutcome> {
        self.per_problem.get(pid)
    }

    pub fn all_resolved(&self) -> bool {
        self.problem_ids
            .iter()
            .all(|pid| self.per_problem[pid].solved_by.is_resolved())
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds()
    }

    pub fn time_expired(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_secs(now) > self.time_limit_secs as i64
    }

    pub fn seconds_left(&self, now: DateTime<Utc>) -> i64 {
        (self.time_limit_secs as i64 - self.elapsed_secs(now)).max(0)
    }

    /// Bookkeeping identity: each handle's score equals the points of the
    /// problems it was awarded. Used by tests after every reconciliation.
    pub fn scores_consistent(&self) -> bool {
        let mut expected: HashMap<&str, u32> = HashMap::new();
        expected.insert(self.handles.0.as_str(), 0);
        expected.insert(self.handles.1.as_str(), 0);
        for (idx, pid) in self.problem_ids.iter().enumerate() {
            let pts = points_for_slot(&self.points, idx);
            match &self.per_problem[pid].solved_by {
                SolvedBy::WonBy { handle } => {
                    *expected.entry(handle.as_str()).or_insert(0) += pts;
                }
                SolvedBy::DualAward => {
                    *expected.entry(self.handles.0.as_str()).or_insert(0) += pts;
                    if self.handles.1 != self.handles.0 {
                        *expected.entry(self.handles.1.as_str()).or_insert(0) += pts;
                    }
                }
                SolvedBy::Unresolved | SolvedBy::Tied => {}
            }
        }
        expected
            .into_iter()
            .all(|(h, pts)| self.score_of(h) == pts)
    }
}

/// Final result classification of a finished duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuelVerdict {
    /// Strictly higher score.
    Winner { handle: Handle },
    /// Equal scores, earlier to reach the final score.
    TieBreak { handle: Handle },
    /// Equal scores and no usable tie-break.
    Draw,
}

/// Immutable archival snapshot of a finalized session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentDuelRecord {
    pub users: (UserId, UserId),
    pub handles: (Handle, Handle),
    pub ratings: Vec<u32>,
    pub points: Vec<u32>,
    pub scores: HashMap<Handle, u32>,
    pub per_problem: HashMap<ProblemId, ProblemOutcome>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl RecentDuelRecord {
    pub fn from_session(session: &DuelSession, ended_at: DateTime<Utc>) -> Self {
        Self {
            users: session.users,
            handles: session.handles.clone(),
            ratings: session.ratings.clone(),
            points: session.points.clone(),
            scores: session.scores.clone(),
            per_problem: session.per_problem.clone(),
            started_at: session.started_at,
            ended_at,
        }
    }

    /// Score-only winner, as shown in the history listing.
    pub fn winner(&self) -> Option<&str> {
        let (h1, h2) = (&self.handles.0, &self.handles.1);
        let s1 = self.scores.get(h1).copied().unwrap_or(0);
        let s2 = self.scores.get(h2).copied().unwrap_or(0);
        match s1.cmp(&s2) {
            std::cmp::Ordering::Greater => Some(h1),
            std::cmp::Ordering::Less => Some(h2),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        (self.ended_at - self.started_at).num_seconds().max(0)
    }
}
