//! Reconciliation engine
//!
//! Compares both duelists' fresh submission histories against the
//! session's unresolved problems and locks in outcomes: the strictly
//! earlier accepted solve wins the slot's full points, equal seconds tie
//! with no points, and the rare case of two accepted solves with no
//! usable timestamps awards both sides. Resolved slots are never
//! revisited, so every attribution is terminal.

use chrono::{DateTime, Utc};

use crate::duel::types::{points_for_slot, DuelSession, ProblemOutcome, SolvedBy};
use crate::error::DuelResult;
use crate::judge::{JudgeClient, ProblemId, SubmissionHistory};

/// One problem whose outcome this reconciliation pass locked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlot {
    pub index: usize,
    pub problem_id: ProblemId,
    pub outcome: SolvedBy,
    /// Points granted to each awarded handle (zero for a tie).
    pub points: u32,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub newly_resolved: Vec<ResolvedSlot>,
    /// True when every problem is resolved or the time budget is spent.
    pub should_finalize: bool,
}

/// Apply two submission histories to the session state.
///
/// Pure state transition; fetching lives in [`reconcile`]. A session that
/// has already ended is left untouched.
pub fn apply_histories(
    session: &mut DuelSession,
    hist1: &SubmissionHistory,
    hist2: &SubmissionHistory,
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    if session.ended {
        return ReconcileOutcome::default();
    }

    let (h1, h2) = (session.handles.0.clone(), session.handles.1.clone());
    let mut newly_resolved = Vec::new();

    for idx in 0..session.problem_ids.len() {
        let pid = session.problem_ids[idx].clone();
        if session.per_problem[&pid].solved_by.is_resolved() {
            continue;
        }
        let t1 = hist1.get(&pid).copied();
        let t2 = hist2.get(&pid).copied();

        let resolution = match (t1, t2) {
            (None, None) => continue,
            (Some(t), None) => Resolution::Win(h1.clone(), t),
            (None, Some(t)) => Resolution::Win(h2.clone(), t),
            (Some(t1), Some(t2)) if t1 > 0 && t2 > 0 => {
                if t1 < t2 {
                    Resolution::Win(h1.clone(), t1)
                } else if t2 < t1 {
                    Resolution::Win(h2.clone(), t2)
                } else {
                    Resolution::Tie(t1)
                }
            }
            // Both accepted, but the service gave no usable timestamps:
            // documented fallback, both sides take the slot's points.
            (Some(_), Some(_)) => Resolution::Dual,
        };

        let points = points_for_slot(&session.points, idx);
        let slot = match resolution {
            Resolution::Win(winner, t) => {
                award(session, &winner, points, now);
                session.per_problem.insert(
                    pid.clone(),
                    ProblemOutcome {
                        solved_by: SolvedBy::WonBy {
                            handle: winner.clone(),
                        },
                        first_solve_time: Some(t),
                    },
                );
                ResolvedSlot {
                    index: idx,
                    problem_id: pid,
                    outcome: SolvedBy::WonBy { handle: winner },
                    points,
                }
            }
            Resolution::Tie(t) => {
                session.per_problem.insert(
                    pid.clone(),
                    ProblemOutcome {
                        solved_by: SolvedBy::Tied,
                        first_solve_time: Some(t),
                    },
                );
                ResolvedSlot {
                    index: idx,
                    problem_id: pid,
                    outcome: SolvedBy::Tied,
                    points: 0,
                }
            }
            Resolution::Dual => {
                award(session, &h1, points, now);
                if h2 != h1 {
                    award(session, &h2, points, now);
                }
                session.per_problem.insert(
                    pid.clone(),
                    ProblemOutcome {
                        solved_by: SolvedBy::DualAward,
                        first_solve_time: Some(now.timestamp()),
                    },
                );
                ResolvedSlot {
                    index: idx,
                    problem_id: pid,
                    outcome: SolvedBy::DualAward,
                    points,
                }
            }
        };
        newly_resolved.push(slot);
    }

    let should_finalize = session.all_resolved() || session.time_expired(now);
    ReconcileOutcome {
        newly_resolved,
        should_finalize,
    }
}

enum Resolution {
    Win(String, i64),
    Tie(i64),
    Dual,
}

/// Credit `points` to `handle` and stamp its first score increase.
/// The stamp is first-write-wins; only the final-score instant matters
/// for the tie-break, but the first increase is what gets recorded.
fn award(session: &mut DuelSession, handle: &str, points: u32, now: DateTime<Utc>) {
    *session.scores.entry(handle.to_string()).or_insert(0) += points;
    session
        .score_reached_at
        .entry(handle.to_string())
        .or_insert(now);
}

/// Fetch both histories fresh and apply them.
///
/// On any fetch failure the session is untouched and the transient
/// `DataUnavailable` propagates to the caller.
pub async fn reconcile(
    judge: &dyn JudgeClient,
    session: &mut DuelSession,
) -> DuelResult<ReconcileOutcome> {
    let (h1, h2) = (session.handles.0.clone(), session.handles.1.clone());
    let hist1 = judge.fetch_submissions(&h1).await?;
    let hist2 = judge.fetch_submissions(&h2).await?;
    Ok(apply_histories(session, &hist1, &hist2, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Problem;

    fn problem(contest: u32, index: &str, rating: u32) -> Problem {
        Problem {
            contest_id: contest,
            index: index.to_string(),
            name: format!("{contest}{index}"),
            rating: Some(rating),
            tags: Vec::new(),
        }
    }

    fn session() -> DuelSession {
        DuelSession::new(
            (1, 2),
            ("alice".to_string(), "bob".to_string()),
            vec![problem(1, "A", 800), problem(2, "B", 900)],
            vec![800, 900],
            1800,
            1,
        )
    }

    fn hist(entries: &[(&str, i64)]) -> SubmissionHistory {
        entries
            .iter()
            .map(|(pid, t)| (pid.to_string(), *t))
            .collect()
    }

    #[test]
    fn test_single_solver_takes_full_points() {
        let mut s = session();
        let now = Utc::now();
        let out = apply_histories(&mut s, &hist(&[("1-A", 100)]), &hist(&[]), now);

        assert_eq!(out.newly_resolved.len(), 1);
        assert_eq!(
            out.newly_resolved[0].outcome,
            SolvedBy::WonBy {
                handle: "alice".to_string()
            }
        );
        assert_eq!(out.newly_resolved[0].points, 100);
        assert_eq!(s.score_of("alice"), 100);
        assert_eq!(s.score_of("bob"), 0);
        assert_eq!(s.score_reached_at.get("alice"), Some(&now));
        assert!(s.score_reached_at.get("bob").is_none());
        assert!(s.scores_consistent());
        assert!(!out.should_finalize);
    }

    #[test]
    fn test_earlier_timestamp_wins_with_no_split() {
        let mut s = session();
        let now = Utc::now();
        let out = apply_histories(
            &mut s,
            &hist(&[("1-A", 100)]),
            &hist(&[("1-A", 200)]),
            now,
        );

        assert_eq!(s.score_of("alice"), 100);
        assert_eq!(s.score_of("bob"), 0);
        assert_eq!(
            s.outcome("1-A").unwrap().solved_by,
            SolvedBy::WonBy {
                handle: "alice".to_string()
            }
        );
        assert_eq!(s.outcome("1-A").unwrap().first_solve_time, Some(100));
        assert_eq!(out.newly_resolved.len(), 1);
        assert!(s.scores_consistent());
    }

    #[test]
    fn test_equal_timestamps_tie_with_zero_points() {
        let mut s = session();
        let out = apply_histories(
            &mut s,
            &hist(&[("1-A", 100)]),
            &hist(&[("1-A", 100)]),
            Utc::now(),
        );

        assert_eq!(out.newly_resolved[0].outcome, SolvedBy::Tied);
        assert_eq!(out.newly_resolved[0].points, 0);
        assert_eq!(s.score_of("alice"), 0);
        assert_eq!(s.score_of("bob"), 0);
        assert!(s.outcome("1-A").unwrap().solved_by.is_resolved());
        assert!(s.score_reached_at.is_empty());
        assert!(s.scores_consistent());
    }

    #[test]
    fn test_missing_timestamps_award_both() {
        let mut s = session();
        let out = apply_histories(
            &mut s,
            &hist(&[("1-A", 0)]),
            &hist(&[("1-A", 0)]),
            Utc::now(),
        );

        assert_eq!(out.newly_resolved[0].outcome, SolvedBy::DualAward);
        assert_eq!(s.score_of("alice"), 100);
        assert_eq!(s.score_of("bob"), 100);
        assert_eq!(s.score_reached_at.len(), 2);
        assert!(s.scores_consistent());
    }

    #[test]
    fn test_resolved_slot_is_locked() {
        let mut s = session();
        let now = Utc::now();
        apply_histories(&mut s, &hist(&[("1-A", 100)]), &hist(&[]), now);

        // Bob later shows an even earlier solve; the slot must not move.
        let out = apply_histories(&mut s, &hist(&[("1-A", 100)]), &hist(&[("1-A", 50)]), now);
        assert!(out.newly_resolved.is_empty());
        assert_eq!(
            s.outcome("1-A").unwrap().solved_by,
            SolvedBy::WonBy {
                handle: "alice".to_string()
            }
        );
        assert_eq!(s.score_of("bob"), 0);
        assert!(s.scores_consistent());
    }

    #[test]
    fn test_score_stamp_is_first_write_wins() {
        let mut s = session();
        let first = Utc::now();
        apply_histories(&mut s, &hist(&[("1-A", 100)]), &hist(&[]), first);

        let later = first + chrono::Duration::seconds(300);
        apply_histories(&mut s, &hist(&[("1-A", 100), ("2-B", 400)]), &hist(&[]), later);

        assert_eq!(s.score_of("alice"), 300);
        // Stamped at the first increase, never updated.
        assert_eq!(s.score_reached_at.get("alice"), Some(&first));
    }

    #[test]
    fn test_all_resolved_requests_finalization() {
        let mut s = session();
        let out = apply_histories(
            &mut s,
            &hist(&[("1-A", 100)]),
            &hist(&[("2-B", 150)]),
            Utc::now(),
        );
        assert_eq!(out.newly_resolved.len(), 2);
        assert!(out.should_finalize);
        assert_eq!(s.score_of("alice"), 100);
        assert_eq!(s.score_of("bob"), 200);
    }

    #[test]
    fn test_time_expiry_requests_finalization_without_solves() {
        let mut s = session();
        let late = s.started_at + chrono::Duration::seconds(1900);
        let out = apply_histories(&mut s, &hist(&[]), &hist(&[]), late);
        assert!(out.newly_resolved.is_empty());
        assert!(out.should_finalize);
    }

    #[test]
    fn test_ended_session_is_never_mutated() {
        let mut s = session();
        s.ended = true;
        let out = apply_histories(&mut s, &hist(&[("1-A", 100)]), &hist(&[]), Utc::now());
        assert!(out.newly_resolved.is_empty());
        assert!(!out.should_finalize);
        assert_eq!(s.score_of("alice"), 0);
    }
}
