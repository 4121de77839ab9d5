//! Problem selection for new duels
//!
//! One unsolved problem per requested rating, drawn from the shared
//! catalog. Candidates at the exact rating are shuffled to avoid
//! positional bias; a rating with no qualifying problem falls back to
//! nearby ratings before the whole selection fails. Partial selections
//! are never returned.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{DuelError, DuelResult};
use crate::judge::{JudgeClient, Problem, SubmissionHistory};

/// Tags that disqualify a problem from duels.
const DISALLOWED_TAGS: &[&str] = &[
    "output-only",
    "*special problem",
    "challenge",
    "expression parsing",
];

/// Nearby-rating fallback offsets, tried in order.
const FALLBACK_OFFSETS: &[i32] = &[100, -100, 200, -200, 300, -300, 400, -400, 500, -500];

fn has_disallowed_tag(problem: &Problem) -> bool {
    problem
        .tags
        .iter()
        .any(|t| DISALLOWED_TAGS.contains(&t.as_str()))
}

/// Pick one qualifying problem at exactly `rating`, or `None`.
fn find_for_rating<R: Rng>(
    catalog: &[Problem],
    rating: u32,
    excluded: &HashSet<String>,
    hist1: &SubmissionHistory,
    hist2: &SubmissionHistory,
    rng: &mut R,
) -> Option<Problem> {
    let mut candidates: Vec<&Problem> = catalog
        .iter()
        .filter(|p| p.rating == Some(rating))
        .collect();
    candidates.shuffle(rng);

    for p in candidates {
        if has_disallowed_tag(p) {
            continue;
        }
        let pid = p.id();
        if excluded.contains(&pid) || hist1.contains_key(&pid) || hist2.contains_key(&pid) {
            continue;
        }
        return Some(p.clone());
    }
    None
}

/// Select one problem per rating in `ratings`, with fallback search over
/// nearby ratings. Fails with `InsufficientProblems` if any rating cannot
/// be served; the partial result is discarded.
pub fn select_problems<R: Rng>(
    catalog: &[Problem],
    hist1: &SubmissionHistory,
    hist2: &SubmissionHistory,
    ratings: &[u32],
    rng: &mut R,
) -> DuelResult<Vec<Problem>> {
    let mut selected = Vec::with_capacity(ratings.len());
    let mut excluded: HashSet<String> = HashSet::new();

    for &rating in ratings {
        let mut picked = find_for_rating(catalog, rating, &excluded, hist1, hist2, rng);
        if picked.is_none() {
            for &offset in FALLBACK_OFFSETS {
                let target = rating as i32 + offset;
                if target < 0 {
                    continue;
                }
                picked = find_for_rating(catalog, target as u32, &excluded, hist1, hist2, rng);
                if picked.is_some() {
                    break;
                }
            }
        }
        let p = picked.ok_or(DuelError::InsufficientProblems { rating })?;
        excluded.insert(p.id());
        selected.push(p);
    }
    Ok(selected)
}

/// Fetch both submission histories and the catalog, then select.
///
/// The histories are fetched directly, never from a cache; stale data
/// here would hand a duelist a problem they have already solved.
pub async fn select_for_handles(
    judge: &dyn JudgeClient,
    handle1: &str,
    handle2: &str,
    ratings: &[u32],
) -> DuelResult<Vec<Problem>> {
    let hist1 = judge.fetch_submissions(handle1).await?;
    let hist2 = judge.fetch_submissions(handle2).await?;
    let catalog = judge.fetch_problemset().await?;
    select_problems(&catalog, &hist1, &hist2, ratings, &mut rand::thread_rng())
}
