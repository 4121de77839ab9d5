//! Judge service client
//!
//! Read-only access to the external judging service: the full problem
//! catalog, and per-handle submission histories reduced to "earliest
//! accepted solve per problem". All outgoing requests share one pacing
//! gate (the service asks for at least one request per two seconds) and
//! are retried a small fixed number of times before the failure surfaces
//! as transient `DataUnavailable`.
//!
//! Submission histories are always fetched fresh; nothing here caches
//! them, since stale data would attribute solves to the wrong duelist.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{DuelError, DuelResult};

/// Canonical problem id: `"{contestId}-{index}"`.
pub type ProblemId = String;

/// Per handle: problem id -> earliest accepted solve time (epoch seconds).
/// A zero timestamp means the service did not report a time for the solve.
pub type SubmissionHistory = HashMap<ProblemId, i64>;

/// One catalog problem. Immutable once fetched; shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "contestId", default)]
    pub contest_id: u32,
    pub index: String,
    #[serde(default)]
    pub name: String,
    pub rating: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Problem {
    /// Canonical id string, `"{contestId}-{index}"`.
    pub fn id(&self) -> ProblemId {
        format!("{}-{}", self.contest_id, self.index)
    }

    /// External link to the problem statement.
    pub fn url(&self) -> String {
        format!(
            "https://codeforces.com/contest/{}/problem/{}",
            self.contest_id, self.index
        )
    }
}

/// Interface to the judging service.
///
/// The duel engine only ever consumes this trait; tests drive it with an
/// in-memory implementation.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Earliest accepted solve per problem for `handle`.
    async fn fetch_submissions(&self, handle: &str) -> DuelResult<SubmissionHistory>;

    /// The full problem catalog.
    async fn fetch_problemset(&self) -> DuelResult<Vec<Problem>>;
}

/// Cooperative global rate limit: at least `min_interval` between any two
/// outgoing requests, across all callers.
pub struct Pacer {
    min_interval: Duration,
    last_call: Mutex<Option<tokio::time::Instant>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Sleep until a request slot is free, then claim it.
    ///
    /// Callers are serialized through the lock, so concurrent fetches
    /// space themselves out rather than stampeding the service.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let since = prev.elapsed();
            if since < self.min_interval {
                tokio::time::sleep(self.min_interval - since).await;
            }
        }
        *last = Some(tokio::time::Instant::now());
    }
}

/// Response envelope used by every endpoint of the service.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    result: Option<T>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProblemsetPayload {
    problems: Vec<Problem>,
}

#[derive(Debug, Deserialize)]
struct SubmissionEntry {
    verdict: Option<String>,
    problem: Problem,
    #[serde(rename = "creationTimeSeconds", default)]
    creation_time_seconds: i64,
}

/// Reduce raw submission entries to earliest-accepted-time per problem.
fn history_from_entries(entries: Vec<SubmissionEntry>) -> SubmissionHistory {
    let mut solved = SubmissionHistory::new();
    for entry in entries {
        if entry.verdict.as_deref() != Some("OK") {
            continue;
        }
        let pid = entry.problem.id();
        let t = entry.creation_time_seconds;
        let earlier = match solved.get(&pid) {
            None => true,
            Some(&prev) => t != 0 && t < prev,
        };
        if earlier {
            solved.insert(pid, t);
        }
    }
    solved
}

/// Concrete client for the Codeforces REST API.
pub struct CodeforcesClient {
    http: reqwest::Client,
    base_url: String,
    pacer: Pacer,
    attempts: u32,
    retry_backoff: Duration,
}

impl CodeforcesClient {
    pub fn new(config: &ServiceConfig) -> DuelResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DuelError::DataUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            pacer: Pacer::new(config.min_request_interval),
            attempts: config.request_attempts.max(1),
            retry_backoff: config.retry_backoff,
        })
    }

    /// One paced, retried GET returning the unwrapped `result` payload.
    ///
    /// Transport errors and non-2xx responses are retried with a short
    /// backoff; a well-formed envelope with `status != OK` is a definitive
    /// answer (bad handle, service-side rejection) and is not retried.
    async fn get_result<T: serde::de::DeserializeOwned>(&self, url: &str) -> DuelResult<T> {
        let mut last_error = String::new();
        for attempt in 0..self.attempts {
            self.pacer.wait().await;
            match self.try_get(url).await {
                Ok(envelope) => {
                    if envelope.status != "OK" {
                        let comment = envelope
                            .comment
                            .unwrap_or_else(|| "request rejected".to_string());
                        debug!(url, %comment, "judge service rejected request");
                        return Err(DuelError::DataUnavailable(comment));
                    }
                    return envelope
                        .result
                        .ok_or_else(|| DuelError::DataUnavailable("empty result".to_string()));
                }
                Err(e) => {
                    warn!(url, attempt = attempt + 1, error = %e, "judge service request failed");
                    last_error = e;
                }
            }
            if attempt + 1 < self.attempts {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }
        Err(DuelError::DataUnavailable(last_error))
    }

    async fn try_get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<ApiEnvelope<T>, String> {
        let resp = self.http.get(url).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("non-success status {}", resp.status()));
        }
        resp.json::<ApiEnvelope<T>>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl JudgeClient for CodeforcesClient {
    async fn fetch_submissions(&self, handle: &str) -> DuelResult<SubmissionHistory> {
        let url = format!("{}/user.status?handle={}", self.base_url, handle.trim());
        let entries: Vec<SubmissionEntry> = self.get_result(&url).await?;
        Ok(history_from_entries(entries))
    }

    async fn fetch_problemset(&self) -> DuelResult<Vec<Problem>> {
        let url = format!("{}/problemset.problems", self.base_url);
        let payload: ProblemsetPayload = self.get_result(&url).await?;
        Ok(payload.problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(verdict: Option<&str>, contest: u32, index: &str, t: i64) -> SubmissionEntry {
        SubmissionEntry {
            verdict: verdict.map(String::from),
            problem: Problem {
                contest_id: contest,
                index: index.to_string(),
                name: String::new(),
                rating: None,
                tags: Vec::new(),
            },
            creation_time_seconds: t,
        }
    }

    #[test]
    fn test_problem_id_and_url() {
        let p = Problem {
            contest_id: 1234,
            index: "B".to_string(),
            name: "Gcd Problem".to_string(),
            rating: Some(900),
            tags: vec!["math".to_string()],
        };
        assert_eq!(p.id(), "1234-B");
        assert_eq!(p.url(), "https://codeforces.com/contest/1234/problem/B");
    }

    #[test]
    fn test_history_keeps_earliest_accepted() {
        let history = history_from_entries(vec![
            entry(Some("OK"), 1, "A", 300),
            entry(Some("OK"), 1, "A", 100),
            entry(Some("OK"), 1, "A", 200),
        ]);
        assert_eq!(history.get("1-A"), Some(&100));
    }

    #[test]
    fn test_history_skips_rejected_verdicts() {
        let history = history_from_entries(vec![
            entry(Some("WRONG_ANSWER"), 1, "A", 50),
            entry(None, 1, "B", 60),
            entry(Some("OK"), 1, "C", 70),
        ]);
        assert!(!history.contains_key("1-A"));
        assert!(!history.contains_key("1-B"));
        assert_eq!(history.get("1-C"), Some(&70));
    }

    #[test]
    fn test_history_zero_timestamp_never_wins() {
        // A zero creation time means the service reported no usable
        // timestamp for the solve. It is recorded when it is all we have,
        // but it never displaces a real one.
        let history = history_from_entries(vec![
            entry(Some("OK"), 2, "B", 500),
            entry(Some("OK"), 2, "B", 0),
        ]);
        assert_eq!(history.get("2-B"), Some(&500));

        let history = history_from_entries(vec![entry(Some("OK"), 2, "C", 0)]);
        assert_eq!(history.get("2-C"), Some(&0));
    }

    #[test]
    fn test_envelope_deserialization() {
        let raw = r#"{
            "status": "OK",
            "result": {
                "problems": [
                    {"contestId": 1, "index": "A", "name": "Theatre Square",
                     "rating": 1000, "tags": ["math"]}
                ]
            }
        }"#;
        let envelope: ApiEnvelope<ProblemsetPayload> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.status, "OK");
        let problems = envelope.result.unwrap().problems;
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].id(), "1-A");
    }

    #[test]
    fn test_envelope_failure_comment() {
        let raw = r#"{"status": "FAILED", "comment": "handle: User not found"}"#;
        let envelope: ApiEnvelope<ProblemsetPayload> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.status, "FAILED");
        assert_eq!(envelope.comment.as_deref(), Some("handle: User not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_spaces_consecutive_calls() {
        let pacer = Pacer::new(Duration::from_secs(2));
        let t0 = tokio::time::Instant::now();
        pacer.wait().await;
        assert!(t0.elapsed() < Duration::from_millis(1));
        pacer.wait().await;
        assert!(t0.elapsed() >= Duration::from_secs(2));
        pacer.wait().await;
        assert!(t0.elapsed() >= Duration::from_secs(4));
    }
}
