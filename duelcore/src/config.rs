//! Service configuration
//!
//! Defaults follow the judge service's published guidelines (one request per
//! two seconds) and can be overridden through environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level duel service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the judge service REST API.
    pub api_base_url: String,
    /// Minimum spacing between any two outgoing API requests.
    pub min_request_interval: Duration,
    /// Attempts per API call before surfacing `DataUnavailable`.
    pub request_attempts: u32,
    /// Backoff between failed attempts.
    pub retry_backoff: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Ceiling on concurrently active duels.
    pub max_active_duels: usize,
    /// How many finalized duels the archival log keeps.
    pub max_recent: usize,
    /// Path of the archival log file.
    pub recent_path: PathBuf,
    /// Path of the handle directory file.
    pub handles_path: PathBuf,
    /// Interval of the timeout watcher sweep.
    pub sweep_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("DUEL_API_BASE_URL")
                .unwrap_or_else(|_| "https://codeforces.com/api".to_string()),
            min_request_interval: std::env::var("DUEL_MIN_REQUEST_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_secs(2)),
            request_attempts: std::env::var("DUEL_REQUEST_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            retry_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            max_active_duels: std::env::var("DUEL_MAX_ACTIVE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            max_recent: std::env::var("DUEL_MAX_RECENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            recent_path: std::env::var("DUEL_RECENT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("recent_duels.json")),
            handles_path: std::env::var("DUEL_HANDLES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("handles.json")),
            sweep_interval: std::env::var("DUEL_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(5)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.min_request_interval, Duration::from_secs(2));
        assert_eq!(cfg.request_attempts, 2);
        assert_eq!(cfg.max_active_duels, 20);
        assert_eq!(cfg.max_recent, 20);
        assert_eq!(cfg.sweep_interval, Duration::from_secs(5));
    }
}
