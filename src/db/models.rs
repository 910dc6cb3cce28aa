//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::history::PollHistory;

/// Poll interval assigned to targets created without one, in minutes.
pub const DEFAULT_INTERVAL_MINUTES: i64 = 5;

/// Upper bound on poll intervals (one year), so date arithmetic stays total.
pub const MAX_INTERVAL_MINUTES: i64 = 527_040;

/// Health state of a monitored target. `Pending` means never probed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Pending,
    Online,
    Offline,
}

impl TargetStatus {
    pub(crate) fn from_db(s: &str) -> Self {
        match s {
            "online" => TargetStatus::Online,
            "offline" => TargetStatus::Offline,
            _ => TargetStatus::Pending,
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetStatus::Pending => write!(f, "pending"),
            TargetStatus::Online => write!(f, "online"),
            TargetStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollOutcome {
    Online,
    Offline,
}

impl PollOutcome {
    pub fn is_online(self) -> bool {
        matches!(self, PollOutcome::Online)
    }

    pub(crate) fn from_db(s: &str) -> Self {
        match s {
            "online" => PollOutcome::Online,
            _ => PollOutcome::Offline,
        }
    }
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOutcome::Online => write!(f, "online"),
            PollOutcome::Offline => write!(f, "offline"),
        }
    }
}

/// One recorded probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    /// Probe completion time.
    pub timestamp: DateTime<Utc>,
    pub outcome: PollOutcome,
    /// Elapsed wall-clock time, measured on success and failure alike.
    pub response_time_ms: i64,
    /// HTTP status, 0 when no response was received.
    pub status_code: u16,
    /// Present only when no response was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A monitored endpoint with its configuration, live status, all-time
/// counters and capped poll history.
///
/// The counters are monotonic totals: they are never recomputed from the
/// history window, so truncation does not distort the uptime percentage.
#[derive(Debug, Clone)]
pub struct MonitoredTarget {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub interval_minutes: i64,
    pub is_active: bool,
    pub status: TargetStatus,
    pub last_ping: Option<DateTime<Utc>>,
    pub response_time_ms: i64,
    pub total_pings: i64,
    pub success_count: i64,
    /// `None` or a past time both mean "due now".
    pub next_ping_at: Option<DateTime<Utc>>,
    pub history: PollHistory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rejected target configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("url must start with http:// or https://")]
    BadScheme,
    #[error("interval must be at least 1 minute")]
    IntervalTooShort,
    #[error("interval must be at most {MAX_INTERVAL_MINUTES} minutes")]
    IntervalTooLong,
}

pub fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyName);
    }
    Ok(())
}

pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::BadScheme);
    }
    Ok(())
}

pub fn validate_interval(minutes: i64) -> Result<(), ConfigError> {
    if minutes < 1 {
        return Err(ConfigError::IntervalTooShort);
    }
    if minutes > MAX_INTERVAL_MINUTES {
        return Err(ConfigError::IntervalTooLong);
    }
    Ok(())
}

impl MonitoredTarget {
    /// Build a fresh target from validated configuration.
    ///
    /// New targets are active, pending and immediately due for their first
    /// probe (`next_ping_at = now`).
    pub fn new(
        name: &str,
        url: &str,
        interval_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let name = name.trim();
        let url = url.trim();
        validate_name(name)?;
        validate_url(url)?;
        validate_interval(interval_minutes)?;

        Ok(Self {
            id: 0,
            name: name.to_string(),
            url: url.to_string(),
            interval_minutes,
            is_active: true,
            status: TargetStatus::Pending,
            last_ping: None,
            response_time_ms: 0,
            total_pings: 0,
            success_count: 0,
            next_ping_at: Some(now),
            history: PollHistory::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// All-time failures, derived from the monotonic counters.
    pub fn failed_pings(&self) -> i64 {
        self.total_pings - self.success_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_target_defaults() {
        let now = Utc::now();
        let target = MonitoredTarget::new("Example", "https://example.com", 5, now).unwrap();

        assert_eq!(target.status, TargetStatus::Pending);
        assert!(target.is_active);
        assert_eq!(target.total_pings, 0);
        assert_eq!(target.success_count, 0);
        assert_eq!(target.next_ping_at, Some(now));
        assert!(target.history.is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_config() {
        let now = Utc::now();

        assert!(MonitoredTarget::new("", "https://example.com", 5, now).is_err());
        assert!(MonitoredTarget::new("   ", "https://example.com", 5, now).is_err());
        assert!(MonitoredTarget::new("Example", "ftp://example.com", 5, now).is_err());
        assert!(MonitoredTarget::new("Example", "example.com", 5, now).is_err());
        assert!(MonitoredTarget::new("Example", "https://example.com", 0, now).is_err());
        assert!(MonitoredTarget::new("Example", "https://example.com", -3, now).is_err());
        assert!(
            MonitoredTarget::new("Example", "https://example.com", MAX_INTERVAL_MINUTES + 1, now)
                .is_err()
        );
    }

    #[test]
    fn test_validation_accepts_both_schemes() {
        let now = Utc::now();
        assert!(MonitoredTarget::new("A", "http://example.com", 1, now).is_ok());
        assert!(MonitoredTarget::new("B", "https://example.com", MAX_INTERVAL_MINUTES, now).is_ok());
    }

    #[test]
    fn test_new_target_trims_fields() {
        let now = Utc::now();
        let target = MonitoredTarget::new("  Example  ", "  https://example.com  ", 5, now).unwrap();
        assert_eq!(target.name, "Example");
        assert_eq!(target.url, "https://example.com");
    }

    #[test]
    fn test_status_display_matches_db_encoding() {
        for status in [TargetStatus::Pending, TargetStatus::Online, TargetStatus::Offline] {
            assert_eq!(TargetStatus::from_db(&status.to_string()), status);
        }
        assert_eq!(TargetStatus::from_db("garbage"), TargetStatus::Pending);
    }
}
