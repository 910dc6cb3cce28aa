//! Uptime and latency statistics.
//!
//! Everything here is a read-only projection of a target's counters and
//! history; nothing mutates the record, so the same inputs always produce
//! the same numbers.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::{MonitoredTarget, PollResult, TargetStatus};

/// History entries included in summaries and all-time stats responses.
pub const RECENT_HISTORY_LEN: usize = 20;

/// All-time uptime percentage from the monotonic counters, rounded to two
/// decimals. Zero when the target has never been probed.
pub fn uptime_percentage(success_count: i64, total_pings: i64) -> f64 {
    if total_pings <= 0 {
        return 0.0;
    }
    round2(success_count as f64 / total_pings as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The per-target view served to API consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Poll interval in minutes.
    pub interval: i64,
    pub is_active: bool,
    pub status: TargetStatus,
    pub last_ping: Option<DateTime<Utc>>,
    pub response_time_ms: i64,
    pub uptime_percentage: f64,
    pub total_pings: i64,
    pub success_count: i64,
    pub failed_pings: i64,
    pub next_ping_at: Option<DateTime<Utc>>,
    /// Newest [`RECENT_HISTORY_LEN`] results, oldest first.
    pub history: Vec<PollResult>,
}

/// Build the API summary for one target.
pub fn summarize(target: &MonitoredTarget) -> TargetSummary {
    TargetSummary {
        id: target.id,
        name: target.name.clone(),
        url: target.url.clone(),
        interval: target.interval_minutes,
        is_active: target.is_active,
        status: target.status,
        last_ping: target.last_ping,
        response_time_ms: target.response_time_ms,
        uptime_percentage: uptime_percentage(target.success_count, target.total_pings),
        total_pings: target.total_pings,
        success_count: target.success_count,
        failed_pings: target.failed_pings(),
        next_ping_at: target.next_ping_at,
        history: target.history.recent(RECENT_HISTORY_LEN),
    }
}

/// All-time statistics for one target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTimeStats {
    pub uptime_percentage: f64,
    pub total_pings: i64,
    pub successful_pings: i64,
    pub failed_pings: i64,
    /// Latency of the most recent probe, not an average.
    pub response_time_ms: i64,
    pub recent_history: Vec<PollResult>,
}

pub fn all_time_stats(target: &MonitoredTarget) -> AllTimeStats {
    AllTimeStats {
        uptime_percentage: uptime_percentage(target.success_count, target.total_pings),
        total_pings: target.total_pings,
        successful_pings: target.success_count,
        failed_pings: target.failed_pings(),
        response_time_ms: target.response_time_ms,
        recent_history: target.history.recent(RECENT_HISTORY_LEN),
    }
}

/// Statistics over the history entries inside a recent time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowedStats {
    pub uptime_percentage: f64,
    pub total_pings: i64,
    pub successful_pings: i64,
    pub failed_pings: i64,
    pub avg_response_time_ms: i64,
}

/// Compute stats over history entries strictly newer than `window_hours`
/// before `now`.
///
/// When no entry falls inside the window, the all-time uptime percentage is
/// reported with zeroed counts, so a target that has been quiet for longer
/// than the window still shows its overall track record.
pub fn windowed_stats(
    target: &MonitoredTarget,
    window_hours: i64,
    now: DateTime<Utc>,
) -> WindowedStats {
    let cutoff = now - Duration::hours(window_hours);
    let relevant: Vec<&PollResult> = target
        .history
        .iter()
        .filter(|entry| entry.timestamp > cutoff)
        .collect();

    if relevant.is_empty() {
        return WindowedStats {
            uptime_percentage: uptime_percentage(target.success_count, target.total_pings),
            total_pings: 0,
            successful_pings: 0,
            failed_pings: 0,
            avg_response_time_ms: 0,
        };
    }

    let total = relevant.len() as i64;
    let successful = relevant.iter().filter(|e| e.outcome.is_online()).count() as i64;
    let mean = relevant.iter().map(|e| e.response_time_ms).sum::<i64>() as f64 / total as f64;

    WindowedStats {
        uptime_percentage: round2(successful as f64 / total as f64 * 100.0),
        total_pings: total,
        successful_pings: successful,
        failed_pings: total - successful,
        avg_response_time_ms: mean.round() as i64,
    }
}
