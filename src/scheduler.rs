//! Poll scheduler.
//!
//! Drives the periodic probe cycle: find targets whose next probe time has
//! arrived, probe them one at a time, and fold each result back into the
//! store before moving on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;

use crate::db::{DbError, MonitoredTarget, PollResult, Store, TargetStatus};
use crate::probe::{ProbeExecutor, ProbeReport};
use crate::stats::uptime_percentage;

/// Time between cycle starts.
const CYCLE_PERIOD: Duration = Duration::from_secs(60);

/// Delay before the first cycle, giving the web server time to come up.
const WARMUP_DELAY: Duration = Duration::from_secs(5);

/// Runs probe cycles over the stored targets.
pub struct Scheduler {
    store: Store,
    executor: ProbeExecutor,
    /// Held for the duration of a cycle; a tick that cannot take it skips.
    cycle_gate: Semaphore,
}

impl Scheduler {
    pub fn new(store: Store, executor: ProbeExecutor) -> Self {
        Self {
            store,
            executor,
            cycle_gate: Semaphore::new(1),
        }
    }

    /// Spawn the cycle driver: one warm-up cycle shortly after startup,
    /// then one cycle per minute. Ticks missed while a cycle overruns are
    /// dropped rather than replayed in a burst.
    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            tokio::time::sleep(WARMUP_DELAY).await;
            let mut ticker = tokio::time::interval(CYCLE_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.tick(Utc::now()).await;
            }
        });
    }

    /// Run one cycle, unless the previous one is still in flight.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let _permit = match self.cycle_gate.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("Previous poll cycle still running, skipping tick");
                return;
            }
        };

        if let Err(e) = self.run_cycle(now).await {
            tracing::error!("Poll cycle aborted: {}", e);
        }
    }

    /// One full polling cycle. Returns how many targets were probed.
    ///
    /// Due targets are probed sequentially and each result is persisted
    /// before the next probe starts. A storage failure aborts the rest of
    /// the cycle: already-persisted targets keep their updates, the rest
    /// stay due and are picked up by a later tick.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        let due = self.store.find_due_targets(now)?;
        if due.is_empty() {
            tracing::debug!("No targets due for polling");
            return Ok(0);
        }

        tracing::info!("Polling {} due target(s)", due.len());

        let mut probed = 0;
        for mut target in due {
            let report = self.executor.probe(&target.url).await;
            let completed_at = Utc::now();
            apply_report(&mut target, &report, completed_at, now);
            // Status and stat columns only, so a config edit made while the
            // probe was in flight is not reverted here.
            self.store.record_probe(&target)?;
            probed += 1;

            tracing::info!(
                "{}: {} {}ms (uptime {:.2}%, next ping {})",
                target.name,
                target.status,
                report.elapsed_ms,
                uptime_percentage(target.success_count, target.total_pings),
                target
                    .next_ping_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
            if let Some(error) = &report.error {
                tracing::info!("{}: {}", target.name, error);
            }
        }

        Ok(probed)
    }
}

/// Fold one probe report into the target record.
///
/// The next probe time is anchored to the cycle start, not the probe's
/// completion, so per-probe latency does not drift the cadence.
pub fn apply_report(
    target: &mut MonitoredTarget,
    report: &ProbeReport,
    completed_at: DateTime<Utc>,
    cycle_start: DateTime<Utc>,
) {
    target.status = if report.outcome.is_online() {
        TargetStatus::Online
    } else {
        TargetStatus::Offline
    };
    target.last_ping = Some(completed_at);
    target.response_time_ms = report.elapsed_ms;
    target.total_pings += 1;
    if report.outcome.is_online() {
        target.success_count += 1;
    }
    target.history.push(PollResult {
        timestamp: completed_at,
        outcome: report.outcome,
        response_time_ms: report.elapsed_ms,
        status_code: report.status_code,
        error: report.error.clone(),
    });
    target.next_ping_at = Some(cycle_start + chrono::Duration::minutes(target.interval_minutes));
    target.updated_at = completed_at;
}
