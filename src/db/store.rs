//! SQLite-backed target repository.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::history::{PollHistory, HISTORY_CAPACITY};
use super::models::{MonitoredTarget, PollOutcome, PollResult, TargetStatus};

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Not found")]
    NotFound,
}

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const TARGET_COLUMNS: &str = "id, name, url, interval_minutes, is_active, status, last_ping, \
     response_time_ms, total_pings, success_count, next_ping_at, created_at, updated_at";

/// Thread-safe handle to the target database.
///
/// Writes that touch a target and its history run in one transaction, so a
/// reader never observes counters from one probe paired with history from
/// another. The scheduler and the REST layer write disjoint column sets
/// ([`Store::record_probe`] vs [`Store::update_config`]): a config edit made
/// while a probe is in flight survives the probe's write-back, and a probe
/// outcome survives a concurrent edit.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at the given path and run migrations.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("migration 1 failed: {}", e)))?;
        Ok(())
    }

    /// Insert a new target and fill in its assigned id.
    pub fn add_target(&self, target: &mut MonitoredTarget) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO targets (name, url, interval_minutes, is_active, status, last_ping, \
             response_time_ms, total_pings, success_count, next_ping_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                target.name,
                target.url,
                target.interval_minutes,
                target.is_active,
                target.status.to_string(),
                target.last_ping.map(format_db_time),
                target.response_time_ms,
                target.total_pings,
                target.success_count,
                target.next_ping_at.map(format_db_time),
                format_db_time(target.created_at),
                format_db_time(target.updated_at),
            ],
        )?;
        target.id = conn.last_insert_rowid();
        Ok(target.id)
    }

    /// All targets, newest first.
    pub fn get_targets(&self) -> Result<Vec<MonitoredTarget>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM targets ORDER BY created_at DESC, id DESC",
            TARGET_COLUMNS
        ))?;
        let mut targets = stmt
            .query_map([], target_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        for target in &mut targets {
            target.history = load_history(&conn, target.id)?;
        }
        Ok(targets)
    }

    /// One target by id.
    pub fn get_target(&self, id: i64) -> Result<MonitoredTarget, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut target = conn
            .query_row(
                &format!("SELECT {} FROM targets WHERE id = ?1", TARGET_COLUMNS),
                params![id],
                target_from_row,
            )
            .map_err(not_found_or)?;
        target.history = load_history(&conn, id)?;
        Ok(target)
    }

    /// Active targets whose next probe time has arrived.
    ///
    /// A NULL `next_ping_at` counts as due, so targets from older records
    /// are swept back into the cycle instead of stalling forever.
    pub fn find_due_targets(&self, now: DateTime<Utc>) -> Result<Vec<MonitoredTarget>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM targets \
             WHERE is_active = 1 AND (next_ping_at IS NULL OR next_ping_at <= ?1) \
             ORDER BY id ASC",
            TARGET_COLUMNS
        ))?;
        let mut targets = stmt
            .query_map(params![format_db_time(now)], target_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        for target in &mut targets {
            target.history = load_history(&conn, target.id)?;
        }
        Ok(targets)
    }

    /// Write back the scheduler-owned fields after a probe: live status,
    /// counters, `next_ping_at` and the newest history entry.
    ///
    /// Configuration columns (`name`, `url`, `interval_minutes`,
    /// `is_active`) are not touched, so a rename or pause made while the
    /// probe was in flight is not reverted by this write-back.
    ///
    /// The history table is re-trimmed to the newest [`HISTORY_CAPACITY`]
    /// rows inside the same transaction, so the cap holds at the storage
    /// level no matter what the table held before.
    pub fn record_probe(&self, target: &MonitoredTarget) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        let updated = tx.execute(
            "UPDATE targets SET status = ?1, last_ping = ?2, response_time_ms = ?3, \
             total_pings = ?4, success_count = ?5, next_ping_at = ?6, updated_at = ?7 \
             WHERE id = ?8",
            params![
                target.status.to_string(),
                target.last_ping.map(format_db_time),
                target.response_time_ms,
                target.total_pings,
                target.success_count,
                target.next_ping_at.map(format_db_time),
                format_db_time(target.updated_at),
                target.id,
            ],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }

        if let Some(entry) = target.history.newest() {
            tx.execute(
                "INSERT INTO poll_history (target_id, timestamp, outcome, response_time_ms, \
                 status_code, error) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    target.id,
                    format_db_time(entry.timestamp),
                    entry.outcome.to_string(),
                    entry.response_time_ms,
                    entry.status_code,
                    entry.error,
                ],
            )?;
        }
        tx.execute(
            "DELETE FROM poll_history WHERE target_id = ?1 AND id NOT IN \
             (SELECT id FROM poll_history WHERE target_id = ?1 ORDER BY id DESC LIMIT ?2)",
            params![target.id, HISTORY_CAPACITY as i64],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Write back the user-editable configuration fields only.
    ///
    /// Status, counters, `next_ping_at` and history belong to the scheduler
    /// and are left alone, so an edit cannot undo a probe that completed
    /// between read and write.
    pub fn update_config(&self, target: &MonitoredTarget) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE targets SET name = ?1, url = ?2, interval_minutes = ?3, is_active = ?4, \
             updated_at = ?5 WHERE id = ?6",
            params![
                target.name,
                target.url,
                target.interval_minutes,
                target.is_active,
                format_db_time(target.updated_at),
                target.id,
            ],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Delete a target and its history.
    pub fn delete_target(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM poll_history WHERE target_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM targets WHERE id = ?1", params![id])?;
        tx.commit()?;
        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn not_found_or(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
        other => DbError::Sqlite(other),
    }
}

fn target_from_row(row: &Row<'_>) -> SqlResult<MonitoredTarget> {
    let status: String = row.get(5)?;
    let last_ping: Option<String> = row.get(6)?;
    let next_ping_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(MonitoredTarget {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        interval_minutes: row.get(3)?,
        is_active: row.get(4)?,
        status: TargetStatus::from_db(&status),
        last_ping: last_ping.as_deref().and_then(parse_db_time),
        response_time_ms: row.get(7)?,
        total_pings: row.get(8)?,
        success_count: row.get(9)?,
        next_ping_at: next_ping_at.as_deref().and_then(parse_db_time),
        // Filled in by the caller, outside the row mapper.
        history: PollHistory::new(),
        created_at: parse_db_time(&created_at).unwrap_or_else(Utc::now),
        updated_at: parse_db_time(&updated_at).unwrap_or_else(Utc::now),
    })
}

/// History rows for one target in insertion order, capped by the ring.
fn load_history(conn: &Connection, target_id: i64) -> Result<PollHistory, DbError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, outcome, response_time_ms, status_code, error \
         FROM poll_history WHERE target_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![target_id], |row| {
            let timestamp: String = row.get(0)?;
            let outcome: String = row.get(1)?;
            Ok(PollResult {
                timestamp: parse_db_time(&timestamp).unwrap_or_else(Utc::now),
                outcome: PollOutcome::from_db(&outcome),
                response_time_ms: row.get(2)?,
                status_code: row.get(3)?,
                error: row.get(4)?,
            })
        })?
        .collect::<SqlResult<Vec<_>>>()?;
    Ok(PollHistory::from_rows(rows))
}

fn format_db_time(dt: DateTime<Utc>) -> String {
    dt.format(DB_TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [DB_TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn sample_target(store: &Store, name: &str, now: DateTime<Utc>) -> MonitoredTarget {
        let mut target = MonitoredTarget::new(name, "https://example.com", 5, now).unwrap();
        store.add_target(&mut target).unwrap();
        target
    }

    fn sample_result(now: DateTime<Utc>, n: i64, outcome: PollOutcome) -> PollResult {
        PollResult {
            timestamp: now + Duration::seconds(n),
            outcome,
            response_time_ms: 100 + n,
            status_code: if outcome.is_online() { 200 } else { 0 },
            error: if outcome.is_online() { None } else { Some("connection refused".to_string()) },
        }
    }

    #[test]
    fn test_target_crud() {
        let (_dir, store) = test_store();
        let now = Utc::now();

        let mut target = sample_target(&store, "Example", now);
        assert!(target.id > 0);

        let loaded = store.get_target(target.id).unwrap();
        assert_eq!(loaded.name, "Example");
        assert_eq!(loaded.url, "https://example.com");
        assert_eq!(loaded.interval_minutes, 5);
        assert!(loaded.is_active);
        assert_eq!(loaded.status, TargetStatus::Pending);
        assert_eq!(loaded.next_ping_at, Some(now));

        target.name = "Renamed".to_string();
        target.interval_minutes = 10;
        store.update_config(&target).unwrap();
        let reloaded = store.get_target(target.id).unwrap();
        assert_eq!(reloaded.name, "Renamed");
        assert_eq!(reloaded.interval_minutes, 10);

        store.delete_target(target.id).unwrap();
        assert!(matches!(store.get_target(target.id), Err(DbError::NotFound)));
        assert!(matches!(store.delete_target(target.id), Err(DbError::NotFound)));
    }

    #[test]
    fn test_get_targets_newest_first() {
        let (_dir, store) = test_store();
        let now = Utc::now();

        sample_target(&store, "Older", now - Duration::minutes(2));
        sample_target(&store, "Newer", now);

        let targets = store.get_targets().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "Newer");
        assert_eq!(targets[1].name, "Older");
    }

    #[test]
    fn test_find_due_targets() {
        let (_dir, store) = test_store();
        let now = Utc::now();

        let due = sample_target(&store, "Due", now - Duration::minutes(1));
        let mut future = sample_target(&store, "Future", now);
        future.next_ping_at = Some(now + Duration::minutes(5));
        store.record_probe(&future).unwrap();
        let mut paused = sample_target(&store, "Paused", now - Duration::minutes(1));
        paused.is_active = false;
        store.update_config(&paused).unwrap();
        let mut unscheduled = sample_target(&store, "Unscheduled", now);
        unscheduled.next_ping_at = None;
        store.record_probe(&unscheduled).unwrap();

        let found = store.find_due_targets(now).unwrap();
        let names: Vec<&str> = found.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"Due"));
        assert!(names.contains(&"Unscheduled"));
        assert!(!names.contains(&"Future"));
        assert!(!names.contains(&"Paused"));
        assert_eq!(found.iter().find(|t| t.id == due.id).unwrap().name, "Due");
    }

    #[test]
    fn test_record_probe_roundtrips_history_and_counters() {
        let (_dir, store) = test_store();
        let now = Utc::now();

        let mut target = sample_target(&store, "Example", now);
        target.status = TargetStatus::Online;
        target.last_ping = Some(now);
        target.response_time_ms = 123;
        for (n, outcome) in
            [PollOutcome::Online, PollOutcome::Offline, PollOutcome::Online].into_iter().enumerate()
        {
            target.total_pings += 1;
            if outcome.is_online() {
                target.success_count += 1;
            }
            target.history.push(sample_result(now, n as i64, outcome));
            store.record_probe(&target).unwrap();
        }

        let loaded = store.get_target(target.id).unwrap();
        assert_eq!(loaded.status, TargetStatus::Online);
        assert_eq!(loaded.total_pings, 3);
        assert_eq!(loaded.success_count, 2);
        assert_eq!(loaded.history.len(), 3);

        let entries: Vec<PollResult> = loaded.history.iter().cloned().collect();
        assert_eq!(entries[0], sample_result(now, 0, PollOutcome::Online));
        assert_eq!(entries[1], sample_result(now, 1, PollOutcome::Offline));
        assert_eq!(entries[2], sample_result(now, 2, PollOutcome::Online));
    }

    #[test]
    fn test_record_probe_leaves_config_columns_alone() {
        let (_dir, store) = test_store();
        let now = Utc::now();

        // A stale in-memory copy carries the pre-edit configuration.
        let mut stale = sample_target(&store, "Original", now);
        let mut edited = store.get_target(stale.id).unwrap();
        edited.name = "Renamed".to_string();
        edited.interval_minutes = 30;
        edited.is_active = false;
        edited.updated_at = now;
        store.update_config(&edited).unwrap();

        stale.status = TargetStatus::Online;
        stale.total_pings = 1;
        stale.success_count = 1;
        stale.history.push(sample_result(now, 0, PollOutcome::Online));
        store.record_probe(&stale).unwrap();

        let loaded = store.get_target(stale.id).unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(loaded.interval_minutes, 30);
        assert!(!loaded.is_active);
        // The probe outcome landed regardless.
        assert_eq!(loaded.status, TargetStatus::Online);
        assert_eq!(loaded.total_pings, 1);
        assert_eq!(loaded.history.len(), 1);
    }

    #[test]
    fn test_update_config_leaves_stat_columns_alone() {
        let (_dir, store) = test_store();
        let now = Utc::now();

        let mut target = sample_target(&store, "Example", now);
        target.status = TargetStatus::Online;
        target.total_pings = 7;
        target.success_count = 6;
        target.next_ping_at = Some(now + Duration::minutes(5));
        target.history.push(sample_result(now, 0, PollOutcome::Online));
        store.record_probe(&target).unwrap();

        // An edit from a copy read before the probe completed.
        let mut edited = target.clone();
        edited.status = TargetStatus::Pending;
        edited.total_pings = 0;
        edited.success_count = 0;
        edited.next_ping_at = Some(now);
        edited.name = "Renamed".to_string();
        store.update_config(&edited).unwrap();

        let loaded = store.get_target(target.id).unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(loaded.status, TargetStatus::Online);
        assert_eq!(loaded.total_pings, 7);
        assert_eq!(loaded.success_count, 6);
        assert_eq!(loaded.next_ping_at, Some(now + Duration::minutes(5)));
        assert_eq!(loaded.history.len(), 1);
    }

    #[test]
    fn test_record_probe_trims_oversized_stored_history() {
        let (_dir, store) = test_store();
        let now = Utc::now();

        let mut target = sample_target(&store, "Example", now);
        // Overstuff the table directly, past what the ring would ever hand in.
        {
            let conn = store.conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "INSERT INTO poll_history (target_id, timestamp, outcome, response_time_ms, \
                     status_code, error) VALUES (?1, ?2, 'online', ?3, 200, NULL)",
                )
                .unwrap();
            for n in 0..150i64 {
                stmt.execute(params![
                    target.id,
                    format_db_time(now + Duration::seconds(n)),
                    100 + n
                ])
                .unwrap();
            }
        }

        target.total_pings = 151;
        target.success_count = 151;
        target.history.push(sample_result(now, 151, PollOutcome::Online));
        store.record_probe(&target).unwrap();

        let stored_rows: i64 = {
            let conn = store.conn.lock().unwrap();
            conn.query_row(
                "SELECT COUNT(*) FROM poll_history WHERE target_id = ?1",
                params![target.id],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(stored_rows, HISTORY_CAPACITY as i64);

        let loaded = store.get_target(target.id).unwrap();
        assert_eq!(loaded.history.len(), HISTORY_CAPACITY);
        // The newest surviving row is the probe just recorded; the oldest 51
        // of the 151 stored rows were dropped.
        assert_eq!(loaded.history.newest().unwrap().response_time_ms, 251);
        assert_eq!(loaded.history.iter().next().unwrap().response_time_ms, 151);
    }

    #[test]
    fn test_writes_to_unknown_target() {
        let (_dir, store) = test_store();
        let target = MonitoredTarget::new("Ghost", "https://example.com", 5, Utc::now()).unwrap();
        assert!(matches!(store.record_probe(&target), Err(DbError::NotFound)));
        assert!(matches!(store.update_config(&target), Err(DbError::NotFound)));
    }

    #[test]
    fn test_time_format_roundtrip() {
        let now = Utc::now();
        assert_eq!(parse_db_time(&format_db_time(now)), Some(now));
        assert_eq!(
            parse_db_time("2026-01-05 10:30:00"),
            Some(DateTime::from_naive_utc_and_offset(
                NaiveDateTime::parse_from_str("2026-01-05 10:30:00", "%Y-%m-%d %H:%M:%S").unwrap(),
                Utc
            ))
        );
        assert_eq!(parse_db_time("not a time"), None);
    }
}
