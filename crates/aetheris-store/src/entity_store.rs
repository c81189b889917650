//! The Entity Store (§4.E): transactional CRUD plus the higher-level
//! operations used by the rest of the core. Grounded on
//! `hdds-persistence`'s `SqliteStore` — a `Mutex<Connection>` behind a
//! small struct, schema created with `CREATE TABLE IF NOT EXISTS`, indices
//! on the columns everything queries by.

use crate::error::{Result, StoreError};
use aetheris_shared::{
    Alert, AuditLogEntry, Job, JobPhase, JobStatus, LogLevel, Robot, RobotLifecycle, Severity,
    ThresholdPair,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::warn;

/// Relational persistence for Robots, Thresholds, Alerts, Jobs and
/// AuditLogs (§3, §4.E).
///
/// Thread-safe via an internal `Mutex` (`rusqlite::Connection` is not
/// `Sync`); every public method takes the lock for the duration of one
/// statement or transaction and never holds it across an `.await`, matching
/// §5's "lock never held across a database write" requirement for callers
/// built on top of this store.
pub struct EntityStore {
    conn: Mutex<Connection>,
}

fn dedup_key(robot_id: &str, metric: &str, severity: Severity) -> String {
    format!("{}:{}:{}", robot_id, metric, severity.as_str())
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Sqlite(rusqlite::Error::InvalidColumnType(
            0,
            format!("timestamp {:?}: {}", s, e),
            rusqlite::types::Type::Text,
        )))
}

impl EntityStore {
    /// Opens (or creates) a SQLite-backed entity store at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests and by the demo `aetheris-server`
    /// binary when no database path is configured.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS robots (
                robot_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                network_address TEXT,
                last_seen TEXT NOT NULL,
                lifecycle TEXT NOT NULL,
                settings TEXT NOT NULL DEFAULT 'null'
            );

            CREATE TABLE IF NOT EXISTS thresholds (
                robot_id TEXT NOT NULL,
                metric TEXT NOT NULL,
                warn_value REAL NOT NULL,
                crit_value REAL NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (robot_id, metric)
            );

            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                robot_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                source TEXT NOT NULL,
                observed_value REAL NOT NULL,
                threshold_value REAL NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                acknowledged_by TEXT,
                acknowledged_at TEXT,
                resolved_at TEXT,
                extras TEXT NOT NULL DEFAULT 'null',
                dedup_key TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_open_dedup
                ON alerts(dedup_key) WHERE resolved_at IS NULL;
            CREATE INDEX IF NOT EXISTS idx_alerts_robot ON alerts(robot_id);

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                robot_id TEXT NOT NULL,
                task_name TEXT NOT NULL,
                phase TEXT NOT NULL,
                status TEXT NOT NULL,
                items_total INTEGER NOT NULL,
                items_done INTEGER NOT NULL,
                percent_complete REAL NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                last_item TEXT,
                cancel_reason TEXT,
                success INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_robot ON jobs(robot_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level TEXT NOT NULL,
                category TEXT NOT NULL,
                message TEXT NOT NULL,
                robot_id TEXT,
                details TEXT NOT NULL DEFAULT 'null',
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            ",
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Robots
    // ------------------------------------------------------------------

    /// Creates the robot if absent in a `first_seen`/online default state,
    /// or updates `last_seen` (and `network_address`, if given) otherwise.
    /// A single statement — safe under concurrent invocation (§4.E, §8
    /// idempotence law), never check-then-insert (§9 redesign flag).
    pub fn upsert_robot_on_seen(
        &self,
        robot_id: &str,
        last_seen: DateTime<Utc>,
        network_address: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO robots (robot_id, name, description, network_address, last_seen, lifecycle, settings)
             VALUES (?1, ?1, '', ?2, ?3, 'online', 'null')
             ON CONFLICT(robot_id) DO UPDATE SET
                last_seen = excluded.last_seen,
                network_address = COALESCE(excluded.network_address, robots.network_address),
                lifecycle = CASE WHEN robots.lifecycle = 'offline' THEN 'online' ELSE robots.lifecycle END",
            params![robot_id, network_address, fmt_ts(last_seen)],
        )?;
        Ok(())
    }

    /// Marks a robot offline without touching any other field (§3: "a
    /// Robot marked offline does not change other fields until it
    /// reconnects").
    pub fn mark_robot_offline(&self, robot_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE robots SET lifecycle = 'offline' WHERE robot_id = ?1",
            params![robot_id],
        )?;
        Ok(())
    }

    pub fn get_robot(&self, robot_id: &str) -> Result<Option<Robot>> {
        let conn = self.conn.lock().unwrap();
        let robot = conn
            .query_row(
                "SELECT robot_id, name, description, network_address, last_seen, lifecycle, settings
                 FROM robots WHERE robot_id = ?1",
                params![robot_id],
                Self::row_to_robot,
            )
            .optional()?;
        let Some(mut robot) = robot else { return Ok(None) };
        robot.thresholds = self.load_thresholds_locked(&conn, robot_id)?;
        Ok(Some(robot))
    }

    pub fn list_robots(&self) -> Result<Vec<Robot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT robot_id, name, description, network_address, last_seen, lifecycle, settings FROM robots",
        )?;
        let mut robots = stmt
            .query_map([], Self::row_to_robot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for robot in &mut robots {
            robot.thresholds = self.load_thresholds_locked(&conn, &robot.robot_id)?;
        }
        Ok(robots)
    }

    fn row_to_robot(row: &rusqlite::Row) -> rusqlite::Result<Robot> {
        let last_seen: String = row.get(4)?;
        let lifecycle: String = row.get(5)?;
        let settings: String = row.get(6)?;
        Ok(Robot {
            robot_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            network_address: row.get(3)?,
            last_seen: parse_ts(&last_seen).unwrap_or_else(|_| Utc::now()),
            lifecycle: RobotLifecycle::from_str(&lifecycle).unwrap_or(RobotLifecycle::Online),
            thresholds: BTreeMap::new(),
            settings: serde_json::from_str(&settings).unwrap_or(serde_json::Value::Null),
        })
    }

    fn load_thresholds_locked(
        &self,
        conn: &Connection,
        robot_id: &str,
    ) -> Result<BTreeMap<String, ThresholdPair>> {
        let mut stmt = conn.prepare(
            "SELECT metric, warn_value, crit_value, enabled FROM thresholds WHERE robot_id = ?1",
        )?;
        let rows = stmt.query_map(params![robot_id], |row| {
            let metric: String = row.get(0)?;
            Ok((
                metric,
                ThresholdPair {
                    warn_value: row.get(1)?,
                    crit_value: row.get(2)?,
                    enabled: row.get::<_, i64>(3)? != 0,
                },
            ))
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    // ------------------------------------------------------------------
    // Thresholds
    // ------------------------------------------------------------------

    /// Sets (or replaces) the threshold pair for `(robot_id, metric)`. Per
    /// §4.F: `warn_value` must be less severe than `crit_value`; the store
    /// rejects the call otherwise rather than silently accepting an
    /// inverted pair.
    pub fn set_threshold(
        &self,
        robot_id: &str,
        metric: &str,
        threshold: ThresholdPair,
        direction: aetheris_shared::Direction,
    ) -> Result<()> {
        let ordered_ok = match direction {
            aetheris_shared::Direction::High => threshold.warn_value <= threshold.crit_value,
            aetheris_shared::Direction::Low => threshold.warn_value >= threshold.crit_value,
        };
        if !ordered_ok {
            warn!(
                robot_id,
                metric, "rejecting threshold with warn less severe than crit in wrong direction"
            );
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO thresholds (robot_id, metric, warn_value, crit_value, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(robot_id, metric) DO UPDATE SET
                warn_value = excluded.warn_value,
                crit_value = excluded.crit_value,
                enabled = excluded.enabled",
            params![
                robot_id,
                metric,
                threshold.warn_value,
                threshold.crit_value,
                threshold.enabled as i64
            ],
        )?;
        Ok(())
    }

    pub fn get_threshold(&self, robot_id: &str, metric: &str) -> Result<Option<ThresholdPair>> {
        let conn = self.conn.lock().unwrap();
        let threshold = conn
            .query_row(
                "SELECT warn_value, crit_value, enabled FROM thresholds WHERE robot_id = ?1 AND metric = ?2",
                params![robot_id, metric],
                |row| {
                    Ok(ThresholdPair {
                        warn_value: row.get(0)?,
                        crit_value: row.get(1)?,
                        enabled: row.get::<_, i64>(2)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(threshold)
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    /// Creates (or, if one is already open under the same dedup key,
    /// updates) an Alert row. Idempotent by construction via the partial
    /// unique index on `(dedup_key) WHERE resolved_at IS NULL` (§4.F, §8
    /// idempotence law).
    #[allow(clippy::too_many_arguments)]
    pub fn create_alert(
        &self,
        robot_id: &str,
        alert_type: &str,
        severity: Severity,
        source: &str,
        observed_value: f64,
        threshold_value: f64,
        title: &str,
        message: &str,
        extras: serde_json::Value,
    ) -> Result<i64> {
        let key = dedup_key(robot_id, alert_type, severity);
        let conn = self.conn.lock().unwrap();
        let now = fmt_ts(Utc::now());
        let extras_json = serde_json::to_string(&extras)?;

        let id: i64 = conn.query_row(
            "INSERT INTO alerts
                (robot_id, alert_type, severity, source, observed_value, threshold_value,
                 title, message, created_at, extras, dedup_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(dedup_key) WHERE resolved_at IS NULL DO UPDATE SET
                observed_value = excluded.observed_value,
                extras = excluded.extras
             RETURNING id",
            params![
                robot_id,
                alert_type,
                severity.as_str(),
                source,
                observed_value,
                threshold_value,
                title,
                message,
                now,
                extras_json,
                key
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Resolves the currently open alert for a dedup key, if any, freeing
    /// the key for future alerts (§4.F).
    pub fn resolve_alert(&self, robot_id: &str, metric: &str, severity: Severity) -> Result<()> {
        let key = dedup_key(robot_id, metric, severity);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE alerts SET resolved_at = ?1 WHERE dedup_key = ?2 AND resolved_at IS NULL",
            params![fmt_ts(Utc::now()), key],
        )?;
        Ok(())
    }

    pub fn acknowledge_alert(&self, alert_id: i64, acknowledged_by: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE alerts SET acknowledged_by = ?1, acknowledged_at = ?2 WHERE id = ?3",
            params![acknowledged_by, fmt_ts(Utc::now()), alert_id],
        )?;
        Ok(())
    }

    pub fn list_open_alerts(&self) -> Result<Vec<Alert>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, robot_id, alert_type, severity, source, observed_value, threshold_value,
                    title, message, created_at, acknowledged_by, acknowledged_at, resolved_at, extras
             FROM alerts WHERE resolved_at IS NULL",
        )?;
        let alerts = stmt
            .query_map([], Self::row_to_alert)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    fn row_to_alert(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
        let severity: String = row.get(3)?;
        let created_at: String = row.get(9)?;
        let acknowledged_at: Option<String> = row.get(11)?;
        let resolved_at: Option<String> = row.get(12)?;
        let extras: String = row.get(13)?;
        Ok(Alert {
            id: row.get(0)?,
            robot_id: row.get(1)?,
            alert_type: row.get(2)?,
            severity: match severity.as_str() {
                "critical" => Severity::Critical,
                "warning" => Severity::Warning,
                _ => Severity::Info,
            },
            source: row.get(4)?,
            observed_value: row.get(5)?,
            threshold_value: row.get(6)?,
            title: row.get(7)?,
            message: row.get(8)?,
            created_at: parse_ts(&created_at).unwrap_or_else(|_| chrono::Utc::now()),
            acknowledged_by: row.get(10)?,
            acknowledged_at: acknowledged_at.and_then(|s| parse_ts(&s).ok()),
            resolved_at: resolved_at.and_then(|s| parse_ts(&s).ok()),
            extras: serde_json::from_str(&extras).unwrap_or(serde_json::Value::Null),
        })
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    pub fn insert_active_job(&self, job: &Job) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (id, robot_id, task_name, phase, status, items_total, items_done,
                               percent_complete, start_time, end_time, last_item, cancel_reason, success)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                job.id,
                job.robot_id,
                job.task_name,
                phase_str(job.phase),
                status_str(job.status),
                job.items_total as i64,
                job.items_done as i64,
                job.percent_complete,
                fmt_ts(job.start_time),
                job.end_time.map(fmt_ts),
                job.last_item,
                job.cancel_reason,
                job.success.map(|s| s as i64),
            ],
        )?;
        Ok(())
    }

    /// Updates a non-terminal job's progress fields in place (§4.G
    /// coalesced persistence). Does not change `status`.
    pub fn update_job_progress(&self, job: &Job) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET phase = ?1, items_done = ?2, percent_complete = ?3, last_item = ?4
             WHERE id = ?5 AND status = 'active'",
            params![
                phase_str(job.phase),
                job.items_done as i64,
                job.percent_complete,
                job.last_item,
                job.id
            ],
        )?;
        Ok(())
    }

    /// Transitions a job to a terminal status. Rejects the transition (by
    /// returning `Err(StoreError::JobAlreadyTerminal)`) if the job is
    /// already terminal — single-writer semantics enforced with a
    /// conditional `UPDATE ... WHERE status = 'active'` (§4.E, §8 invariant
    /// 3).
    pub fn transition_job_terminal(&self, job: &Job) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE jobs SET status = ?1, phase = ?2, items_done = ?3, percent_complete = ?4,
                             end_time = ?5, last_item = ?6, cancel_reason = ?7, success = ?8
             WHERE id = ?9 AND status = 'active'",
            params![
                status_str(job.status),
                phase_str(job.phase),
                job.items_done as i64,
                job.percent_complete,
                job.end_time.map(fmt_ts),
                job.last_item,
                job.cancel_reason,
                job.success.map(|s| s as i64),
                job.id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::JobAlreadyTerminal {
                job_id: job.id.clone(),
            });
        }
        Ok(())
    }

    pub fn list_active_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, robot_id, task_name, phase, status, items_total, items_done,
                    percent_complete, start_time, end_time, last_item, cancel_reason, success
             FROM jobs WHERE status = 'active'",
        )?;
        let jobs = stmt
            .query_map([], Self::row_to_job)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let phase: String = row.get(3)?;
        let status: String = row.get(4)?;
        let start_time: String = row.get(8)?;
        let end_time: Option<String> = row.get(9)?;
        let success: Option<i64> = row.get(12)?;
        Ok(Job {
            id: row.get(0)?,
            robot_id: row.get(1)?,
            task_name: row.get(2)?,
            phase: parse_phase(&phase),
            status: parse_status(&status),
            items_total: row.get::<_, i64>(5)? as u64,
            items_done: row.get::<_, i64>(6)? as u64,
            percent_complete: row.get(7)?,
            start_time: parse_ts(&start_time).unwrap_or_else(|_| Utc::now()),
            end_time: end_time.and_then(|s| parse_ts(&s).ok()),
            last_item: row.get(10)?,
            cancel_reason: row.get(11)?,
            success: success.map(|v| v != 0),
        })
    }

    // ------------------------------------------------------------------
    // Audit log
    // ------------------------------------------------------------------

    /// Append-only; never rejects, never blocks on anything but the insert
    /// itself (§4.E, §7).
    pub fn append_log(
        &self,
        level: LogLevel,
        category: &str,
        message: &str,
        robot_id: Option<&str>,
        details: serde_json::Value,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let details_json = serde_json::to_string(&details)?;
        let id = conn.query_row(
            "INSERT INTO audit_log (level, category, message, robot_id, details, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
            params![
                level.as_str(),
                category,
                message,
                robot_id,
                details_json,
                fmt_ts(Utc::now())
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn recent_logs(&self, limit: u32) -> Result<Vec<AuditLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, level, category, message, robot_id, details, timestamp
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let logs = stmt
            .query_map(params![limit], |row| {
                let level: String = row.get(1)?;
                let timestamp: String = row.get(6)?;
                let details: String = row.get(5)?;
                Ok(AuditLogEntry {
                    id: row.get(0)?,
                    level: parse_level(&level),
                    category: row.get(2)?,
                    message: row.get(3)?,
                    robot_id: row.get(4)?,
                    details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
                    timestamp: parse_ts(&timestamp).unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

fn phase_str(phase: JobPhase) -> &'static str {
    match phase {
        JobPhase::Scanning => "scanning",
        JobPhase::Searching => "searching",
        JobPhase::Executing => "executing",
        JobPhase::Done => "done",
    }
}

fn parse_phase(s: &str) -> JobPhase {
    match s {
        "scanning" => JobPhase::Scanning,
        "searching" => JobPhase::Searching,
        "done" => JobPhase::Done,
        _ => JobPhase::Executing,
    }
}

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Active => "active",
        JobStatus::Completed => "completed",
        JobStatus::Cancelled => "cancelled",
        JobStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> JobStatus {
    match s {
        "completed" => JobStatus::Completed,
        "cancelled" => JobStatus::Cancelled,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Active,
    }
}

fn parse_level(s: &str) -> LogLevel {
    match s {
        "debug" => LogLevel::Debug,
        "warning" => LogLevel::Warning,
        "error" => LogLevel::Error,
        "critical" => LogLevel::Critical,
        _ => LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetheris_shared::Direction;

    fn store() -> EntityStore {
        EntityStore::open_in_memory().unwrap()
    }

    #[test]
    fn upsert_robot_creates_then_updates() {
        let store = store();
        let t1 = Utc::now();
        store.upsert_robot_on_seen("RV-001", t1, Some("10.0.0.5")).unwrap();
        let robot = store.get_robot("RV-001").unwrap().unwrap();
        assert_eq!(robot.network_address.as_deref(), Some("10.0.0.5"));

        let t2 = t1 + chrono::Duration::seconds(5);
        store.upsert_robot_on_seen("RV-001", t2, None).unwrap();
        let robot = store.get_robot("RV-001").unwrap().unwrap();
        // network_address preserved when not supplied on the update.
        assert_eq!(robot.network_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(robot.last_seen, t2);
    }

    #[test]
    fn upsert_robot_is_idempotent_under_repeated_calls() {
        let store = store();
        let now = Utc::now();
        for _ in 0..5 {
            store.upsert_robot_on_seen("RV-002", now, None).unwrap();
        }
        assert_eq!(store.list_robots().unwrap().len(), 1);
    }

    #[test]
    fn create_alert_dedupes_open_rows() {
        let store = store();
        store.upsert_robot_on_seen("RV-001", Utc::now(), None).unwrap();
        let id1 = store
            .create_alert(
                "RV-001",
                "cpu_temperature",
                Severity::Warning,
                "alert-engine",
                62.0,
                60.0,
                "High CPU temperature",
                "cpu_temperature crossed warn threshold",
                serde_json::Value::Null,
            )
            .unwrap();
        let id2 = store
            .create_alert(
                "RV-001",
                "cpu_temperature",
                Severity::Warning,
                "alert-engine",
                65.0,
                60.0,
                "High CPU temperature",
                "cpu_temperature crossed warn threshold",
                serde_json::Value::Null,
            )
            .unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.list_open_alerts().unwrap().len(), 1);
    }

    #[test]
    fn resolve_frees_dedup_key_for_new_alert() {
        let store = store();
        store.upsert_robot_on_seen("RV-001", Utc::now(), None).unwrap();
        let id1 = store
            .create_alert(
                "RV-001", "cpu_temperature", Severity::Warning, "alert-engine",
                62.0, 60.0, "t", "m", serde_json::Value::Null,
            )
            .unwrap();
        store.resolve_alert("RV-001", "cpu_temperature", Severity::Warning).unwrap();
        let id2 = store
            .create_alert(
                "RV-001", "cpu_temperature", Severity::Warning, "alert-engine",
                63.0, 60.0, "t", "m", serde_json::Value::Null,
            )
            .unwrap();
        assert_ne!(id1, id2);
        assert_eq!(store.list_open_alerts().unwrap().len(), 1);
    }

    #[test]
    fn job_terminal_transition_is_rejected_twice() {
        let store = store();
        let job = Job {
            id: "job-1".into(),
            robot_id: "RV-001".into(),
            task_name: "pack".into(),
            phase: JobPhase::Executing,
            status: JobStatus::Active,
            items_total: 3,
            items_done: 0,
            percent_complete: 0.0,
            start_time: Utc::now(),
            end_time: None,
            last_item: None,
            cancel_reason: None,
            success: None,
        };
        store.insert_active_job(&job).unwrap();

        let mut completed = job.clone();
        completed.status = JobStatus::Completed;
        completed.items_done = 3;
        completed.percent_complete = 100.0;
        completed.end_time = Some(Utc::now());
        completed.success = Some(true);
        store.transition_job_terminal(&completed).unwrap();

        let err = store.transition_job_terminal(&completed).unwrap_err();
        assert!(matches!(err, StoreError::JobAlreadyTerminal { .. }));
    }

    #[test]
    fn set_threshold_rejects_inverted_pair_for_high_direction() {
        let store = store();
        store.upsert_robot_on_seen("RV-001", Utc::now(), None).unwrap();
        store
            .set_threshold(
                "RV-001",
                "cpu_temperature",
                ThresholdPair {
                    warn_value: 80.0,
                    crit_value: 60.0,
                    enabled: true,
                },
                Direction::High,
            )
            .unwrap();
        assert!(store.get_threshold("RV-001", "cpu_temperature").unwrap().is_none());
    }
}
