//! AETHERIS Shared Wire Types
//!
//! Core data structures, MQTT topic helpers and declared measurement schemas
//! shared between the Robot Agent, the server-side Ingestion Dispatcher, and
//! every downstream component (Alert Engine, Job Tracker, Entity Store,
//! Time-Series Writer, Command Router).

pub mod backoff;
pub mod commands;
pub mod messages;
pub mod model;
pub mod schema;
pub mod topics;

pub use backoff::{Backoff, BackoffConfig, RetryBudget};
pub use commands::{AckStatus, Command, CommandAck, CommandType};
pub use messages::{
    AlertMessage, BatteryMessage, JobEventKind, JobMessage, LocationMessage, OfflineWill,
    SensorMessage, ServoMessage, ServoReading, StatusMessage, VisionMessage,
};
pub use model::{
    Alert, AuditLogEntry, Job, JobPhase, JobStatus, LogLevel, Robot, RobotLifecycle, Severity,
    ThresholdPair,
};
pub use schema::{
    default_hysteresis, lookup_sensor, metric_direction, Direction, SensorSchema,
    ServoFieldSchema, SENSOR_SCHEMAS, SERVO_FIELD_SCHEMA,
};
pub use topics::{ParsedTopic, Stream, TopicSet};

/// Current Unix timestamp in milliseconds, kept for components that prefer
/// a plain integer over `chrono::DateTime` (e.g. logging a quick uptime
/// counter). Most wire types use `chrono::DateTime<Utc>` directly.
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
