//! The Ingestion Dispatcher (§4.C): typed per-stream handlers that parse,
//! validate against the declared schema table, and fan out to the Alert
//! Engine, Job Tracker, Time-Series Writer and Entity Store.

use crate::error::{DispatchError, Result};
use crate::rate_limit::RateLimiter;
use aetheris_alerts::AlertEngine;
use aetheris_broker::IncomingMessage;
use aetheris_commands::CommandRouter;
use aetheris_jobs::{JobEvent, JobTracker};
use aetheris_shared::{
    lookup_sensor, AlertMessage, BatteryMessage, CommandAck, JobMessage, LocationMessage,
    LogLevel, OfflineWill, ParsedTopic, SensorMessage, Severity, ServoMessage, StatusMessage,
    VisionMessage, SERVO_FIELD_SCHEMA,
};
use aetheris_store::EntityStore;
use aetheris_timeseries::{FieldValue, Point, TimeSeriesWriter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters exposed for observability (§4.C: `schema_rejected`, drop
/// counts).
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub schema_rejected_total: AtomicU64,
    pub parse_errors_total: AtomicU64,
}

/// Wires together one handler per subscribed stream. A single instance is
/// shared (via `Arc`) across however many per-stream tasks
/// `aetheris-server` spawns to consume the Broker Adapter's subscriptions.
pub struct Dispatcher {
    timeseries: Arc<TimeSeriesWriter>,
    store: Arc<EntityStore>,
    alerts: Arc<AlertEngine>,
    jobs: Arc<JobTracker>,
    commands: Arc<CommandRouter>,
    rate_limiter: RateLimiter,
    pub metrics: DispatchMetrics,
}

impl Dispatcher {
    pub fn new(
        timeseries: Arc<TimeSeriesWriter>,
        store: Arc<EntityStore>,
        alerts: Arc<AlertEngine>,
        jobs: Arc<JobTracker>,
        commands: Arc<CommandRouter>,
    ) -> Self {
        Self {
            timeseries,
            store,
            alerts,
            jobs,
            commands,
            rate_limiter: RateLimiter::default(),
            metrics: DispatchMetrics::default(),
        }
    }

    /// Entry point for one incoming broker publish. Never blocks on
    /// anything but the bounded internal queues of the components it
    /// delegates to (§4.C).
    pub async fn dispatch(&self, message: IncomingMessage) {
        if let Some(parsed) = parse_ack_topic(&message.topic) {
            if let Err(e) = self.handle_ack(&parsed.robot_id, &message.payload).await {
                self.log_rejected(&parsed.robot_id, "commands_ack", "parse_error", &e);
            }
            return;
        }

        let Some(topic) = ParsedTopic::parse(&message.topic) else {
            warn!(topic = %message.topic, "malformed topic, dropping message");
            return;
        };

        let result = match topic.stream.as_str() {
            "status" => self.handle_status(&topic.robot_id, &message.payload).await,
            "sensors" => self.handle_sensors(&topic.robot_id, &message.payload).await,
            "servos" => self.handle_servos(&topic.robot_id, &message.payload).await,
            "battery" => self.handle_battery(&topic.robot_id, &message.payload).await,
            "location" => self.handle_location(&topic.robot_id, &message.payload).await,
            "vision" => self.handle_vision(&topic.robot_id, &message.payload).await,
            "job" => self.handle_job(&topic.robot_id, &message.payload).await,
            "alerts" => self.handle_agent_alert(&topic.robot_id, &message.payload).await,
            other => {
                warn!(stream = other, "no handler registered for stream");
                Ok(())
            }
        };

        if let Err(e) = result {
            self.log_rejected(&topic.robot_id, &topic.stream, error_kind(&e), &e);
        }
    }

    async fn handle_status(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        if let Ok(will) = serde_json::from_slice::<OfflineWill>(payload) {
            if !will.is_online {
                self.store.mark_robot_offline(robot_id)?;
                return Ok(());
            }
        }

        let msg: StatusMessage = serde_json::from_slice(payload)?;
        self.store
            .upsert_robot_on_seen(robot_id, msg.timestamp, msg.ip_address.as_deref())?;

        let point = Point::new("status", msg.timestamp)
            .with_tag("robot_id", robot_id)
            .with_field("cpu_percent", FieldValue::Float(msg.cpu_percent))
            .with_field("memory_percent", FieldValue::Float(msg.memory_percent))
            .with_field("disk_percent", FieldValue::Float(msg.disk_percent))
            .with_field("temperature", FieldValue::Float(msg.temperature))
            .with_field("dropped_samples", FieldValue::Int(msg.dropped_samples as i64));
        self.timeseries.write(point).await?;
        Ok(())
    }

    async fn handle_sensors(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let msg: SensorMessage = serde_json::from_slice(payload)?;
        self.store.upsert_robot_on_seen(robot_id, msg.timestamp, None)?;

        let Some(schema) = lookup_sensor(&msg.sensor_type) else {
            return Err(DispatchError::UnknownSensorType {
                sensor_type: msg.sensor_type,
            });
        };
        let (value, was_clamped) = schema.clamp(msg.value);
        if was_clamped {
            warn!(robot_id, sensor_type = %msg.sensor_type, raw = msg.value, clamped = value, "sensor value clamped to declared range");
        }

        let point = Point::new("sensors", msg.timestamp)
            .with_tag("robot_id", robot_id)
            .with_tag("metric", &msg.sensor_type)
            .with_tag("source", &msg.source)
            .with_field("value", FieldValue::Float(value));
        self.timeseries.write(point).await?;
        self.alerts.observe(robot_id, &msg.sensor_type, value).await?;
        Ok(())
    }

    async fn handle_servos(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let msg: ServoMessage = serde_json::from_slice(payload)?;
        self.store.upsert_robot_on_seen(robot_id, msg.timestamp, None)?;

        for (name, reading) in &msg.servos {
            let (position, clamped) = clamp_range(reading.position, SERVO_FIELD_SCHEMA.position_range);
            if clamped {
                warn!(robot_id, servo = %name, raw = reading.position, "servo position clamped to declared range");
            }

            let point = Point::new("servos", msg.timestamp)
                .with_tag("robot_id", robot_id)
                .with_tag("servo_id", &reading.id.to_string())
                .with_tag("servo_name", name)
                .with_tag("source", &reading.source)
                .with_field("position", FieldValue::Float(position))
                .with_field("temperature", FieldValue::Float(reading.temperature))
                .with_field("voltage", FieldValue::Float(reading.voltage))
                .with_field("torque_enabled", FieldValue::Bool(reading.torque_enabled))
                .with_field("offset", FieldValue::Float(reading.offset))
                .with_field("angle_min", FieldValue::Float(reading.angle_min))
                .with_field("angle_max", FieldValue::Float(reading.angle_max));
            self.timeseries.write(point).await?;
            self.alerts.observe(robot_id, "servo_temperature", reading.temperature).await?;
        }
        Ok(())
    }

    async fn handle_battery(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let msg: BatteryMessage = serde_json::from_slice(payload)?;
        self.store.upsert_robot_on_seen(robot_id, msg.timestamp, None)?;

        let point = Point::new("battery", msg.timestamp)
            .with_tag("robot_id", robot_id)
            .with_field("voltage", FieldValue::Float(msg.voltage))
            .with_field("percentage", FieldValue::Float(msg.percentage))
            .with_field("charging", FieldValue::Bool(msg.charging));
        self.timeseries.write(point).await?;
        self.alerts.observe(robot_id, "battery_percentage", msg.percentage).await?;
        Ok(())
    }

    async fn handle_location(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let msg: LocationMessage = serde_json::from_slice(payload)?;
        let point = Point::new("location", msg.timestamp)
            .with_tag("robot_id", robot_id)
            .with_field("x", FieldValue::Float(msg.x))
            .with_field("y", FieldValue::Float(msg.y))
            .with_field("z", FieldValue::Float(msg.z));
        self.timeseries.write(point).await?;
        Ok(())
    }

    async fn handle_vision(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let msg: VisionMessage = serde_json::from_slice(payload)?;
        let mut point = Point::new("vision", msg.timestamp)
            .with_tag("robot_id", robot_id)
            .with_tag("source", &msg.source)
            .with_field("detected", FieldValue::Bool(msg.detected));
        if let Some(confidence) = msg.confidence {
            point = point.with_field("confidence", FieldValue::Float(confidence));
        }
        if let Some(label) = msg.label {
            point = point.with_field("label", FieldValue::Text(label));
        }
        self.timeseries.write(point).await?;
        Ok(())
    }

    async fn handle_job(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let msg: JobMessage = serde_json::from_slice(payload)?;
        self.jobs
            .handle_event(JobEvent {
                kind: msg.event,
                robot_id: robot_id.to_string(),
                job_id: msg.job_id,
                task_name: msg.task_name,
                phase: msg.phase,
                items_total: msg.items_total,
                items_done: msg.items_done,
                last_item: msg.last_item,
                cancel_reason: msg.cancel_reason,
                timestamp: msg.timestamp,
            })
            .await?;
        Ok(())
    }

    /// The agent's advisory pre-alert (§4.A): logged, not turned into an
    /// authoritative Alert row — the server-side Alert Engine alone owns
    /// that (§4.F).
    async fn handle_agent_alert(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let msg: AlertMessage = serde_json::from_slice(payload)?;
        let level = match msg.severity.as_str() {
            "critical" => LogLevel::Critical,
            "warning" => LogLevel::Warning,
            _ => LogLevel::Info,
        };
        self.store.append_log(
            level,
            "agent_pre_alert",
            &msg.message,
            Some(robot_id),
            serde_json::json!({ "metric": msg.metric, "value": msg.value }),
        )?;
        Ok(())
    }

    async fn handle_ack(&self, robot_id: &str, payload: &[u8]) -> Result<()> {
        let mut ack: CommandAck = serde_json::from_slice(payload)?;
        ack.robot_id = robot_id.to_string();
        self.commands.handle_ack(ack).await;
        Ok(())
    }

    fn log_rejected(&self, robot_id: &str, stream: &str, error_kind: &str, error: &DispatchError) {
        match error {
            DispatchError::UnknownSensorType { .. } => {
                self.metrics.schema_rejected_total.fetch_add(1, Ordering::Relaxed);
            }
            DispatchError::Parse(_) => {
                self.metrics.parse_errors_total.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if self.rate_limiter.should_log(robot_id, stream, error_kind) {
            warn!(robot_id, stream, error = %error, "ingestion handler rejected message");
        }
    }
}

fn error_kind(error: &DispatchError) -> &'static str {
    match error {
        DispatchError::Parse(_) => "parse_error",
        DispatchError::UnknownSensorType { .. } => "schema_rejected",
        DispatchError::MalformedTopic { .. } => "malformed_topic",
        DispatchError::Store(_) => "store_error",
        DispatchError::TimeSeries(_) => "timeseries_error",
        DispatchError::Alerts(_) => "alerts_error",
        DispatchError::Jobs(_) => "jobs_error",
    }
}

fn clamp_range(value: f64, range: (f64, f64)) -> (f64, bool) {
    let clamped = value.clamp(range.0, range.1);
    (clamped, (clamped - value).abs() > f64::EPSILON)
}

struct AckTopic {
    robot_id: String,
}

/// `<ns>/commands/<robot_id>/ack` has four segments, one more than
/// `ParsedTopic` handles, so it gets its own small parser.
fn parse_ack_topic(topic: &str) -> Option<AckTopic> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() == 4 && parts[1] == "commands" && parts[3] == "ack" {
        Some(AckTopic {
            robot_id: parts[2].to_string(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetheris_commands::CommandPublisher;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct NullPublisher;

    #[async_trait]
    impl CommandPublisher for NullPublisher {
        async fn publish(&self, _robot_id: &str, _command: &aetheris_shared::Command) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        let timeseries = Arc::new(TimeSeriesWriter::open_in_memory(Default::default()).unwrap());
        let (tx, _rx) = mpsc::channel(16);
        let alerts = Arc::new(AlertEngine::new(store.clone(), tx));
        let jobs = Arc::new(JobTracker::new(store.clone(), Default::default()));
        let commands = Arc::new(CommandRouter::new(store.clone(), Arc::new(NullPublisher)));
        Dispatcher::new(timeseries, store, alerts, jobs, commands)
    }

    fn incoming(topic: &str, payload: serde_json::Value) -> IncomingMessage {
        IncomingMessage {
            topic: topic.to_string(),
            payload: serde_json::to_vec(&payload).unwrap(),
        }
    }

    #[tokio::test]
    async fn sensors_with_unknown_type_is_rejected_and_counted() {
        let dispatcher = dispatcher();
        let msg = incoming(
            "tonypi/sensors/RV-001",
            serde_json::json!({
                "robot_id": "RV-001",
                "timestamp": chrono::Utc::now(),
                "sensor_type": "smell_o_meter",
                "value": 1.0,
            }),
        );
        dispatcher.dispatch(msg).await;
        assert_eq!(dispatcher.metrics.schema_rejected_total.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sensors_clamps_out_of_range_value() {
        let dispatcher = dispatcher();
        let msg = incoming(
            "tonypi/sensors/RV-001",
            serde_json::json!({
                "robot_id": "RV-001",
                "timestamp": chrono::Utc::now(),
                "sensor_type": "cpu_temperature",
                "value": 250.0,
            }),
        );
        dispatcher.dispatch(msg).await;
        assert_eq!(dispatcher.metrics.schema_rejected_total.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn status_upserts_robot() {
        let dispatcher = dispatcher();
        let msg = incoming(
            "tonypi/status/RV-002",
            serde_json::json!({
                "robot_id": "RV-002",
                "timestamp": chrono::Utc::now(),
                "cpu_percent": 10.0,
                "memory_percent": 20.0,
                "disk_percent": 30.0,
                "temperature": 40.0,
                "is_online": true,
                "ip_address": "10.0.0.1",
            }),
        );
        dispatcher.dispatch(msg).await;
        assert!(dispatcher.store.get_robot("RV-002").unwrap().is_some());
    }

    #[tokio::test]
    async fn offline_will_marks_robot_offline_without_touching_last_seen() {
        let dispatcher = dispatcher();
        let seen_at = chrono::Utc::now();
        dispatcher
            .store
            .upsert_robot_on_seen("RV-003", seen_at, None)
            .unwrap();

        let will = incoming(
            "tonypi/status/RV-003",
            serde_json::json!({ "robot_id": "RV-003", "is_online": false }),
        );
        dispatcher.dispatch(will).await;

        let robot = dispatcher.store.get_robot("RV-003").unwrap().unwrap();
        assert_eq!(robot.lifecycle, aetheris_shared::RobotLifecycle::Offline);
        assert_eq!(robot.last_seen, seen_at);
        assert_eq!(dispatcher.metrics.parse_errors_total.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ack_topic_is_routed_to_command_router() {
        let dispatcher = dispatcher();
        let command_id = uuid::Uuid::new_v4();
        let msg = incoming(
            "tonypi/commands/RV-001/ack",
            serde_json::json!({
                "command_id": command_id,
                "robot_id": "RV-001",
                "status": "completed",
                "detail": null,
            }),
        );
        dispatcher.dispatch(msg).await;
    }
}
