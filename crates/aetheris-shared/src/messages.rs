//! Wire payloads for each stream (§6). Every struct here is what actually
//! crosses the broker as JSON; nothing upstream of parsing sees an untyped
//! map (§9, "duck-typed payloads" redesign flag).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// Broker-delivered Last-Will payload on `<ns>/status/<robot_id>` (§4.B
/// LWT), published by the broker on a robot's behalf when it disconnects
/// ungracefully. Deliberately a strict subset of `StatusMessage` — the
/// dispatcher tries this first so the will doesn't have to carry fields a
/// dead agent can no longer report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineWill {
    pub robot_id: String,
    pub is_online: bool,
}

/// `<ns>/status/<robot_id>` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub robot_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub temperature: f64,
    pub is_online: bool,
    pub ip_address: Option<String>,
    /// Count of samples dropped by this robot's outbound queue since the
    /// last status publish (§4.A backpressure counter).
    #[serde(default)]
    pub dropped_samples: u64,
}

/// `<ns>/sensors/<robot_id>` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMessage {
    pub robot_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub sensor_type: String,
    pub value: f64,
    pub unit: Option<String>,
    /// Whether this reading came from real hardware or a simulated
    /// capability (§4.A hardware degradation).
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "real".to_string()
}

/// One servo's reading, nested under `ServoMessage::servos` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoReading {
    pub id: u32,
    pub position: f64,
    pub temperature: f64,
    pub voltage: f64,
    pub torque_enabled: bool,
    pub offset: f64,
    pub angle_min: f64,
    pub angle_max: f64,
    /// Whether this reading came from the real servo bus or a simulated
    /// fallback (§4.A hardware degradation).
    #[serde(default = "default_source")]
    pub source: String,
}

/// `<ns>/servos/<robot_id>` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoMessage {
    pub robot_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub servos: BTreeMap<String, ServoReading>,
}

/// `<ns>/battery/<robot_id>` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryMessage {
    pub robot_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub voltage: f64,
    pub percentage: f64,
    pub charging: bool,
}

/// `<ns>/location/<robot_id>` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationMessage {
    pub robot_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// `<ns>/vision/<robot_id>`. Not tabulated in §6 but named as a stream in
/// §4.A; kept minimal since vision processing itself is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionMessage {
    pub robot_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub detected: bool,
    pub label: Option<String>,
    pub confidence: Option<f64>,
    /// Whether this reading came from the real camera or a simulated
    /// fallback (§4.A hardware degradation).
    #[serde(default = "default_source")]
    pub source: String,
}

/// Job lifecycle event kinds (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Start,
    Progress,
    Item,
    Complete,
    Cancel,
    Fail,
}

/// `<ns>/job/<robot_id>` (§6, §4.G).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub robot_id: String,
    pub event: JobEventKind,
    pub job_id: Option<String>,
    pub task_name: Option<String>,
    pub phase: Option<String>,
    pub items_total: Option<u64>,
    pub items_done: Option<u64>,
    pub last_item: Option<String>,
    pub cancel_reason: Option<String>,
    #[serde(default = "now")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// `<ns>/alerts/<robot_id>` (§6) — the agent's advisory pre-alert, distinct
/// from the server-side Alert Engine's authoritative row (§4.A, §4.F).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub robot_id: String,
    pub severity: String,
    pub metric: String,
    pub value: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_message_round_trips() {
        let msg = SensorMessage {
            robot_id: "RV-001".into(),
            timestamp: chrono::Utc::now(),
            sensor_type: "cpu_temperature".into(),
            value: 45.0,
            unit: Some("C".into()),
            source: "real".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: SensorMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn sensor_message_defaults_source_to_real_when_absent() {
        let json = r#"{"robot_id":"RV-001","timestamp":"2026-01-01T00:00:00Z","sensor_type":"cpu_temperature","value":45.0,"unit":null}"#;
        let msg: SensorMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.source, "real");
    }

    #[test]
    fn job_message_round_trips_start_event() {
        let msg = JobMessage {
            robot_id: "RV-001".into(),
            event: JobEventKind::Start,
            job_id: Some("job-1".into()),
            task_name: Some("pack".into()),
            phase: Some("executing".into()),
            items_total: Some(3),
            items_done: Some(0),
            last_item: None,
            cancel_reason: None,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: JobMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg.event, back.event);
        assert_eq!(msg.job_id, back.job_id);
    }
}
