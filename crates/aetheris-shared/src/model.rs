//! Entity-level types shared between the agent, the dispatcher and the
//! entity store. These are the in-memory shapes; `aetheris-store` maps them
//! to and from SQLite rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state of a Robot entity (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotLifecycle {
    Online,
    Offline,
    Error,
    Maintenance,
}

impl RobotLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotLifecycle::Online => "online",
            RobotLifecycle::Offline => "offline",
            RobotLifecycle::Error => "error",
            RobotLifecycle::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "online" => Some(RobotLifecycle::Online),
            "offline" => Some(RobotLifecycle::Offline),
            "error" => Some(RobotLifecycle::Error),
            "maintenance" => Some(RobotLifecycle::Maintenance),
            _ => None,
        }
    }
}

/// A pair of thresholds for one metric on one robot (§3, §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warn_value: f64,
    pub crit_value: f64,
    pub enabled: bool,
}

/// Robot entity as held by the Entity Store, with the threshold map it
/// carries as configuration (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub robot_id: String,
    pub name: String,
    pub description: String,
    pub network_address: Option<String>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub lifecycle: RobotLifecycle,
    pub thresholds: BTreeMap<String, ThresholdPair>,
    /// Opaque settings blob, not interpreted by the core.
    pub settings: serde_json::Value,
}

impl Robot {
    /// The `first_seen` initial state created by auto-registration on an
    /// unknown `robot_id` (§3, "no referential integrity between samples and
    /// entities").
    pub fn first_seen(robot_id: impl Into<String>, last_seen: chrono::DateTime<chrono::Utc>) -> Self {
        let robot_id = robot_id.into();
        Self {
            name: robot_id.clone(),
            description: String::new(),
            network_address: None,
            last_seen,
            lifecycle: RobotLifecycle::Online,
            thresholds: BTreeMap::new(),
            settings: serde_json::Value::Null,
            robot_id,
        }
    }
}

/// Alert severity (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Alert entity (§3). Immutable once created except for the
/// acknowledge/resolve fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub robot_id: String,
    pub alert_type: String,
    pub severity: Severity,
    pub source: String,
    pub observed_value: f64,
    pub threshold_value: f64,
    pub title: String,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<chrono::DateTime<chrono::Utc>>,
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub extras: serde_json::Value,
}

/// Job execution phase (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Scanning,
    Searching,
    Executing,
    Done,
}

/// Job terminal/non-terminal status (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Active)
    }
}

/// Job entity (§3). `percent_complete` and the `end_time`/`status`
/// relationship are invariants enforced by whoever mutates this struct
/// (`aetheris-jobs`), not by the type itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub robot_id: String,
    pub task_name: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub items_total: u64,
    pub items_done: u64,
    pub percent_complete: f64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub last_item: Option<String>,
    pub cancel_reason: Option<String>,
    pub success: Option<bool>,
}

impl Job {
    /// Recomputes `percent_complete` from `items_done`/`items_total`,
    /// rounded to one decimal place per §8 invariant 2.
    pub fn recompute_percent(&mut self) {
        self.percent_complete = if self.items_total > 0 {
            let raw = 100.0 * self.items_done as f64 / self.items_total as f64;
            (raw * 10.0).round() / 10.0
        } else {
            0.0
        };
    }
}

/// Audit log severity levels, independent of alert severity (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

/// Append-only audit log entry (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    pub robot_id: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_percent_rounds_to_one_decimal() {
        let mut job = Job {
            id: "j1".into(),
            robot_id: "RV-001".into(),
            task_name: "pack".into(),
            phase: JobPhase::Executing,
            status: JobStatus::Active,
            items_total: 3,
            items_done: 1,
            percent_complete: 0.0,
            start_time: chrono::Utc::now(),
            end_time: None,
            last_item: None,
            cancel_reason: None,
            success: None,
        };
        job.recompute_percent();
        assert!((job.percent_complete - 33.3).abs() < 0.01);
    }

    #[test]
    fn job_status_terminal() {
        assert!(!JobStatus::Active.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
