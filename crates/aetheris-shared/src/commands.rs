//! Command records sent from the server down to a robot (§4.A, §4.H, §6).

use serde::{Deserialize, Serialize};

/// The kind of control instruction a robot can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Move,
    Stop,
    Gesture,
    StatusQuery,
    BatteryQuery,
    EmergencyStop,
    Resume,
    Shutdown,
}

impl CommandType {
    /// Emergency-stop gets head-of-queue priority in the Command Router
    /// (§4.H).
    pub fn is_emergency(&self) -> bool {
        matches!(self, CommandType::EmergencyStop)
    }
}

/// `<ns>/commands/<robot_id>` payload (§6): `{command_id, type, parameters, timeout}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command_id: uuid::Uuid,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Timeout in seconds before the Command Router gives up waiting for an
    /// ack (default 30s per §4.H).
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Command {
    pub fn new(command_type: CommandType, parameters: serde_json::Value) -> Self {
        Self {
            command_id: uuid::Uuid::new_v4(),
            command_type,
            parameters,
            timeout: default_timeout_secs(),
        }
    }

    pub fn emergency_stop() -> Self {
        Self::new(CommandType::EmergencyStop, serde_json::Value::Null)
    }
}

/// Status reported back by the robot's command handler (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Accepted,
    Completed,
    Rejected,
    Failed,
}

/// `<ns>/commands/<robot_id>/ack` payload (§6): `{command_id, status, detail}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command_id: uuid::Uuid,
    pub robot_id: String,
    pub status: AckStatus,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_stop_is_flagged_priority() {
        let cmd = Command::emergency_stop();
        assert!(cmd.command_type.is_emergency());
    }

    #[test]
    fn move_command_is_not_priority() {
        let cmd = Command::new(CommandType::Move, serde_json::json!({"direction": "forward"}));
        assert!(!cmd.command_type.is_emergency());
    }

    #[test]
    fn default_timeout_is_30_seconds() {
        let cmd = Command::new(CommandType::Stop, serde_json::Value::Null);
        assert_eq!(cmd.timeout, 30);
    }
}
