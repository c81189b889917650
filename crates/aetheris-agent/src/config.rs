//! Agent configuration (§4.A, §6): broker connection, namespace, robot
//! identity and per-task intervals, all overridable from the environment.

use clap::Parser;
use std::time::Duration;

/// Robot Agent configuration. Fields double as CLI flags (via `clap`) and
/// environment variables (`AETHERIS_*`), matching the teacher's
/// `MqttConfig::default()` plus the task-interval knobs §4.A calls for.
#[derive(Parser, Debug, Clone)]
#[command(name = "aetheris-agent", about = "AETHERIS robot-side telemetry and command agent")]
pub struct AgentConfig {
    #[arg(long, env = "AETHERIS_ROBOT_ID")]
    pub robot_id: String,

    #[arg(long, env = "AETHERIS_NAMESPACE", default_value = "tonypi")]
    pub namespace: String,

    #[arg(long, env = "AETHERIS_BROKER_HOST", default_value = "localhost")]
    pub broker_host: String,

    #[arg(long, env = "AETHERIS_BROKER_PORT", default_value_t = 1883)]
    pub broker_port: u16,

    #[arg(long, env = "AETHERIS_STATUS_INTERVAL_SECS", default_value_t = 5)]
    pub status_interval_secs: u64,

    #[arg(long, env = "AETHERIS_SENSORS_INTERVAL_SECS", default_value_t = 1)]
    pub sensors_interval_secs: u64,

    #[arg(long, env = "AETHERIS_SERVOS_INTERVAL_SECS", default_value_t = 5)]
    pub servos_interval_secs: u64,

    #[arg(long, env = "AETHERIS_HEARTBEAT_INTERVAL_SECS", default_value_t = 10)]
    pub heartbeat_interval_secs: u64,

    #[arg(long, env = "AETHERIS_BATTERY_INTERVAL_SECS", default_value_t = 5)]
    pub battery_interval_secs: u64,

    #[arg(long, env = "AETHERIS_LOCATION_INTERVAL_SECS", default_value_t = 5)]
    pub location_interval_secs: u64,

    /// Poll cadence for the on-change `vision` task — not itself the
    /// publish interval, since vision only publishes when the detection
    /// state flips (§4.A).
    #[arg(long, env = "AETHERIS_VISION_POLL_INTERVAL_SECS", default_value_t = 1)]
    pub vision_poll_interval_secs: u64,

    /// Size of each per-`(stream, robot_id)` outbound drop-oldest queue
    /// (§4.A backpressure).
    #[arg(long, env = "AETHERIS_OUTBOUND_QUEUE_SIZE", default_value_t = 64)]
    pub outbound_queue_size: usize,
}

impl AgentConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn sensors_interval(&self) -> Duration {
        Duration::from_secs(self.sensors_interval_secs)
    }

    pub fn servos_interval(&self) -> Duration {
        Duration::from_secs(self.servos_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn battery_interval(&self) -> Duration {
        Duration::from_secs(self.battery_interval_secs)
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_secs(self.location_interval_secs)
    }

    pub fn vision_poll_interval(&self) -> Duration {
        Duration::from_secs(self.vision_poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_args() {
        let config = AgentConfig::parse_from(["aetheris-agent", "--robot-id", "RV-001"]);
        assert_eq!(config.robot_id, "RV-001");
        assert_eq!(config.namespace, "tonypi");
        assert_eq!(config.status_interval(), Duration::from_secs(5));
    }
}
