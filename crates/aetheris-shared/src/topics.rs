//! MQTT topic layout for the AETHERIS fleet.
//!
//! Topics are structured strings `<ns>/<stream>/<robot_id>`. The namespace is
//! configurable (default `tonypi`); single-level wildcards (`+`) match
//! `robot_id`, multi-level (`#`) match everything below a prefix. Nothing in
//! this module interprets payload bytes.

use std::fmt;

/// The set of publish/subscribe streams a robot or the server deals with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Status,
    Sensors,
    Servos,
    Battery,
    Location,
    Vision,
    Job,
    Scan,
    Alerts,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Status => "status",
            Stream::Sensors => "sensors",
            Stream::Servos => "servos",
            Stream::Battery => "battery",
            Stream::Location => "location",
            Stream::Vision => "vision",
            Stream::Job => "job",
            Stream::Scan => "scan",
            Stream::Alerts => "alerts",
        }
    }

    pub fn all() -> &'static [Stream] {
        &[
            Stream::Status,
            Stream::Sensors,
            Stream::Servos,
            Stream::Battery,
            Stream::Location,
            Stream::Vision,
            Stream::Job,
            Stream::Scan,
            Stream::Alerts,
        ]
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic builder bound to a single namespace.
///
/// Constructed once per process (agent or server) from configuration.
#[derive(Debug, Clone)]
pub struct TopicSet {
    pub namespace: String,
}

impl Default for TopicSet {
    fn default() -> Self {
        Self {
            namespace: "tonypi".to_string(),
        }
    }
}

impl TopicSet {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// `<ns>/<stream>/<robot_id>` for a publish on a named stream.
    pub fn publish(&self, stream: Stream, robot_id: &str) -> String {
        format!("{}/{}/{}", self.namespace, stream, robot_id)
    }

    /// `<ns>/<stream>/+` wildcard subscription across every robot.
    pub fn subscribe_all(&self, stream: Stream) -> String {
        format!("{}/{}/+", self.namespace, stream)
    }

    /// `<ns>/commands/<robot_id>` — directed command topic.
    pub fn commands(&self, robot_id: &str) -> String {
        format!("{}/commands/{}", self.namespace, robot_id)
    }

    /// `<ns>/commands/broadcast` — fleet-wide command topic.
    pub fn commands_broadcast(&self) -> String {
        format!("{}/commands/broadcast", self.namespace)
    }

    /// `<ns>/commands/+` — subscribe to directed commands for any robot.
    pub fn commands_all(&self) -> String {
        format!("{}/commands/+", self.namespace)
    }

    /// `<ns>/commands/<robot_id>/ack` — command acknowledgment topic.
    pub fn command_ack(&self, robot_id: &str) -> String {
        format!("{}/commands/{}/ack", self.namespace, robot_id)
    }

    /// `<ns>/commands/+/ack` — subscribe to acks from any robot.
    pub fn command_ack_all(&self) -> String {
        format!("{}/commands/+/ack", self.namespace)
    }
}

/// A parsed `<ns>/<stream>/<robot_id>` topic, used on the ingestion side to
/// route an incoming publish without caring about payload contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub namespace: String,
    pub stream: String,
    pub robot_id: String,
}

impl ParsedTopic {
    pub fn parse(topic: &str) -> Option<Self> {
        let mut parts = topic.splitn(3, '/');
        let namespace = parts.next()?.to_string();
        let stream = parts.next()?.to_string();
        let robot_id = parts.next()?.to_string();
        Some(Self {
            namespace,
            stream,
            robot_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_topics() {
        let topics = TopicSet::new("tonypi");
        assert_eq!(topics.publish(Stream::Sensors, "RV-001"), "tonypi/sensors/RV-001");
        assert_eq!(topics.subscribe_all(Stream::Sensors), "tonypi/sensors/+");
        assert_eq!(topics.commands("RV-001"), "tonypi/commands/RV-001");
        assert_eq!(topics.commands_broadcast(), "tonypi/commands/broadcast");
        assert_eq!(topics.command_ack("RV-001"), "tonypi/commands/RV-001/ack");
    }

    #[test]
    fn parses_three_segment_topic() {
        let parsed = ParsedTopic::parse("tonypi/sensors/RV-001").unwrap();
        assert_eq!(parsed.namespace, "tonypi");
        assert_eq!(parsed.stream, "sensors");
        assert_eq!(parsed.robot_id, "RV-001");
    }

    #[test]
    fn rejects_short_topic() {
        assert!(ParsedTopic::parse("tonypi/sensors").is_none());
    }
}
