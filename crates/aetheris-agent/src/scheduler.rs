//! Cooperative task scheduler (§4.A): named periodic tasks — `status`,
//! `sensors`, `servos`, `heartbeat`, `battery`, `location`, `vision` —
//! sharing one `tokio::task` via `tokio::select!` over independent
//! `tokio::time::interval`s. Generalises the teacher's
//! `select! { telemetry_interval.tick() => ..., heartbeat_interval.tick() => ... }`
//! loop in `main.rs` to an arbitrary named-task table.
//!
//! Each interval is built with `MissedTickBehavior::Skip`: if a task
//! overruns its own interval, the scheduler skips the missed tick instead
//! of bursting through a backlog of queued ticks (§4.A: "If a task
//! overruns, the next tick is skipped rather than queued").

use crate::capability::{AgentCapabilities, ServoSample};
use crate::config::AgentConfig;
use crate::outbound::OutboundQueues;
use crate::prealert;
use crate::servo_table::TONYPI_SERVO_IDS;
use crate::state::AgentState;
use aetheris_shared::{
    AlertMessage, BatteryMessage, LocationMessage, SensorMessage, ServoMessage, ServoReading,
    StatusMessage, Stream, TopicSet, VisionMessage,
};
use rand::Rng;
use std::collections::BTreeMap;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

async fn publish(outbound: &OutboundQueues, topics: &TopicSet, stream: Stream, robot_id: &str, payload: Vec<u8>) {
    let topic = topics.publish(stream, robot_id);
    outbound.enqueue(stream, topic, payload).await;
}

async fn publish_alert(outbound: &OutboundQueues, topics: &TopicSet, robot_id: &str, alert: AlertMessage) {
    match serde_json::to_vec(&alert) {
        Ok(payload) => publish(outbound, topics, Stream::Alerts, robot_id, payload).await,
        Err(e) => warn!(error = %e, "failed to serialize pre-alert"),
    }
}

fn interval_of(period: std::time::Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Publishes one `status` sample immediately, outside the normal cadence.
/// Used both by the scheduler's own `status` tick and by the reconnect
/// handler, which needs a fresh status publish as soon as the connection
/// comes back (§4.A).
pub(crate) async fn tick_status(
    outbound: &OutboundQueues,
    topics: &TopicSet,
    robot_id: &str,
) {
    let mut rng = rand::rng();
    let msg = StatusMessage {
        robot_id: robot_id.to_string(),
        timestamp: chrono::Utc::now(),
        cpu_percent: rng.random_range(5.0..60.0),
        memory_percent: rng.random_range(20.0..70.0),
        disk_percent: rng.random_range(10.0..80.0),
        temperature: rng.random_range(35.0..55.0),
        is_online: true,
        ip_address: None,
        dropped_samples: outbound.total_dropped(),
    };
    match serde_json::to_vec(&msg) {
        Ok(payload) => publish(outbound, topics, Stream::Status, robot_id, payload).await,
        Err(e) => warn!(error = %e, "failed to serialize status message"),
    }
}

async fn tick_sensors(
    capabilities: &AgentCapabilities,
    outbound: &OutboundQueues,
    topics: &TopicSet,
    robot_id: &str,
) {
    let mut samples: Vec<(&'static str, f64, Option<&'static str>, &'static str)> = Vec::new();

    match capabilities.imu.read() {
        Ok(r) => {
            let source = capabilities.imu_source.as_str();
            samples.push(("accelerometer_x", r.accel_x, Some("m/s^2"), source));
            samples.push(("accelerometer_y", r.accel_y, Some("m/s^2"), source));
            samples.push(("accelerometer_z", r.accel_z, Some("m/s^2"), source));
            samples.push(("gyroscope_x", r.gyro_x, Some("deg/s"), source));
            samples.push(("gyroscope_y", r.gyro_y, Some("deg/s"), source));
            samples.push(("gyroscope_z", r.gyro_z, Some("deg/s"), source));
        }
        Err(e) => warn!(peripheral = "imu", error = %e, "sensors tick: imu read failed"),
    }

    match capabilities.sonar.read() {
        Ok(distance) => {
            samples.push(("ultrasonic_distance", distance, Some("cm"), capabilities.sonar_source.as_str()));
            if let Some(alert) = prealert::check_ultrasonic(robot_id, distance) {
                publish_alert(outbound, topics, robot_id, alert).await;
            }
        }
        Err(e) => warn!(peripheral = "sonar", error = %e, "sensors tick: sonar read failed"),
    }

    // light_level has no dedicated capability interface (§4.A lists IMU,
    // sonar, camera, servo bus, GPIO light only); it is always synthetic.
    samples.push(("light_level", rand::rng().random_range(0.0..100.0), Some("%"), "simulated"));

    for (sensor_type, value, unit, source) in samples {
        let msg = SensorMessage {
            robot_id: robot_id.to_string(),
            timestamp: chrono::Utc::now(),
            sensor_type: sensor_type.to_string(),
            value,
            unit: unit.map(str::to_string),
            source: source.to_string(),
        };
        match serde_json::to_vec(&msg) {
            Ok(payload) => publish(outbound, topics, Stream::Sensors, robot_id, payload).await,
            Err(e) => warn!(error = %e, sensor_type, "failed to serialize sensor message"),
        }
    }
}

async fn tick_servos(
    capabilities: &AgentCapabilities,
    outbound: &OutboundQueues,
    topics: &TopicSet,
    robot_id: &str,
) {
    let ids: Vec<u32> = TONYPI_SERVO_IDS.iter().map(|s| s.id).collect();
    let readings: Vec<ServoSample> = match capabilities.servo_bus.read_all(&ids) {
        Ok(readings) => readings,
        Err(e) => {
            warn!(peripheral = "servo_bus", error = %e, "servos tick: read failed");
            return;
        }
    };

    let mut servos = BTreeMap::new();
    for slot in TONYPI_SERVO_IDS {
        if let Some(sample) = readings.iter().find(|r| r.id == slot.id) {
            if let Some(alert) = prealert::check_servo_temperature(robot_id, slot.name, sample.temperature) {
                publish_alert(outbound, topics, robot_id, alert).await;
            }
            servos.insert(
                slot.name.to_string(),
                ServoReading {
                    id: sample.id,
                    position: sample.position,
                    temperature: sample.temperature,
                    voltage: sample.voltage,
                    torque_enabled: sample.torque_enabled,
                    offset: 0.0,
                    angle_min: slot.angle_min,
                    angle_max: slot.angle_max,
                    source: capabilities.servo_bus_source.as_str().to_string(),
                },
            );
        }
    }

    let msg = ServoMessage {
        robot_id: robot_id.to_string(),
        timestamp: chrono::Utc::now(),
        servos,
    };
    match serde_json::to_vec(&msg) {
        Ok(payload) => publish(outbound, topics, Stream::Servos, robot_id, payload).await,
        Err(e) => warn!(error = %e, "failed to serialize servo message"),
    }
}

async fn tick_battery(outbound: &OutboundQueues, topics: &TopicSet, robot_id: &str) {
    let mut rng = rand::rng();
    let percentage = rng.random_range(15.0..100.0);
    if let Some(alert) = prealert::check_battery(robot_id, percentage) {
        publish_alert(outbound, topics, robot_id, alert).await;
    }
    let msg = BatteryMessage {
        robot_id: robot_id.to_string(),
        timestamp: chrono::Utc::now(),
        voltage: rng.random_range(6.5..8.4),
        percentage,
        charging: false,
    };
    match serde_json::to_vec(&msg) {
        Ok(payload) => publish(outbound, topics, Stream::Battery, robot_id, payload).await,
        Err(e) => warn!(error = %e, "failed to serialize battery message"),
    }
}

async fn tick_location(outbound: &OutboundQueues, topics: &TopicSet, robot_id: &str) {
    let mut rng = rand::rng();
    let msg = LocationMessage {
        robot_id: robot_id.to_string(),
        timestamp: chrono::Utc::now(),
        x: rng.random_range(-5.0..5.0),
        y: rng.random_range(-5.0..5.0),
        z: 0.0,
    };
    match serde_json::to_vec(&msg) {
        Ok(payload) => publish(outbound, topics, Stream::Location, robot_id, payload).await,
        Err(e) => warn!(error = %e, "failed to serialize location message"),
    }
}

async fn tick_heartbeat(outbound: &OutboundQueues, topics: &TopicSet, robot_id: &str) {
    // No dedicated heartbeat topic is declared in the wire contract (§6);
    // a liveness ping rides the `status` stream at its own independent
    // cadence, which `upsert_robot_on_seen` treats identically to any
    // other arrival.
    tick_status(outbound, topics, robot_id).await;
}

async fn tick_vision(
    capabilities: &AgentCapabilities,
    outbound: &OutboundQueues,
    topics: &TopicSet,
    robot_id: &str,
    last_detected: &mut bool,
) {
    let reading = match capabilities.camera.capture() {
        Ok(reading) => reading,
        Err(e) => {
            warn!(peripheral = "camera", error = %e, "vision tick: capture failed");
            return;
        }
    };

    if reading.detected == *last_detected {
        return;
    }
    *last_detected = reading.detected;

    let msg = VisionMessage {
        robot_id: robot_id.to_string(),
        timestamp: chrono::Utc::now(),
        detected: reading.detected,
        label: reading.label,
        confidence: reading.confidence,
        source: capabilities.camera_source.as_str().to_string(),
    };
    match serde_json::to_vec(&msg) {
        Ok(payload) => publish(outbound, topics, Stream::Vision, robot_id, payload).await,
        Err(e) => warn!(error = %e, "failed to serialize vision message"),
    }
}

/// Runs every named periodic task cooperatively until `state.is_shutting_down()`.
/// At most one task body executes per loop iteration — `tokio::select!`
/// picks exactly one ready branch, so hardware drivers that are not
/// reentrant are never touched concurrently (§4.A).
pub async fn run(
    config: &AgentConfig,
    topics: &TopicSet,
    capabilities: &AgentCapabilities,
    outbound: &OutboundQueues,
    state: &AgentState,
    robot_id: &str,
) {
    let mut status_tick = interval_of(config.status_interval());
    let mut sensors_tick = interval_of(config.sensors_interval());
    let mut servos_tick = interval_of(config.servos_interval());
    let mut heartbeat_tick = interval_of(config.heartbeat_interval());
    let mut battery_tick = interval_of(config.battery_interval());
    let mut location_tick = interval_of(config.location_interval());
    let mut vision_tick = interval_of(config.vision_poll_interval());
    let mut last_vision_detected = false;

    info!("agent scheduler starting");

    loop {
        if state.is_shutting_down() {
            info!("agent scheduler stopping (shutdown requested)");
            return;
        }

        tokio::select! {
            _ = status_tick.tick() => {
                tick_status(outbound, topics, robot_id).await;
            }
            _ = sensors_tick.tick() => {
                if state.is_emergency_stopped() {
                    debug!("sensors tick running while emergency stopped");
                }
                tick_sensors(capabilities, outbound, topics, robot_id).await;
            }
            _ = servos_tick.tick() => {
                tick_servos(capabilities, outbound, topics, robot_id).await;
            }
            _ = heartbeat_tick.tick() => {
                tick_heartbeat(outbound, topics, robot_id).await;
            }
            _ = battery_tick.tick() => {
                tick_battery(outbound, topics, robot_id).await;
            }
            _ = location_tick.tick() => {
                tick_location(outbound, topics, robot_id).await;
            }
            _ = vision_tick.tick() => {
                tick_vision(capabilities, outbound, topics, robot_id, &mut last_vision_detected).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::AgentCapabilities;
    use aetheris_broker::adapter::BrokerAdapter;
    use aetheris_broker::config::BrokerConfig;

    fn test_topics() -> TopicSet {
        TopicSet::new("tonypi")
    }

    #[tokio::test]
    async fn status_tick_publishes_one_message() {
        let config = BrokerConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 18831,
            ..BrokerConfig::default()
        };
        let (adapter, _eventloop) = BrokerAdapter::connect(&config).unwrap();
        let outbound = OutboundQueues::spawn(adapter, 8);
        let topics = test_topics();

        tick_status(&outbound, &topics, "RV-001").await;
        // No broker is actually listening in this unit test; the assertion
        // here is only that building and enqueueing the message does not
        // panic — delivery is covered by `aetheris-broker`'s own tests.
        outbound.stop();
    }

    #[test]
    fn capabilities_acquire_without_panicking() {
        let _ = AgentCapabilities::acquire();
    }
}
