//! Local pre-alert: a small set of hard-coded safety thresholds evaluated
//! before publish (§4.A). Advisory only — the server-side Alert Engine
//! (`aetheris-alerts`) is the source of truth and re-evaluates independently
//! from its own configured thresholds.

use aetheris_shared::AlertMessage;

/// Servo temperature above which the agent raises its own advisory alert,
/// independent of whatever threshold the server has configured.
pub const SERVO_TEMP_CRITICAL_C: f64 = 70.0;

/// Battery percentage below which the agent raises its own advisory alert.
pub const BATTERY_CRITICAL_PERCENT: f64 = 8.0;

/// Ultrasonic distance below which an obstacle is considered dangerously
/// close.
pub const ULTRASONIC_TOO_CLOSE_CM: f64 = 5.0;

fn alert(robot_id: &str, metric: &str, value: f64, message: String) -> AlertMessage {
    AlertMessage {
        robot_id: robot_id.to_string(),
        severity: "critical".to_string(),
        metric: metric.to_string(),
        value,
        timestamp: chrono::Utc::now(),
        message,
    }
}

pub fn check_servo_temperature(robot_id: &str, servo_name: &str, temperature: f64) -> Option<AlertMessage> {
    if temperature >= SERVO_TEMP_CRITICAL_C {
        Some(alert(
            robot_id,
            "servo_temperature",
            temperature,
            format!("servo {servo_name} over critical temperature: {temperature:.1}C"),
        ))
    } else {
        None
    }
}

pub fn check_battery(robot_id: &str, percentage: f64) -> Option<AlertMessage> {
    if percentage <= BATTERY_CRITICAL_PERCENT {
        Some(alert(
            robot_id,
            "battery_percentage",
            percentage,
            format!("battery critically low: {percentage:.1}%"),
        ))
    } else {
        None
    }
}

pub fn check_ultrasonic(robot_id: &str, distance_cm: f64) -> Option<AlertMessage> {
    if distance_cm <= ULTRASONIC_TOO_CLOSE_CM {
        Some(alert(
            robot_id,
            "ultrasonic_distance",
            distance_cm,
            format!("obstacle too close: {distance_cm:.1}cm"),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn servo_temperature_breach_raises_alert() {
        let alert = check_servo_temperature("RV-001", "l_knee", 75.0).unwrap();
        assert_eq!(alert.severity, "critical");
        assert_eq!(alert.metric, "servo_temperature");
    }

    #[test]
    fn servo_temperature_in_range_is_silent() {
        assert!(check_servo_temperature("RV-001", "l_knee", 40.0).is_none());
    }

    #[test]
    fn battery_critical_raises_alert() {
        assert!(check_battery("RV-001", 5.0).is_some());
        assert!(check_battery("RV-001", 50.0).is_none());
    }

    #[test]
    fn ultrasonic_too_close_raises_alert() {
        assert!(check_ultrasonic("RV-001", 2.0).is_some());
        assert!(check_ultrasonic("RV-001", 100.0).is_none());
    }
}
