//! Declared measurement schemas (§4.C).
//!
//! Every sensor type the fleet emits has a closed descriptor of
//! `(name, unit, min, max)`. Values outside `[min, max]` are clamped with a
//! warning, not rejected; an unrecognised `sensor_type` is rejected
//! (Open Question resolved in SPEC_FULL.md).

use std::collections::HashMap;

/// The direction in which a value becomes "worse" for a metric (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Larger values are worse (e.g. temperature).
    High,
    /// Smaller values are worse (e.g. battery percentage).
    Low,
}

/// A single sensor's closed descriptor.
#[derive(Debug, Clone, Copy)]
pub struct SensorSchema {
    pub name: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub direction: Direction,
}

impl SensorSchema {
    /// Clamps a reading into `[min, max]`, returning the clamped value and
    /// whether clamping actually changed it.
    pub fn clamp(&self, value: f64) -> (f64, bool) {
        let clamped = value.clamp(self.min, self.max);
        (clamped, (clamped - value).abs() > f64::EPSILON)
    }
}

/// The canonical sensor set from §4.C.
pub const SENSOR_SCHEMAS: &[SensorSchema] = &[
    SensorSchema {
        name: "accelerometer_x",
        unit: "m/s^2",
        min: -20.0,
        max: 20.0,
        direction: Direction::High,
    },
    SensorSchema {
        name: "accelerometer_y",
        unit: "m/s^2",
        min: -20.0,
        max: 20.0,
        direction: Direction::High,
    },
    SensorSchema {
        name: "accelerometer_z",
        unit: "m/s^2",
        min: -20.0,
        max: 20.0,
        direction: Direction::High,
    },
    SensorSchema {
        name: "gyroscope_x",
        unit: "deg/s",
        min: -500.0,
        max: 500.0,
        direction: Direction::High,
    },
    SensorSchema {
        name: "gyroscope_y",
        unit: "deg/s",
        min: -500.0,
        max: 500.0,
        direction: Direction::High,
    },
    SensorSchema {
        name: "gyroscope_z",
        unit: "deg/s",
        min: -500.0,
        max: 500.0,
        direction: Direction::High,
    },
    SensorSchema {
        name: "ultrasonic_distance",
        unit: "cm",
        min: 0.0,
        max: 500.0,
        direction: Direction::Low,
    },
    SensorSchema {
        name: "cpu_temperature",
        unit: "C",
        min: 0.0,
        max: 100.0,
        direction: Direction::High,
    },
    SensorSchema {
        name: "light_level",
        unit: "%",
        min: 0.0,
        max: 100.0,
        direction: Direction::High,
    },
];

/// Looks up a sensor schema by declared `sensor_type`.
pub fn lookup_sensor(sensor_type: &str) -> Option<&'static SensorSchema> {
    SENSOR_SCHEMAS.iter().find(|s| s.name == sensor_type)
}

/// Servo sample field schema (§4.C): fixed numeric fields carried per servo.
#[derive(Debug, Clone, Copy)]
pub struct ServoFieldSchema {
    pub position_range: (f64, f64),
}

pub const SERVO_FIELD_SCHEMA: ServoFieldSchema = ServoFieldSchema {
    position_range: (0.0, 1023.0),
};

/// Default hysteresis bands per metric (§4.F, §9 Open Question 1), exposed
/// as configuration with sensible defaults.
pub fn default_hysteresis() -> HashMap<&'static str, (f64, f64)> {
    let mut map = HashMap::new();
    map.insert("cpu_temperature", (2.0, 3.0));
    map.insert("battery_percentage", (2.0, 3.0));
    map.insert("ultrasonic_distance", (2.0, 3.0));
    map.insert("servo_temperature", (1.5, 2.5));
    map
}

/// Default direction per metric that the Alert Engine cares about, beyond
/// the raw sensor schema (battery and servo metrics aren't in
/// `SENSOR_SCHEMAS` because they arrive on dedicated streams, not
/// `sensors`).
pub fn metric_direction(metric: &str) -> Direction {
    match metric {
        "battery_percentage" => Direction::Low,
        "ultrasonic_distance" => Direction::Low,
        _ => lookup_sensor(metric).map(|s| s.direction).unwrap_or(Direction::High),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_ultrasonic() {
        let schema = lookup_sensor("ultrasonic_distance").unwrap();
        let (clamped, did_clamp) = schema.clamp(750.0);
        assert_eq!(clamped, 500.0);
        assert!(did_clamp);
    }

    #[test]
    fn leaves_in_range_value_untouched() {
        let schema = lookup_sensor("cpu_temperature").unwrap();
        let (clamped, did_clamp) = schema.clamp(45.0);
        assert_eq!(clamped, 45.0);
        assert!(!did_clamp);
    }

    #[test]
    fn unknown_sensor_type_is_rejected() {
        assert!(lookup_sensor("smell_o_meter").is_none());
    }

    #[test]
    fn battery_direction_is_low() {
        assert_eq!(metric_direction("battery_percentage"), Direction::Low);
    }
}
