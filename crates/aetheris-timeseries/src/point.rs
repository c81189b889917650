//! Wire shape for the Time-Series Writer (§4.D).

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A single scalar field value. Stored as `REAL` or `INTEGER` in SQLite;
/// booleans and strings are supported for non-numeric telemetry fields
/// (e.g. a servo's `moving` flag) but are not aggregatable.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            FieldValue::Text(_) => None,
        }
    }
}

/// One sample: a measurement name, its tag set (identity, e.g. `robot_id`,
/// `metric`), its field set (values), and a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Stable hash of the tag set, used as a SQLite index key so
    /// `(measurement, tag_hash, timestamp)` identifies a series without a
    /// join against a side table (§4.D).
    pub fn tag_hash(&self) -> i64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        for (k, v) in &self.tags {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        hasher.finish() as i64
    }
}

/// Aggregation applied by `history` over the matched window (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Raw,
    Mean,
    Min,
    Max,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_hash_is_order_independent() {
        let now = Utc::now();
        let a = Point::new("sensors", now)
            .with_tag("robot_id", "RV-001")
            .with_tag("metric", "cpu_temperature");
        let b = Point::new("sensors", now)
            .with_tag("metric", "cpu_temperature")
            .with_tag("robot_id", "RV-001");
        assert_eq!(a.tag_hash(), b.tag_hash());
    }

    #[test]
    fn tag_hash_differs_across_series() {
        let now = Utc::now();
        let a = Point::new("sensors", now).with_tag("robot_id", "RV-001");
        let b = Point::new("sensors", now).with_tag("robot_id", "RV-002");
        assert_ne!(a.tag_hash(), b.tag_hash());
    }
}
