//! AETHERIS Time-Series Writer
//!
//! Buffered telemetry sink with tiered retention (§3, §4.D). Grounded on
//! `hdds-persistence`'s SQLite access pattern, generalised to a
//! count/interval flush cadence and a three-tier raw/hourly/daily rollup.

pub mod error;
pub mod point;
pub mod writer;

pub use error::{Result, TimeSeriesError};
pub use point::{Aggregation, FieldValue, Point};
pub use writer::{TimeSeriesConfig, TimeSeriesWriter};
